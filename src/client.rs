use crate::checker::Checker;
use crate::classify::{classify_transport_failure, is_connect_failure, parse_error_body, truncate_detail};
use crate::config::CheckerConfig;
use crate::probe;
use crate::types::{CheckRequest, CheckResponse, CheckResult, ErrorKind};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use std::io::{BufRead, BufReader};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

const USER_AGENT: &str = concat!("code-check/", env!("CARGO_PKG_VERSION"));
const PARSE_DETAIL_LIMIT: usize = 100;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Effective timeouts for one check call.
///
/// `read` is an idle bound: it restarts whenever the server sends a line,
/// heartbeats included. The wait for the response head gets `write + read`.
/// Phase timeouts are clamped so none of them outlasts `call`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
    pub write: Duration,
    pub call: Duration,
}

impl Timeouts {
    pub fn resolve(call: Duration) -> Self {
        Self {
            connect: CONNECT_TIMEOUT.min(call),
            read: READ_TIMEOUT.min(call),
            write: WRITE_TIMEOUT.min(call),
            call,
        }
    }

    pub fn with_read(mut self, read: Duration) -> Self {
        self.read = read.min(self.call);
        self
    }

    fn first_response(&self) -> Duration {
        (self.write + self.read).min(self.call)
    }
}

// What the transfer thread reports back, in order.
enum Exchange {
    Accepted,
    Rejected { status: u16, body: String },
    Line(String),
    Failed(anyhow::Error),
}

pub struct CheckClient {
    config: CheckerConfig,
    timeouts: Timeouts,
}

impl CheckClient {
    pub fn new(config: CheckerConfig) -> Self {
        let timeouts = Timeouts::resolve(config.call_timeout());
        Self { config, timeouts }
    }

    pub fn with_timeouts(config: CheckerConfig, timeouts: Timeouts) -> Self {
        Self { config, timeouts }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    fn build_http(&self) -> reqwest::Result<Client> {
        reqwest::blocking::Client::builder()
            .connect_timeout(self.timeouts.connect)
            .timeout(self.timeouts.call)
            .user_agent(USER_AGENT)
            .build()
    }

    fn execute(&self, request: &CheckRequest, on_heartbeat: &mut dyn FnMut()) -> Result<CheckResult> {
        let url = self.config.endpoint("/api/check");
        debug!(%url, file = %request.file_name, bytes = request.code.len(), "submitting check");

        let http = self.build_http().context("failed to build HTTP client")?;
        let (tx, rx) = mpsc::channel();
        let body = request.clone();
        // The blocking transfer runs on its own thread so silence can be
        // timed here. If we give up first, the call timeout still ends it.
        thread::Builder::new()
            .name("code-check-stream".to_string())
            .spawn(move || {
                if let Err(err) = transfer(&http, &url, &body, &tx) {
                    let _ = tx.send(Exchange::Failed(err));
                }
            })
            .context("failed to start stream reader")?;

        let mut payload = PayloadBuilder::default();
        let mut wait = self.timeouts.first_response();
        loop {
            match rx.recv_timeout(wait) {
                Ok(Exchange::Accepted) => {}
                Ok(Exchange::Rejected { status, body }) => {
                    let message = parse_error_body(&body)
                        .unwrap_or_else(|| format!("HTTP {} error", status));
                    return Ok(CheckResult::failure(message, ErrorKind::ServerError));
                }
                Ok(Exchange::Line(line)) => payload.push(&line, on_heartbeat),
                Ok(Exchange::Failed(err)) => return Err(err),
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    return Ok(CheckResult::failure(
                        format!("server sent nothing for {:?}", wait),
                        ErrorKind::Timeout,
                    ))
                }
            }
            wait = self.timeouts.read;
        }

        Ok(interpret_payload(&payload.finish()))
    }

    fn transport_failure(&self, err: &anyhow::Error) -> CheckResult {
        let source: &(dyn std::error::Error + 'static) = &**err;
        match classify_transport_failure(source) {
            ErrorKind::Timeout if is_connect_failure(source) => CheckResult::failure(
                format!(
                    "could not connect to {} within {:?}",
                    self.config.base_url, self.timeouts.connect
                ),
                ErrorKind::Timeout,
            ),
            ErrorKind::Timeout => CheckResult::failure(
                format!("server did not respond within {}s", self.config.call_timeout_secs),
                ErrorKind::Timeout,
            ),
            ErrorKind::Network => CheckResult::failure(
                format!("cannot reach server, check the URL: {}", self.config.base_url),
                ErrorKind::Network,
            ),
            _ => CheckResult::failure(format!("unexpected error: {:#}", err), ErrorKind::ServerError),
        }
    }
}

fn transfer(http: &Client, url: &str, request: &CheckRequest, tx: &Sender<Exchange>) -> Result<()> {
    let response = http
        .post(url)
        .header(ACCEPT, "application/json")
        .json(request)
        .send()?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        let _ = tx.send(Exchange::Rejected {
            status: status.as_u16(),
            body,
        });
        return Ok(());
    }

    let _ = tx.send(Exchange::Accepted);
    split_lines(BufReader::new(response), |line| tx.send(Exchange::Line(line)).is_ok())?;
    Ok(())
}

impl Checker for CheckClient {
    fn check(&self, request: &CheckRequest, on_heartbeat: &mut dyn FnMut()) -> CheckResult {
        let started = Instant::now();
        let result = self
            .execute(request, on_heartbeat)
            .unwrap_or_else(|err| self.transport_failure(&err));

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            CheckResult::Success(response) => {
                info!(elapsed_ms, issues = response.issues.len(), "check finished")
            }
            CheckResult::Failure { message, kind } => {
                warn!(elapsed_ms, %kind, "check failed: {}", message)
            }
        }
        result
    }

    fn probe(&self) -> bool {
        probe::probe(&self.config.base_url)
    }
}

/// Reassembles the terminal payload from streamed lines.
#[derive(Default)]
struct PayloadBuilder {
    text: String,
    heartbeats: u64,
}

impl PayloadBuilder {
    fn push(&mut self, line: &str, on_heartbeat: &mut dyn FnMut()) {
        if line.trim().is_empty() {
            self.heartbeats += 1;
            trace!(heartbeats = self.heartbeats, "heartbeat");
            on_heartbeat();
        } else {
            self.text.push_str(line);
        }
    }

    fn finish(self) -> String {
        debug!(heartbeats = self.heartbeats, bytes = self.text.len(), "stream finished");
        self.text.trim().to_string()
    }
}

/// Split a body on `\n`, decoding each line lossily. Stops early when `emit`
/// returns false.
fn split_lines<R: BufRead>(mut reader: R, mut emit: impl FnMut(String) -> bool) -> std::io::Result<()> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches('\n').trim_end_matches('\r');
        if !emit(line.to_string()) {
            return Ok(());
        }
    }
}

/// Consume a line-streamed body. Blank lines are heartbeats; every other
/// line is appended, without separators, to the returned payload.
pub fn read_stream<R: BufRead>(reader: R, on_heartbeat: &mut dyn FnMut()) -> std::io::Result<String> {
    let mut payload = PayloadBuilder::default();
    split_lines(reader, |line| {
        payload.push(&line, on_heartbeat);
        true
    })?;
    Ok(payload.finish())
}

/// Turn the reconstructed terminal payload into a result.
pub fn interpret_payload(payload: &str) -> CheckResult {
    if payload.is_empty() {
        return CheckResult::failure("empty response", ErrorKind::ParseError);
    }

    let response: CheckResponse = match serde_json::from_str(payload) {
        Ok(response) => response,
        Err(e) => {
            return CheckResult::failure(
                format!(
                    "failed to parse response: {}",
                    truncate_detail(&e.to_string(), PARSE_DETAIL_LIMIT)
                ),
                ErrorKind::ParseError,
            )
        }
    };

    if response.success {
        return CheckResult::Success(response);
    }

    let message = response
        .message
        .or(response.error)
        .unwrap_or_else(|| "server reported an unknown error".to_string());
    CheckResult::failure(message, ErrorKind::ServerError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    fn stream(lines: &[&str]) -> (std::io::Result<String>, u32) {
        let body = lines.iter().map(|l| format!("{}\n", l)).collect::<String>();
        let mut beats = 0;
        let payload = read_stream(Cursor::new(body), &mut || beats += 1);
        (payload, beats)
    }

    #[test]
    fn blank_lines_are_heartbeats() {
        let (payload, beats) = stream(&["", r#"{"success":true,"issues":[]}"#, ""]);
        assert_eq!(beats, 2);
        match interpret_payload(&payload.unwrap()) {
            CheckResult::Success(response) => assert!(response.issues.is_empty()),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn payload_lines_join_without_separators() {
        let (payload, beats) = stream(&["  ", r#"{"success":"#, "", "true}", "\t"]);
        assert_eq!(beats, 3);
        assert_eq!(payload.unwrap(), r#"{"success":true}"#);
    }

    #[test]
    fn crlf_heartbeats_are_recognised() {
        let mut beats = 0;
        let payload = read_stream(Cursor::new("\r\n\r\n{\"success\":true}\r\n"), &mut || beats += 1).unwrap();
        assert_eq!(beats, 2);
        assert!(interpret_payload(&payload).is_success());
    }

    #[test]
    fn last_line_without_newline_is_kept() {
        let mut beats = 0;
        let payload = read_stream(Cursor::new("\n{\"success\":true}"), &mut || beats += 1).unwrap();
        assert_eq!(beats, 1);
        assert_eq!(payload, r#"{"success":true}"#);
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let body: &[u8] = b"\n{\"success\":true,\"fileName\":\"\xff\xfe\"}\n";
        let mut beats = 0;
        let payload = read_stream(Cursor::new(body), &mut || beats += 1).unwrap();
        assert_eq!(beats, 1);
        match interpret_payload(&payload) {
            CheckResult::Success(response) => {
                assert_eq!(response.file_name.as_deref(), Some("\u{FFFD}\u{FFFD}"))
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn empty_payload_is_parse_error() {
        let (payload, beats) = stream(&["", ""]);
        assert_eq!(beats, 2);
        assert_eq!(
            interpret_payload(&payload.unwrap()),
            CheckResult::failure("empty response", ErrorKind::ParseError)
        );
    }

    #[test]
    fn malformed_payload_is_truncated_parse_error() {
        let garbage = format!("{{\"success\": tru{}", "x".repeat(500));
        match interpret_payload(&garbage) {
            CheckResult::Failure { message, kind } => {
                assert_eq!(kind, ErrorKind::ParseError);
                let detail = message.trim_start_matches("failed to parse response: ");
                assert!(detail.chars().count() <= PARSE_DETAIL_LIMIT);
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn unsuccessful_payload_prefers_message_then_error() {
        assert_eq!(
            interpret_payload(r#"{"success":false,"message":"quota","error":"E1"}"#),
            CheckResult::failure("quota", ErrorKind::ServerError)
        );
        assert_eq!(
            interpret_payload(r#"{"success":false,"error":"E1"}"#),
            CheckResult::failure("E1", ErrorKind::ServerError)
        );
        assert_eq!(
            interpret_payload(r#"{"success":false}"#),
            CheckResult::failure("server reported an unknown error", ErrorKind::ServerError)
        );
    }

    #[test]
    fn phase_timeouts_never_exceed_call_timeout() {
        let short = Timeouts::resolve(Duration::from_secs(5));
        assert_eq!(short.connect, Duration::from_secs(5));
        assert_eq!(short.read, Duration::from_secs(5));
        assert_eq!(short.first_response(), Duration::from_secs(5));

        let long = Timeouts::resolve(Duration::from_secs(900));
        assert_eq!(long.connect, CONNECT_TIMEOUT);
        assert_eq!(long.write, WRITE_TIMEOUT);
        assert_eq!(long.first_response(), WRITE_TIMEOUT + READ_TIMEOUT);
        assert_eq!(long.call, Duration::from_secs(900));

        assert_eq!(long.with_read(Duration::from_secs(2000)).read, long.call);
    }

    #[test]
    fn connect_phase_timeout_names_the_connect_budget() {
        let client = CheckClient::new(CheckerConfig::with_base_url("http://review:9000"));
        let err = anyhow::Error::new(io::Error::new(
            io::ErrorKind::TimedOut,
            "error trying to connect: operation timed out",
        ));
        assert_eq!(
            client.transport_failure(&err),
            CheckResult::failure("could not connect to http://review:9000 within 10s", ErrorKind::Timeout)
        );

        let err = anyhow::Error::new(io::Error::new(io::ErrorKind::TimedOut, "operation timed out"));
        assert_eq!(
            client.transport_failure(&err),
            CheckResult::failure("server did not respond within 900s", ErrorKind::Timeout)
        );
    }
}
