//! Failure classification for the check client.
//!
//! Everything here is pure: no I/O and no panics. Unknown inputs fall
//! through to `ErrorKind::ServerError`.

use crate::types::ErrorKind;
use serde::Deserialize;
use std::error::Error;
use std::io;

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Map a transport error to an `ErrorKind`.
///
/// Decision order: any timeout signal in the cause chain wins, then any
/// connect/resolve signal, then `ServerError`.
pub fn classify_transport_failure(error: &(dyn Error + 'static)) -> ErrorKind {
    let mut timed_out = false;
    let mut unreachable = false;

    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(e) = err.downcast_ref::<reqwest::Error>() {
            timed_out |= e.is_timeout();
            unreachable |= e.is_connect();
        }
        if let Some(e) = err.downcast_ref::<io::Error>() {
            match e.kind() {
                io::ErrorKind::TimedOut => timed_out = true,
                io::ErrorKind::ConnectionRefused | io::ErrorKind::AddrNotAvailable => {
                    unreachable = true
                }
                _ => {}
            }
        }
        unreachable |= mentions_unreachable(&err.to_string());
        current = next_cause(err);
    }

    if timed_out {
        ErrorKind::Timeout
    } else if unreachable {
        ErrorKind::Network
    } else {
        ErrorKind::ServerError
    }
}

// `io::Error::source` skips the wrapped error itself, so step into it by hand.
fn next_cause<'a>(err: &'a (dyn Error + 'static)) -> Option<&'a (dyn Error + 'static)> {
    if let Some(io_err) = err.downcast_ref::<io::Error>() {
        if let Some(inner) = io_err.get_ref() {
            return Some(inner);
        }
    }
    err.source()
}

/// True when the cause chain shows the failure happened while connecting.
pub fn is_connect_failure(error: &(dyn Error + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(e) = err.downcast_ref::<reqwest::Error>() {
            if e.is_connect() {
                return true;
            }
        }
        let lower = err.to_string().to_lowercase();
        if lower.contains("error trying to connect") || lower.contains("tcp connect error") {
            return true;
        }
        current = next_cause(err);
    }
    false
}

fn mentions_unreachable(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("failed to connect")
        || lower.contains("connection refused")
        || lower.contains("dns error")
        || lower.contains("failed to lookup address")
        || lower.contains("unable to resolve host")
}

/// Extract a server-supplied message from an error body, `message` before `error`.
pub fn parse_error_body(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let body: ErrorBody = serde_json::from_str(text).ok()?;
    body.message.or(body.error)
}

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_detail(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
