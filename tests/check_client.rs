//! CheckClient against a wiremock server. The client is blocking, so every
//! call runs on tokio's blocking pool.

use code_check::client::Timeouts;
use code_check::config::CheckerConfig;
use code_check::types::{CheckRequest, OutputFormat};
use code_check::{CheckClient, CheckResult, Checker, ErrorKind};
use std::net::TcpListener;
use std::time::{Duration, Instant};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(base_url: &str) -> CheckClient {
    CheckClient::new(CheckerConfig::with_base_url(base_url))
}

fn request() -> CheckRequest {
    CheckRequest::new("class UserDao {}", "UserDao.java", OutputFormat::Json)
}

async fn run(client: CheckClient) -> (CheckResult, u32) {
    tokio::task::spawn_blocking(move || {
        let mut beats = 0;
        let result = client.check(&request(), &mut || beats += 1);
        (result, beats)
    })
    .await
    .unwrap()
}

async fn serve(template: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/check"))
        .respond_with(template)
        .mount(&server)
        .await;
    server
}

fn closed_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn streamed_body_with_heartbeats_parses_to_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/check"))
        .and(header("accept", "application/json"))
        .and(body_json(serde_json::json!({
            "code": "class UserDao {}",
            "fileName": "UserDao.java",
            "options": {"format": "json"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("\n{\"success\":true,\n\"issues\":[]}\n\n"))
        .expect(1)
        .mount(&server)
        .await;

    let (result, beats) = run(client_for(&server.uri())).await;

    assert_eq!(beats, 2);
    match result {
        CheckResult::Success(response) => assert!(response.issues.is_empty()),
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn trailing_slash_in_base_url_is_trimmed() {
    let server = serve(ResponseTemplate::new(200).set_body_string("{\"success\":true}\n")).await;
    let (result, _) = run(client_for(&format!("{}/", server.uri()))).await;
    assert!(result.is_success());
}

#[tokio::test]
async fn error_status_uses_server_message() {
    let server = serve(ResponseTemplate::new(400).set_body_string("{\"message\":\"bad input\"}")).await;
    let (result, _) = run(client_for(&server.uri())).await;
    assert_eq!(result, CheckResult::failure("bad input", ErrorKind::ServerError));
}

#[tokio::test]
async fn error_status_with_unparsable_body_synthesizes_message() {
    let server = serve(ResponseTemplate::new(400).set_body_string("<html>nope</html>")).await;
    let (result, _) = run(client_for(&server.uri())).await;
    assert_eq!(result, CheckResult::failure("HTTP 400 error", ErrorKind::ServerError));
}

#[tokio::test]
async fn empty_success_body_is_parse_error() {
    let server = serve(ResponseTemplate::new(200)).await;
    let (result, beats) = run(client_for(&server.uri())).await;
    assert_eq!(beats, 0);
    assert_eq!(result, CheckResult::failure("empty response", ErrorKind::ParseError));
}

#[tokio::test]
async fn invalid_utf8_body_is_parse_error() {
    let server = serve(ResponseTemplate::new(200).set_body_raw(b"\n\xff\xfe\n".to_vec(), "application/json")).await;
    let (result, beats) = run(client_for(&server.uri())).await;
    assert_eq!(beats, 1);
    match result {
        CheckResult::Failure { message, kind } => {
            assert_eq!(kind, ErrorKind::ParseError);
            assert!(message.starts_with("failed to parse response"), "message was: {}", message);
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn unsuccessful_payload_is_server_error() {
    let server = serve(
        ResponseTemplate::new(200).set_body_string("\n{\"success\":false,\"error\":\"model unavailable\"}\n"),
    )
    .await;
    let (result, beats) = run(client_for(&server.uri())).await;
    assert_eq!(beats, 1);
    assert_eq!(result, CheckResult::failure("model unavailable", ErrorKind::ServerError));
}

#[tokio::test]
async fn refused_connection_is_network_error_naming_the_url() {
    let base_url = closed_base_url();
    let (result, beats) = run(client_for(&base_url)).await;
    assert_eq!(beats, 0);
    match result {
        CheckResult::Failure { message, kind } => {
            assert_eq!(kind, ErrorKind::Network);
            assert!(message.contains(&base_url), "message was: {}", message);
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn silent_server_trips_the_read_timeout() {
    let server = serve(
        ResponseTemplate::new(200)
            .set_body_string("{\"success\":true}\n")
            .set_delay(Duration::from_secs(3)),
    )
    .await;
    let timeouts = Timeouts {
        connect: Duration::from_secs(1),
        read: Duration::from_millis(300),
        write: Duration::from_millis(200),
        call: Duration::from_secs(30),
    };
    let client = CheckClient::with_timeouts(CheckerConfig::with_base_url(&server.uri()), timeouts);

    let started = Instant::now();
    let (result, beats) = run(client).await;
    assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
    assert_eq!(beats, 0);
    assert_eq!(
        result,
        CheckResult::failure("server sent nothing for 500ms", ErrorKind::Timeout)
    );
}

#[tokio::test]
async fn call_timeout_is_reported_as_timeout() {
    let server = serve(
        ResponseTemplate::new(200)
            .set_body_string("\n\n{\"success\":true}\n")
            .set_delay(Duration::from_millis(1500)),
    )
    .await;
    let mut config = CheckerConfig::with_base_url(&server.uri());
    config.call_timeout_secs = 1;

    let started = Instant::now();
    let (result, _) = run(CheckClient::new(config)).await;
    assert!(started.elapsed() < Duration::from_secs(10));
    match result {
        CheckResult::Failure { message, kind } => {
            assert_eq!(kind, ErrorKind::Timeout);
            assert!(message.contains("1s"), "message was: {}", message);
        }
        other => panic!("expected failure, got {:?}", other),
    }
}
