//! Client for a remote code-analysis server.
//!
//! - `types`: request/response model, `Severity`, `CheckResult`, `ErrorKind`.
//! - `classify`: maps transport and body failures to an `ErrorKind`.
//! - `client`: `CheckClient`, the streaming HTTP checker.
//! - `probe`: `/health` reachability test.
//! - `mock`: `MockChecker`, an offline checker with a fixed report.
//! - `checker`: the `Checker` capability both implement.
//! - `orchestrator`: single-check lifecycle and progress delivery.
//! - `config`: the configuration snapshot and how it is resolved.
//! - `cli` / `report`: the command-line front end.
pub mod checker;
pub mod classify;
pub mod cli;
pub mod client;
pub mod config;
pub mod mock;
pub mod orchestrator;
pub mod probe;
pub mod report;
pub mod types;

pub use checker::{build_checker, Checker};
pub use client::CheckClient;
pub use config::CheckerConfig;
pub use mock::MockChecker;
pub use orchestrator::{CheckState, ProgressObserver, RequestOrchestrator, SubmitError};
pub use types::{CheckRequest, CheckResponse, CheckResult, ErrorKind, Issue, Severity, Summary};
