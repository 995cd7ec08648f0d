use crate::client::CheckClient;
use crate::config::CheckerConfig;
use crate::mock::MockChecker;
use crate::types::{CheckRequest, CheckResult};
use std::sync::Arc;

/// The capability shared by the real client and the offline mock.
///
/// Implementations must classify every failure into a `CheckResult`; nothing
/// is allowed to escape `check` as a panic or error.
pub trait Checker: Send + Sync {
    /// Run one check, calling `on_heartbeat` once per liveness signal, in order.
    fn check(&self, request: &CheckRequest, on_heartbeat: &mut dyn FnMut()) -> CheckResult;

    /// Cheap reachability test. Never fails, only answers.
    fn probe(&self) -> bool;
}

/// Pick the implementation once, from the configuration snapshot.
pub fn build_checker(config: &CheckerConfig) -> Arc<dyn Checker> {
    if config.mock_mode {
        tracing::info!("mock mode enabled, no requests will leave this machine");
        Arc::new(MockChecker::new())
    } else {
        Arc::new(CheckClient::new(config.clone()))
    }
}
