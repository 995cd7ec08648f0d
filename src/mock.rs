use crate::checker::Checker;
use crate::types::{CheckRequest, CheckResponse, CheckResult, CheckStats, Issue, Summary};
use std::thread;
use std::time::Duration;

const DEFAULT_STEPS: u32 = 2;
const DEFAULT_STEP: Duration = Duration::from_secs(1);

/// Offline stand-in for `CheckClient` with a fixed, deterministic report.
#[derive(Debug, Clone)]
pub struct MockChecker {
    steps: u32,
    step: Duration,
}

impl Default for MockChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChecker {
    pub fn new() -> Self {
        Self::with_steps(DEFAULT_STEPS, DEFAULT_STEP)
    }

    /// Sleep `steps` times for `step` each, one heartbeat after every sleep.
    pub fn with_steps(steps: u32, step: Duration) -> Self {
        Self { steps, step }
    }
}

impl Checker for MockChecker {
    fn check(&self, request: &CheckRequest, on_heartbeat: &mut dyn FnMut()) -> CheckResult {
        for _ in 0..self.steps {
            thread::sleep(self.step);
            on_heartbeat();
        }

        let issues = mock_issues();
        let summary = Summary::from_issues(&issues);
        let simulated_ms = (self.step * self.steps).as_millis() as u64;

        CheckResult::Success(CheckResponse {
            success: true,
            file_name: Some(request.file_name.clone()),
            line_count: Some(request.code.lines().count()),
            chunked: Some(false),
            processing_time_ms: Some(simulated_ms),
            format: Some(request.options.format.to_string()),
            issues,
            summary: Some(summary),
            tags: vec![
                "IS_DAO".to_string(),
                "USES_CONNECTION".to_string(),
                "HAS_SQL_CONCATENATION".to_string(),
            ],
            matched_rules_count: Some(12),
            stats: Some(CheckStats {
                llm_calls: 3,
                processing_time_ms: 1800,
            }),
            error: None,
            message: None,
        })
    }

    fn probe(&self) -> bool {
        true
    }
}

#[allow(clippy::too_many_arguments)]
fn mock_issue(
    rule_id: &str,
    title: &str,
    severity: &str,
    (line, column, end_line, end_column): (u32, u32, u32, u32),
    message: &str,
    suggestion: &str,
    category: &str,
    (class_name, method_name): (&str, &str),
) -> Issue {
    Issue {
        rule_id: rule_id.to_string(),
        title: title.to_string(),
        severity_raw: severity.to_string(),
        message: message.to_string(),
        suggestion: Some(suggestion.to_string()),
        category: Some(category.to_string()),
        class_name: Some(class_name.to_string()),
        method_name: Some(method_name.to_string()),
        line: Some(line),
        column: Some(column),
        end_line: Some(end_line),
        end_column: Some(end_column),
    }
}

fn mock_issues() -> Vec<Issue> {
    vec![
        mock_issue(
            "SEC-001",
            "SQL injection risk",
            "CRITICAL",
            (10, 12, 10, 55),
            "The SQL query is built with string concatenation and is open to injection.",
            "Use a PreparedStatement with bound parameters (?).",
            "security",
            ("UserDao", "findByUsername"),
        ),
        mock_issue(
            "RES-001",
            "Connection not released",
            "HIGH",
            (25, 8, 25, 42),
            "The Connection is never closed in a finally block or try-with-resources.",
            "Open the connection in try-with-resources or close it in finally.",
            "resource_management",
            ("UserDao", "updateUser"),
        ),
        mock_issue(
            "ERR-002",
            "Empty catch block",
            "MEDIUM",
            (42, 9, 44, 9),
            "The catch block is empty, so the exception is silently dropped.",
            "Log the exception or handle it; at minimum call log.error().",
            "exception_handling",
            ("OrderService", "processOrder"),
        ),
        mock_issue(
            "PERF-001",
            "Database call inside loop",
            "LOW",
            (67, 16, 67, 48),
            "The loop queries the database on every iteration (N+1 queries).",
            "Fetch the rows in one query with IN or a JOIN.",
            "performance",
            ("OrderService", "loadOrderDetails"),
        ),
        mock_issue(
            "STY-003",
            "Magic number",
            "LOW",
            (89, 20, 89, 22),
            "The numeric literal 30 is used without a name.",
            "Extract it to a constant such as MAX_RETRY_COUNT.",
            "code_style",
            ("RetryHandler", "execute"),
        ),
    ]
}
