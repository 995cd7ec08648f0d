use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Category bucket for issues the server did not categorise.
pub const UNCATEGORIZED: &str = "general";

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical, // Must fix before merge
    High,     // Likely bug or resource leak
    Medium,   // Fails under specific conditions
    Low,      // Style and minor performance
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    /// Case-insensitive lookup that never fails; unknown labels map to `Low`.
    pub fn from_raw(raw: &str) -> Severity {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.name().eq_ignore_ascii_case(raw))
            .unwrap_or(Severity::Low)
    }

    pub fn name(self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }

    pub fn priority(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Sarif,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Sarif => f.write_str("sarif"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckOptions {
    pub format: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    pub code: String,
    pub file_name: String,
    pub options: CheckOptions,
}

impl CheckRequest {
    pub fn new(code: impl Into<String>, file_name: impl Into<String>, format: OutputFormat) -> Self {
        Self {
            code: code.into(),
            file_name: file_name.into(),
            options: CheckOptions { format },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawIssue")]
pub struct Issue {
    pub rule_id: String,
    pub title: String,
    #[serde(rename = "severity")]
    pub severity_raw: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_column: Option<u32>,
}

impl Issue {
    pub fn severity(&self) -> Severity {
        Severity::from_raw(&self.severity_raw)
    }

    pub fn category_or_default(&self) -> &str {
        self.category.as_deref().unwrap_or(UNCATEGORIZED)
    }

    /// `Class.method()` location label, if the server sent either part.
    pub fn location(&self) -> Option<String> {
        match (&self.class_name, &self.method_name) {
            (Some(c), Some(m)) => Some(format!("{}.{}()", c, m)),
            (Some(c), None) => Some(c.clone()),
            (None, Some(m)) => Some(format!("{}()", m)),
            (None, None) => None,
        }
    }
}

// Wire shape; converted through `TryFrom` so the line range is checked once.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIssue {
    rule_id: String,
    title: String,
    severity: String,
    message: String,
    suggestion: Option<String>,
    category: Option<String>,
    class_name: Option<String>,
    method_name: Option<String>,
    line: Option<u32>,
    column: Option<u32>,
    end_line: Option<u32>,
    end_column: Option<u32>,
}

impl TryFrom<RawIssue> for Issue {
    type Error = String;

    fn try_from(raw: RawIssue) -> Result<Self, Self::Error> {
        if let (Some(line), Some(end_line)) = (raw.line, raw.end_line) {
            if end_line < line {
                return Err(format!(
                    "issue {}: endLine {} precedes line {}",
                    raw.rule_id, end_line, line
                ));
            }
        }
        Ok(Issue {
            rule_id: raw.rule_id,
            title: raw.title,
            severity_raw: raw.severity,
            message: raw.message,
            suggestion: raw.suggestion,
            category: raw.category,
            class_name: raw.class_name,
            method_name: raw.method_name,
            line: raw.line,
            column: raw.column,
            end_line: raw.end_line,
            end_column: raw.end_column,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_issues: usize,
    #[serde(default)]
    pub by_severity: BTreeMap<String, usize>,
    #[serde(default)]
    pub by_category: BTreeMap<String, usize>,
}

impl Summary {
    pub fn from_issues(issues: &[Issue]) -> Self {
        let mut by_severity = BTreeMap::new();
        let mut by_category = BTreeMap::new();
        for issue in issues {
            *by_severity.entry(issue.severity().name().to_string()).or_insert(0) += 1;
            *by_category.entry(issue.category_or_default().to_string()).or_insert(0) += 1;
        }
        Self {
            total_issues: issues.len(),
            by_severity,
            by_category,
        }
    }

    /// True when both groupings add up to `total_issues`.
    pub fn is_consistent(&self) -> bool {
        self.by_severity.values().sum::<usize>() == self.total_issues
            && self.by_category.values().sum::<usize>() == self.total_issues
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.by_severity.get(severity.name()).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckStats {
    #[serde(default)]
    pub llm_calls: u32,
    #[serde(default, rename = "processingTime", alias = "processingTimeMs")]
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rules_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<CheckStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResponse {
    /// Issues ordered by severity, stable within a severity.
    pub fn sorted_issues(&self) -> Vec<&Issue> {
        let mut issues: Vec<&Issue> = self.issues.iter().collect();
        issues.sort_by_key(|i| i.severity());
        issues
    }

    /// The server's summary when present, otherwise one computed from `issues`.
    pub fn effective_summary(&self) -> Summary {
        self.summary
            .clone()
            .unwrap_or_else(|| Summary::from_issues(&self.issues))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Host unresolved or connection refused
    Network,
    /// Call timeout budget exceeded
    Timeout,
    /// Non-2xx, `success=false`, or anything unclassified
    ServerError,
    /// Empty or malformed terminal JSON
    ParseError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Network => "NETWORK",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::ServerError => "SERVER_ERROR",
            ErrorKind::ParseError => "PARSE_ERROR",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckResult {
    Success(CheckResponse),
    Failure { message: String, kind: ErrorKind },
}

impl CheckResult {
    pub fn failure(message: impl Into<String>, kind: ErrorKind) -> Self {
        CheckResult::Failure {
            message: message.into(),
            kind,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CheckResult::Success(_))
    }
}
