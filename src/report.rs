use crate::cli::Args;
use crate::orchestrator::ProgressObserver;
use crate::types::{CheckResponse, CheckResult, ErrorKind, Issue, Severity, Summary};
use colored::*;
use std::io::Write;
use std::time::Duration;

/// Icon and colour for a severity. Kept out of `Severity` itself.
pub fn severity_style(severity: Severity) -> (&'static str, Color) {
    match severity {
        Severity::Critical => ("🔴", Color::Red),
        Severity::High => ("🟠", Color::Yellow),
        Severity::Medium => ("🟡", Color::BrightYellow),
        Severity::Low => ("⚪", Color::BrightBlack),
    }
}

fn badge(severity: Severity) -> ColoredString {
    let (icon, color) = severity_style(severity);
    format!("{} {:<8}", icon, severity.name()).color(color).bold()
}

/// What to do next, per failure kind.
pub fn failure_hint(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Network => "Check the server URL (--server-url or code-check.toml) and that the server is running.",
        ErrorKind::Timeout => "The server took too long. Raise --timeout or check a smaller selection with --lines.",
        ErrorKind::ServerError => "The server rejected or failed the check. See the server logs for details.",
        ErrorKind::ParseError => "The server answered with something that is not a check report. Is the URL pointing at the right service?",
    }
}

pub fn print_banner() {
    eprintln!(
        "{} {}",
        format!("code-check v{}", env!("CARGO_PKG_VERSION")).bold().cyan(),
        "· remote code quality review".italic()
    );
}

pub fn print_probe(base_url: &str, reachable: bool) {
    if reachable {
        println!("{} {}", "✅ Server reachable:".green().bold(), base_url);
    } else {
        println!("{} {}", "🔌 Server not reachable:".red().bold(), base_url);
        println!("   {}", failure_hint(ErrorKind::Network).bright_black());
    }
}

pub fn print_result(result: &CheckResult, file_name: &str, args: &Args) -> anyhow::Result<()> {
    match result {
        CheckResult::Success(response) => print_report(response, file_name, args),
        CheckResult::Failure { message, kind } => {
            print_failure(message, *kind);
            Ok(())
        }
    }
}

pub fn print_failure(message: &str, kind: ErrorKind) {
    let icon = if kind == ErrorKind::Network { "🔌" } else { "❌" };
    eprintln!("\n{} {} {}", icon, "Check failed:".red().bold(), message.red());
    eprintln!("   {} {}", format!("[{}]", kind).bright_black(), failure_hint(kind));
}

pub fn print_report(response: &CheckResponse, file_name: &str, args: &Args) -> anyhow::Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }

    let shown_name = response.file_name.as_deref().unwrap_or(file_name);
    println!("\n{}", "═".repeat(80).bright_black());
    println!("{} {}", "CHECK REPORT:".bold().white(), shown_name.yellow().bold());
    println!("{}", "═".repeat(80).bright_black());

    if let Some(summary) = &response.summary {
        if !summary.is_consistent() {
            tracing::warn!(
                total = summary.total_issues,
                "server summary does not add up to its total"
            );
        }
    }

    if response.issues.is_empty() {
        println!("\n{}", "✅ No issues found!".green().bold());
        print_processing_info(response);
        return Ok(());
    }

    print_summary_bar(response);

    if args.summary {
        print_category_breakdown(response);
    } else {
        for (i, issue) in response.sorted_issues().into_iter().enumerate() {
            print_issue(i + 1, issue, args.verbose);
        }
    }

    print_processing_info(response);
    Ok(())
}

fn print_summary_bar(response: &CheckResponse) {
    println!("{}", summary_bar(&response.effective_summary()));
}

// Total and per-severity counts both come from the same summary.
fn summary_bar(summary: &Summary) -> String {
    let mut bar = format!("\n🔍 {} issues  ", summary.total_issues.to_string().bold());
    for severity in Severity::ALL {
        let count = summary.count(severity);
        if count > 0 {
            let (icon, color) = severity_style(severity);
            bar.push_str(&format!("{}{} ", icon, format!("{}({})", severity.name(), count).color(color)));
        }
    }
    bar.trim_end().to_string()
}

fn print_category_breakdown(response: &CheckResponse) {
    let summary = response.effective_summary();
    let mut categories: Vec<_> = summary.by_category.iter().collect();
    categories.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

    println!("\n{}", "BY CATEGORY".bold());
    println!("{}", "─".repeat(80).bright_black());
    for (category, count) in categories {
        println!("  • {:<24} {}", category.cyan(), count);
    }
}

fn print_issue(index: usize, issue: &Issue, verbose: bool) {
    let line = issue
        .line
        .map(|l| format!("L.{}", l))
        .unwrap_or_default();
    println!(
        "\n{}. {} {} {}  {}",
        index,
        badge(issue.severity()),
        issue.rule_id.cyan(),
        issue.title.bold(),
        line.yellow()
    );
    println!("   {}", issue.message);

    if let Some(suggestion) = &issue.suggestion {
        println!("   💡 {}", suggestion.italic());
    }
    if verbose {
        if let Some(location) = issue.location() {
            println!("   📍 {}", location.bright_black());
        }
        if let Some(category) = &issue.category {
            println!("   🏷  {}", category.bright_black());
        }
    }
}

fn print_processing_info(response: &CheckResponse) {
    let mut parts = Vec::new();
    if let Some(ms) = response.processing_time_ms {
        parts.push(format!("⏱️  {}ms", ms));
    }
    if let Some(rules) = response.matched_rules_count {
        parts.push(format!("{} rules matched", rules));
    }
    if let Some(stats) = &response.stats {
        parts.push(format!("{} LLM calls", stats.llm_calls));
    }
    if !response.tags.is_empty() {
        parts.push(response.tags.join(", "));
    }
    if !parts.is_empty() {
        println!("\n{}", parts.join(" · ").bright_black());
    }
}

/// Terminal progress line: elapsed counter plus a "server active" marker
/// once heartbeats arrive. Keeps the terminal result for the caller.
#[derive(Default)]
pub struct ConsoleProgress {
    elapsed: u64,
    heartbeats: u64,
    result: Option<CheckResult>,
}

impl ConsoleProgress {
    pub fn take_result(&mut self) -> Option<CheckResult> {
        self.result.take()
    }

    fn redraw(&self) {
        let status = if self.heartbeats > 0 {
            "server is analysing".green().to_string()
        } else {
            "waiting for server".bright_black().to_string()
        };
        eprint!("\r   {}s elapsed · {}   ", self.elapsed, status);
        let _ = std::io::stderr().flush();
    }
}

impl ProgressObserver for ConsoleProgress {
    fn on_start(&mut self, file_name: &str, line_count: usize) {
        eprintln!("\n⏳ Checking {} ({} lines)...", file_name.yellow(), line_count);
        self.redraw();
    }

    fn on_tick(&mut self, elapsed: Duration) {
        self.elapsed = elapsed.as_secs();
        self.redraw();
    }

    fn on_heartbeat(&mut self, heartbeats: u64) {
        self.heartbeats = heartbeats;
        self.redraw();
    }

    fn on_result(&mut self, result: CheckResult) {
        eprintln!();
        self.result = Some(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_severity_has_a_distinct_icon() {
        let icons: std::collections::HashSet<_> =
            Severity::ALL.iter().map(|s| severity_style(*s).0).collect();
        assert_eq!(icons.len(), 4);
    }

    #[test]
    fn network_hint_points_at_the_url() {
        assert!(failure_hint(ErrorKind::Network).contains("URL"));
    }

    #[test]
    fn summary_bar_uses_server_counts() {
        colored::control::set_override(false);
        let summary = Summary {
            total_issues: 7,
            by_severity: [("CRITICAL".to_string(), 4), ("LOW".to_string(), 3)].into_iter().collect(),
            by_category: Default::default(),
        };
        let bar = summary_bar(&summary);
        assert!(bar.contains("7 issues"), "{}", bar);
        assert!(bar.contains("CRITICAL(4)"), "{}", bar);
        assert!(bar.contains("LOW(3)"), "{}", bar);
        assert!(!bar.contains("HIGH"), "{}", bar);
    }

    #[test]
    fn console_progress_tracks_whole_seconds() {
        let mut progress = ConsoleProgress::default();
        progress.on_tick(Duration::from_millis(2900));
        assert_eq!(progress.elapsed, 2);
    }

    #[test]
    fn console_progress_keeps_the_result_once() {
        let mut progress = ConsoleProgress::default();
        progress.on_result(CheckResult::failure("boom", ErrorKind::ServerError));
        assert!(progress.take_result().is_some());
        assert!(progress.take_result().is_none());
    }
}
