use anyhow::{Context, Result};
use code_check::cli::{self, Args};
use code_check::report::{self, ConsoleProgress};
use code_check::{build_checker, config, CheckResult, RequestOrchestrator, Severity};
use std::fs;
use tracing_subscriber::{fmt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let args = cli::parse();

    let config = config::resolve(args.config.as_deref(), &args.overrides())
        .context("failed to load configuration")?;
    let checker = build_checker(&config);

    if args.probe {
        let reachable = checker.probe();
        report::print_probe(&config.base_url, reachable);
        if !reachable {
            std::process::exit(1);
        }
        return Ok(());
    }

    let (code, file_name, line_count) = load_source(&args)?;

    if !args.json {
        report::print_banner();
    }

    let mut orchestrator = RequestOrchestrator::new(checker, config, ConsoleProgress::default());
    orchestrator.submit(&code, &file_name, line_count)?;
    orchestrator.run_until_idle();

    let result = orchestrator
        .into_observer()
        .take_result()
        .context("check finished without a result")?;
    report::print_result(&result, &file_name, &args)?;

    match &result {
        CheckResult::Success(response) => {
            let has_critical = response
                .issues
                .iter()
                .any(|i| i.severity() == Severity::Critical);
            if has_critical && args.fail_on_findings {
                eprintln!("\n⚠️  CRITICAL issues found. Fix them before merging.");
                std::process::exit(1);
            }
        }
        CheckResult::Failure { .. } => std::process::exit(1),
    }

    Ok(())
}

/// Read the file (or the `--lines` selection of it).
fn load_source(args: &Args) -> Result<(String, String, usize)> {
    let path = args
        .file
        .as_ref()
        .context("a source file is required")?;
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    let code = match args.lines {
        Some((start, end)) => {
            let selected: Vec<&str> = text.lines().skip(start - 1).take(end - start + 1).collect();
            if selected.is_empty() {
                anyhow::bail!("{} has no lines in range {}:{}", path.display(), start, end);
            }
            selected.join("\n")
        }
        None => text,
    };

    if code.trim().is_empty() {
        anyhow::bail!("nothing to check: {} is empty", path.display());
    }

    let line_count = code.lines().count();
    Ok((code, file_name, line_count))
}
