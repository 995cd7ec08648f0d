use crate::config::Overrides;
use crate::types::OutputFormat;
use clap::Parser;
use std::path::PathBuf;

const TAGLINE: &str = "Submit source code to a remote analysis server and review the findings";

#[derive(Parser, Debug)]
#[command(name = "code-check")]
#[command(version)]
#[command(about = TAGLINE, long_about = None)]
pub struct Args {
    /// Source file to check (not needed with --probe)
    #[arg(required_unless_present = "probe")]
    pub file: Option<PathBuf>,

    /// Only check a line range of the file, e.g. 10:42 (1-based, inclusive)
    #[arg(long, value_name = "START:END", value_parser = parse_line_range)]
    pub lines: Option<(usize, usize)>,

    /// Analysis server base URL
    #[arg(long, value_name = "URL")]
    pub server_url: Option<String>,

    /// Overall timeout for one check, in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Report format requested from the server
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Use the built-in offline checker instead of the server
    #[arg(long)]
    pub mock: bool,

    /// Config file (defaults to ./code-check.toml when present)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Test the connection to the server and exit
    #[arg(long)]
    pub probe: bool,

    /// Output the raw server response as JSON
    #[arg(long)]
    pub json: bool,

    /// Show suggestions and locations for every issue
    #[arg(short, long)]
    pub verbose: bool,

    /// Print summary only
    #[arg(long)]
    pub summary: bool,

    /// Fail with non-zero exit code if critical findings exist
    #[arg(long)]
    pub fail_on_findings: bool,
}

impl Args {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            server_url: self.server_url.clone(),
            call_timeout_seconds: self.timeout,
            output_format: self.format,
            mock_mode: self.mock,
        }
    }
}

fn parse_line_range(s: &str) -> Result<(usize, usize), String> {
    let (start, end) = s
        .split_once(':')
        .ok_or_else(|| format!("expected START:END, got '{}'", s))?;
    let start: usize = start.trim().parse().map_err(|_| format!("bad start line '{}'", start))?;
    let end: usize = end.trim().parse().map_err(|_| format!("bad end line '{}'", end))?;
    if start == 0 || end < start {
        return Err(format!("invalid line range {}:{}", start, end));
    }
    Ok((start, end))
}

pub fn parse() -> Args {
    Args::parse()
}
