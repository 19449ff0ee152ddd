use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use tenet_core::types::{ComplianceReport, Severity, Violation};

use super::{Env, Format, print_json};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// File to check, relative to the project root
    pub file: PathBuf,

    /// Read the code from stdin and attribute it to FILE
    #[arg(long)]
    pub stdin: bool,

    /// Minimum severity to report: low, medium, high
    #[arg(long, value_parser = parse_severity)]
    pub severity: Option<Severity>,

    /// Compute the fixed code
    #[arg(long)]
    pub fix: bool,

    /// Write the fixed code back to FILE (implies --fix)
    #[arg(long, conflicts_with = "stdin")]
    pub write: bool,

    /// Exit with an error when any violation is reported
    #[arg(long)]
    pub strict: bool,

    #[arg(long, value_enum, default_value_t)]
    pub format: Format,
}

fn parse_severity(s: &str) -> Result<Severity, String> {
    Severity::parse(&s.to_ascii_lowercase())
        .ok_or_else(|| format!("unknown severity '{s}' (expected low, medium or high)"))
}

pub async fn run(args: CheckArgs, env: &Env) -> anyhow::Result<()> {
    let service = env.open_service()?;
    let file = args.file.to_string_lossy().to_string();
    let snippet = if args.stdin {
        Some(std::io::read_to_string(std::io::stdin()).context("Cannot read code from stdin")?)
    } else {
        None
    };

    let report = service
        .check_compliance(&file, snippet.as_deref(), args.severity, args.fix || args.write)
        .await?;

    if args.write {
        if let Some(fixed) = &report.fixed_code {
            let path = service.root().join(&report.file_path);
            std::fs::write(&path, fixed)
                .with_context(|| format!("Cannot write fixed code: {}", path.display()))?;
        }
    }

    match args.format {
        Format::Json => print_json(&report)?,
        Format::Text => print_report(&report, args.write, env),
    }

    let total = report.all().count();
    if args.strict && total > 0 {
        anyhow::bail!("Compliance check failed: {total} issues in {}", report.file_path);
    }
    Ok(())
}

fn print_report(report: &ComplianceReport, wrote: bool, env: &Env) {
    if let Some(reason) = &report.skipped_reason {
        env.say(format!("{}: not analyzed ({reason})", report.file_path));
        return;
    }
    env.say(format!(
        "{}: score {}/100 ({} patterns checked, {}ms)",
        report.file_path, report.overall_score, report.patterns_checked, report.check_duration_ms
    ));
    for (label, group) in [
        ("violation", &report.violations),
        ("warning", &report.warnings),
        ("suggestion", &report.suggestions),
    ] {
        for v in group {
            env.say(format_violation(label, v));
        }
    }
    if report.fixed_code.is_some() {
        if wrote {
            env.say("  fixes written");
        } else if report.all().any(|v| v.suggested_fix.is_some()) {
            env.say("  fixes available (use --write to apply)");
        }
    }
}

fn format_violation(label: &str, v: &Violation) -> String {
    let line = format!(
        "  {}:{} {label} [pattern {}] {} (confidence {:.2})",
        v.location.start_line, v.location.start_column, v.pattern_id, v.message, v.confidence
    );
    match &v.suggested_fix {
        Some(fix) => format!("{line}\n      fix: {fix}"),
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_parsing_is_case_insensitive() {
        assert_eq!(parse_severity("HIGH"), Ok(Severity::High));
        assert!(parse_severity("urgent").is_err());
    }
}
