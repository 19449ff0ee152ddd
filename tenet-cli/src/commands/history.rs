use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Args;

use super::{Env, Format, print_json};

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Maximum number of runs to show
    #[arg(long, default_value = "20")]
    pub limit: usize,

    /// Only runs started at or after this RFC 3339 timestamp
    #[arg(long)]
    pub since: Option<String>,

    #[arg(long, value_enum, default_value_t)]
    pub format: Format,
}

pub async fn run(args: HistoryArgs, env: &Env) -> anyhow::Result<()> {
    let since = args
        .since
        .as_deref()
        .map(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Utc))
                .with_context(|| format!("Invalid --since timestamp: {s}"))
        })
        .transpose()?;

    let service = env.open_service()?;
    let deltas = service.get_learning_history(args.limit, since).await?;

    if args.format == Format::Json {
        return print_json(&deltas);
    }
    if deltas.is_empty() {
        env.say("No learning runs yet");
        return Ok(());
    }
    for d in &deltas {
        let c = &d.counts;
        let commit = d
            .commit_sha
            .as_deref()
            .map_or("", |sha| &sha[..sha.len().min(12)]);
        env.say(format!(
            "{:>5}  {}  {:<10} {:<7} {:<12} patterns +{} ~{} -{}  concepts +{} ~{} -{}",
            d.id,
            d.created_at.format("%Y-%m-%d %H:%M:%S"),
            d.status.as_str(),
            d.trigger.as_str(),
            commit,
            c.patterns_added,
            c.patterns_modified,
            c.patterns_removed,
            c.concepts_added,
            c.concepts_modified,
            c.concepts_removed
        ));
        if let Some(error) = &d.error {
            env.say(format!("       error: {error}"));
        }
    }
    Ok(())
}
