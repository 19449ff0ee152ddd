use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use tracing::info;

use tenet_core::learn::CancellationHandle;
use tenet_core::types::{DeltaStatus, GitChange, LearningDelta};

use super::{Env, Format, print_json};

#[derive(Args, Debug)]
pub struct LearnArgs {
    /// JSON array of changes (`[{"type":"modified","path":"src/a.ts"}]`);
    /// `-` reads stdin. Without it the whole project is learned.
    #[arg(long)]
    pub changes: Option<PathBuf>,

    /// Commit SHA applied to changes that carry none
    #[arg(long)]
    pub commit: Option<String>,

    /// Commit message applied to changes that carry none
    #[arg(long)]
    pub message: Option<String>,

    #[arg(long, value_enum, default_value_t)]
    pub format: Format,
}

pub async fn run(args: LearnArgs, env: &Env) -> anyhow::Result<()> {
    let service = env.open_service()?;
    let cancel = interrupt_handle();

    let delta = match &args.changes {
        Some(source) => {
            let mut changes = read_changes(source)?;
            for change in &mut changes {
                if change.commit_sha.is_none() {
                    change.commit_sha.clone_from(&args.commit);
                }
                if change.commit_message.is_none() {
                    change.commit_message.clone_from(&args.message);
                }
            }
            info!(changes = changes.len(), "Processing change feed");
            service.process_changes(&changes, &cancel).await?
        }
        None => service.learn_project(&cancel).await?,
    };

    report(&delta, args.format, env)
}

/// A cancellation handle tripped by Ctrl-C; the run stops at the next file.
pub(crate) fn interrupt_handle() -> CancellationHandle {
    let cancel = CancellationHandle::new();
    let handle = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });
    cancel
}

fn read_changes(source: &Path) -> anyhow::Result<Vec<GitChange>> {
    let text = if source.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).context("Cannot read changes from stdin")?
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Cannot read changes: {}", source.display()))?
    };
    serde_json::from_str(&text).context("Cannot parse change feed")
}

/// Print a learning run; a failed run is an error.
pub(crate) fn report(delta: &LearningDelta, format: Format, env: &Env) -> anyhow::Result<()> {
    if format == Format::Json {
        print_json(delta)?;
    } else {
        let c = &delta.counts;
        env.say(format!(
            "Learning run {} {} in {}ms ({} files)",
            delta.id,
            delta.status.as_str(),
            delta.duration_ms,
            delta.files_changed.len()
        ));
        env.say(format!(
            "  patterns: +{} ~{} -{}",
            c.patterns_added, c.patterns_modified, c.patterns_removed
        ));
        env.say(format!(
            "  concepts: +{} ~{} -{}",
            c.concepts_added, c.concepts_modified, c.concepts_removed
        ));
        if c.degraded_files > 0 {
            env.say(format!("  degraded: {} files (naming only)", c.degraded_files));
        }
    }

    if delta.status == DeltaStatus::Failed {
        anyhow::bail!(
            "Learning run {} failed: {}",
            delta.id,
            delta.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
