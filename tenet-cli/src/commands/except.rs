use anyhow::Context;
use chrono::{Duration, Utc};
use clap::Args;

use tenet_core::types::{NewException, PatternId};

use super::{Env, Format, print_json};

#[derive(Args, Debug)]
pub struct ExceptArgs {
    /// Pattern to suppress (see `tenet patterns`)
    #[arg(required_unless_present = "list")]
    pub pattern: Option<i64>,

    /// Limit the exception to one file (default: whole project)
    #[arg(long)]
    pub file: Option<String>,

    /// Why the pattern does not apply
    #[arg(long, required_unless_present = "list")]
    pub reason: Option<String>,

    /// Expire the exception after this many days
    #[arg(long)]
    pub expires_in_days: Option<i64>,

    /// List exceptions instead of adding one
    #[arg(long)]
    pub list: bool,

    /// With --list, include expired exceptions
    #[arg(long, requires = "list")]
    pub expired: bool,

    #[arg(long, value_enum, default_value_t)]
    pub format: Format,
}

pub async fn run(args: ExceptArgs, env: &Env) -> anyhow::Result<()> {
    let service = env.open_service()?;

    if args.list {
        let exceptions = service.store().list_exceptions(args.expired).await?;
        if args.format == Format::Json {
            return print_json(&exceptions);
        }
        if exceptions.is_empty() {
            env.say("No exceptions");
        }
        let now = Utc::now();
        for e in &exceptions {
            env.say(format!(
                "{:>5}  pattern {}  {}  expires {}{}  {}",
                e.id,
                e.pattern_id,
                e.file_path.as_deref().unwrap_or("(project)"),
                e.expires_at
                    .map_or_else(|| "never".to_string(), |at| at.to_rfc3339()),
                if e.is_active(now) { "" } else { " (expired)" },
                e.reason
            ));
        }
        return Ok(());
    }

    let pattern_id = PatternId(args.pattern.context("A pattern id is required")?);
    let reason = args.reason.context("A reason is required")?;
    service
        .store()
        .get_pattern(pattern_id)
        .await?
        .with_context(|| format!("Unknown pattern {pattern_id}"))?;

    let id = service
        .store()
        .add_exception(&NewException {
            pattern_id,
            file_path: args.file.map(|f| service.relative_path(&f)),
            reason,
            expires_at: args.expires_in_days.map(|days| Utc::now() + Duration::days(days)),
        })
        .await?;
    env.say(format!("Added exception {id} for pattern {pattern_id}"));
    Ok(())
}
