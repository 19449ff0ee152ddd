use clap::Args;

use tenet_core::types::{PatternId, ViolationFilter};

use super::{Env, Format, print_json};

#[derive(Args, Debug)]
pub struct ViolationsArgs {
    /// Only violations in this file
    #[arg(long)]
    pub file: Option<String>,

    /// Only violations of this pattern
    #[arg(long)]
    pub pattern: Option<i64>,

    /// Include resolved violations
    #[arg(long)]
    pub all: bool,

    #[arg(long, value_enum, default_value_t)]
    pub format: Format,
}

pub async fn run(args: ViolationsArgs, env: &Env) -> anyhow::Result<()> {
    let service = env.open_service()?;
    let violations = service
        .store()
        .list_violations(&ViolationFilter {
            open_only: !args.all,
            file_path: args.file.map(|f| service.relative_path(&f)),
            pattern_id: args.pattern.map(PatternId),
        })
        .await?;

    if args.format == Format::Json {
        return print_json(&violations);
    }
    if violations.is_empty() {
        env.say("No violations");
        return Ok(());
    }
    for v in &violations {
        let state = v
            .resolution
            .map_or_else(|| "open".to_string(), |r| r.as_str().to_string());
        env.say(format!(
            "{:>5}  {}:{}  [pattern {}] {}  ({state})",
            v.id, v.file_path, v.location.start_line, v.pattern_id, v.message
        ));
    }
    Ok(())
}
