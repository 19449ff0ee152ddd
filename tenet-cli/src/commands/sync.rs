use clap::Args;

use super::{Env, Format, print_json};

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Project ids to resync (default: every linked project)
    pub projects: Vec<String>,

    #[arg(long, value_enum, default_value_t)]
    pub format: Format,
}

pub async fn run(args: SyncArgs, env: &Env) -> anyhow::Result<()> {
    let service = env.open_service()?;
    let run = service.aggregator().aggregate(&args.projects).await?;

    if args.format == Format::Json {
        return print_json(&run);
    }
    env.say(format!("{} global patterns", run.patterns.len()));
    for omitted in &run.omitted {
        env.say(format!("  omitted {}: {}", omitted.project_id, omitted.reason));
    }
    Ok(())
}
