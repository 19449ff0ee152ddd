use clap::Args;

use tenet_core::service::TenetService;

use super::{Env, Format};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Create the store without learning the project
    #[arg(long)]
    pub no_learn: bool,
}

pub async fn run(args: InitArgs, env: &Env) -> anyhow::Result<()> {
    let root = env.project_root()?;
    let service = env.with_progress(TenetService::init(&root, &env.registry_path()?)?);
    env.say(format!("Initialized Tenet in {}", root.join(".tenet").display()));

    if args.no_learn {
        return Ok(());
    }
    let cancel = super::learn::interrupt_handle();
    let delta = service.learn_project(&cancel).await?;
    super::learn::report(&delta, Format::Text, env)
}
