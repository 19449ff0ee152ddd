use std::path::PathBuf;

use clap::Args;

use super::Env;

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Project to link (default: this project)
    pub path: Option<PathBuf>,

    /// Display name (default: directory name)
    #[arg(long)]
    pub name: Option<String>,
}

pub async fn run(args: LinkArgs, env: &Env) -> anyhow::Result<()> {
    let service = env.open_service()?;
    let target = args
        .path
        .unwrap_or_else(|| service.root().to_path_buf());
    let project = service
        .link_project(&target.to_string_lossy(), args.name.as_deref())
        .await?;
    env.say(format!(
        "Linked {} ({}) at {}: {} patterns, {} concepts",
        project.name, project.id, project.path, project.pattern_count, project.concept_count
    ));
    Ok(())
}
