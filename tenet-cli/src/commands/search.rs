use clap::Args;

use tenet_core::types::SearchMode;

use super::{Env, Format, print_json};

#[derive(Args, Debug)]
pub struct SearchArgs {
    pub query: String,

    /// patterns, concepts or all
    #[arg(long, default_value = "all", value_parser = parse_mode)]
    pub mode: SearchMode,

    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long, value_enum, default_value_t)]
    pub format: Format,
}

fn parse_mode(s: &str) -> Result<SearchMode, String> {
    SearchMode::parse(&s.to_ascii_lowercase())
        .ok_or_else(|| format!("unknown mode '{s}' (expected patterns, concepts or all)"))
}

pub async fn run(args: SearchArgs, env: &Env) -> anyhow::Result<()> {
    let service = env.open_service()?;
    let hits = service
        .search_all_projects(&args.query, args.mode, args.limit)
        .await?;

    if args.format == Format::Json {
        return print_json(&hits);
    }
    if hits.is_empty() {
        env.say(format!("No matches for '{}'", args.query));
        return Ok(());
    }
    for hit in &hits {
        let location = hit
            .file_path
            .as_deref()
            .map_or_else(String::new, |f| format!("  {f}"));
        env.say(format!(
            "[{}] {:<8} {}  {}{location}",
            hit.project_name, hit.kind, hit.name, hit.detail
        ));
    }
    Ok(())
}
