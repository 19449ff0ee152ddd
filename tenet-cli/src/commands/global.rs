use clap::Args;

use tenet_core::types::{GlobalPatternFilter, Language, PatternCategory};

use super::patterns::{parse_category, parse_language};
use super::{Env, Format, print_json};

#[derive(Args, Debug)]
pub struct GlobalArgs {
    #[arg(long, value_parser = parse_category)]
    pub category: Option<PatternCategory>,

    #[arg(long, value_parser = parse_language)]
    pub language: Option<Language>,

    /// Minimum number of contributing projects
    #[arg(long, default_value = "1")]
    pub min_projects: usize,

    /// Minimum consensus score (0.0-1.0)
    #[arg(long, default_value = "0.0")]
    pub min_consensus: f64,

    #[arg(long, value_enum, default_value_t)]
    pub format: Format,
}

pub async fn run(args: GlobalArgs, env: &Env) -> anyhow::Result<()> {
    let service = env.open_service()?;
    let patterns = service
        .get_global_patterns(&GlobalPatternFilter {
            category: args.category,
            min_project_count: args.min_projects,
            min_consensus: args.min_consensus,
            language: args.language,
        })
        .await?;

    if args.format == Format::Json {
        return print_json(&patterns);
    }
    if patterns.is_empty() {
        env.say("No global patterns (link projects and run `tenet sync`)");
        return Ok(());
    }
    for p in &patterns {
        env.say(format!(
            "{:<44} {:<28} projects {}  confidence {:.2}  consensus {:.2}",
            p.signature,
            p.dominant_form.describe(),
            p.project_count(),
            p.aggregated_confidence,
            p.consensus_score
        ));
    }
    Ok(())
}
