use clap::Args;

use tenet_core::types::{Language, PatternCategory, PatternFilter};

use super::{Env, Format, print_json};

#[derive(Args, Debug)]
pub struct PatternsArgs {
    /// Only this category: naming, structural, implementation
    #[arg(long, value_parser = parse_category)]
    pub category: Option<PatternCategory>,

    /// Only this language
    #[arg(long, value_parser = parse_language)]
    pub language: Option<Language>,

    /// Minimum observed frequency
    #[arg(long)]
    pub min_frequency: Option<u64>,

    /// Include patterns whose frequency dropped to zero
    #[arg(long)]
    pub all: bool,

    #[arg(long, value_enum, default_value_t)]
    pub format: Format,
}

pub(crate) fn parse_category(s: &str) -> Result<PatternCategory, String> {
    PatternCategory::parse(&s.to_ascii_lowercase()).ok_or_else(|| {
        format!("unknown category '{s}' (expected naming, structural or implementation)")
    })
}

pub(crate) fn parse_language(s: &str) -> Result<Language, String> {
    Language::parse(&s.to_ascii_lowercase()).ok_or_else(|| format!("unknown language '{s}'"))
}

pub async fn run(args: PatternsArgs, env: &Env) -> anyhow::Result<()> {
    let service = env.open_service()?;
    let patterns = service
        .store()
        .list_patterns(&PatternFilter {
            category: args.category,
            language: args.language,
            min_frequency: args.min_frequency,
            include_deleted: args.all,
        })
        .await?;

    if args.format == Format::Json {
        return print_json(&patterns);
    }
    if patterns.is_empty() {
        env.say("No patterns learned yet (run `tenet learn`)");
        return Ok(());
    }
    let threshold = service.config().patterns.frequency_threshold;
    for p in &patterns {
        let marker = if p.frequency < threshold { " (below threshold)" } else { "" };
        env.say(format!(
            "{:>5}  {:<44} {:<28} conf {:.2}  freq {}{marker}",
            p.id,
            p.signature,
            p.expected_form.describe(),
            p.confidence,
            p.frequency
        ));
    }
    Ok(())
}
