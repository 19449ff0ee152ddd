use clap::Args;

use tenet_core::types::{Resolution, ViolationId};

use super::Env;

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Violation id (see `tenet violations`)
    pub violation: i64,

    /// accepted-fix, overridden, ignored or pattern-updated
    #[arg(value_parser = parse_resolution)]
    pub resolution: Resolution,
}

fn parse_resolution(s: &str) -> Result<Resolution, String> {
    Resolution::parse(&s.to_ascii_lowercase().replace('-', "_")).ok_or_else(|| {
        format!(
            "unknown resolution '{s}' (expected accepted-fix, overridden, ignored or pattern-updated)"
        )
    })
}

pub async fn run(args: ResolveArgs, env: &Env) -> anyhow::Result<()> {
    let service = env.open_service()?;
    let violation = service
        .store()
        .resolve_violation(ViolationId(args.violation), args.resolution)
        .await?;
    env.say(format!(
        "Violation {} resolved as {}",
        violation.id,
        args.resolution.as_str()
    ));
    if args.resolution == Resolution::PatternUpdated {
        env.say(format!("  pattern {} confidence decayed", violation.pattern_id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolutions_accept_dashes() {
        assert_eq!(parse_resolution("accepted-fix"), Ok(Resolution::AcceptedFix));
        assert_eq!(parse_resolution("pattern_updated"), Ok(Resolution::PatternUpdated));
        assert!(parse_resolution("maybe").is_err());
    }
}
