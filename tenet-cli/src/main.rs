use std::path::PathBuf;

use clap::Parser;

use tenet_core::error::{LearnError, TenetError};

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "tenet",
    version,
    about = "Learn a codebase's conventions and check code against them"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Project root (default: current directory)
    #[arg(short = 'C', long, default_value = ".", global = true)]
    project: PathBuf,

    /// Registry database for linked projects
    #[arg(long, env = "TENET_REGISTRY", global = true)]
    registry: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Map an error to the process exit code.
///
///   0  success
///   1  general error (including failed compliance or learning runs)
///   2  configuration error
///   3  project not initialized / path not found
///   4  database error
///   5  learning already in progress
fn classify_exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(tenet) = cause.downcast_ref::<TenetError>() {
            return match tenet {
                TenetError::NotInitialized(_) => 3,
                TenetError::Config(_) => 2,
                TenetError::Store(_) => 4,
                TenetError::Learn(LearnError::AlreadyInProgress { .. }) => 5,
                _ => 1,
            };
        }
    }

    let lower = format!("{err:#}").to_lowercase();
    if lower.contains("cannot resolve path") {
        3
    } else if lower.contains("config") {
        2
    } else if lower.contains("database") || lower.contains("sqlite") {
        4
    } else {
        1
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (_, 0) => "warn",
        (_, 1) => "info",
        (_, 2) => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: Failed to create runtime: {e}");
            std::process::exit(1);
        }
    };

    let env = commands::Env {
        project: cli.project,
        registry: cli.registry,
        quiet: cli.quiet,
    };
    match runtime.block_on(commands::run(cli.command, &env)) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(classify_exit_code(&e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenet_core::error::{ConfigError, StoreError};

    #[test]
    fn exit_code_not_initialized() {
        let err = anyhow::Error::from(TenetError::NotInitialized("/foo".into()));
        assert_eq!(classify_exit_code(&err), 3);
    }

    #[test]
    fn exit_code_survives_context() {
        let err = anyhow::Error::from(TenetError::Config(ConfigError::Parse("bad toml".into())))
            .context("Cannot load project");
        assert_eq!(classify_exit_code(&err), 2);
    }

    #[test]
    fn exit_code_database() {
        let err = anyhow::Error::from(TenetError::Store(StoreError::NotFound("pattern 9".into())));
        assert_eq!(classify_exit_code(&err), 4);
    }

    #[test]
    fn exit_code_learning_conflict() {
        let err = anyhow::Error::from(TenetError::Learn(LearnError::AlreadyInProgress {
            project: "p".into(),
        }));
        assert_eq!(classify_exit_code(&err), 5);
    }

    #[test]
    fn exit_code_cannot_resolve() {
        let err = anyhow::anyhow!("Cannot resolve path: /nonexistent");
        assert_eq!(classify_exit_code(&err), 3);
    }

    #[test]
    fn exit_code_general() {
        let err = anyhow::anyhow!("Something unexpected happened");
        assert_eq!(classify_exit_code(&err), 1);
    }
}
