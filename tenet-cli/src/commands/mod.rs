pub mod check;
pub mod except;
pub mod global;
pub mod history;
pub mod init;
pub mod learn;
pub mod link;
pub mod patterns;
pub mod resolve;
pub mod search;
pub mod status;
pub mod sync;
pub mod violations;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Subcommand;

use tenet_core::config::default_registry_path;
use tenet_core::progress::BarReporter;
use tenet_core::service::TenetService;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize Tenet in a project and learn its conventions
    Init(init::InitArgs),
    /// Learn from the whole project or from a change feed
    Learn(learn::LearnArgs),
    /// Check a file (or stdin snippet) against learned patterns
    Check(check::CheckArgs),
    /// List learned patterns
    Patterns(patterns::PatternsArgs),
    /// List recorded violations
    Violations(violations::ViolationsArgs),
    /// Add or list pattern exceptions
    Except(except::ExceptArgs),
    /// Record how a violation was resolved
    Resolve(resolve::ResolveArgs),
    /// Show learning run history
    History(history::HistoryArgs),
    /// Link a project into the cross-project registry
    Link(link::LinkArgs),
    /// Resync linked projects and recompute global patterns
    Sync(sync::SyncArgs),
    /// Show global patterns across linked projects
    Global(global::GlobalArgs),
    /// Search patterns and concepts across linked projects
    Search(search::SearchArgs),
    /// Show the state of this project's pattern store
    Status(status::StatusArgs),
}

/// Options shared by every subcommand.
#[derive(Debug)]
pub struct Env {
    pub project: PathBuf,
    pub registry: Option<PathBuf>,
    pub quiet: bool,
}

impl Env {
    pub fn project_root(&self) -> anyhow::Result<PathBuf> {
        std::fs::canonicalize(&self.project)
            .with_context(|| format!("Cannot resolve path: {}", self.project.display()))
    }

    pub fn registry_path(&self) -> anyhow::Result<PathBuf> {
        match &self.registry {
            Some(path) => Ok(path.clone()),
            None => default_registry_path()
                .context("Cannot locate the registry: set TENET_HOME, HOME or --registry"),
        }
    }

    /// Open the initialized project, with a progress bar unless `--quiet`.
    pub fn open_service(&self) -> anyhow::Result<TenetService> {
        let root = self.project_root()?;
        let service = TenetService::open(&root, &self.registry_path()?)?;
        Ok(self.with_progress(service))
    }

    pub fn with_progress(&self, service: TenetService) -> TenetService {
        let reporter = if self.quiet {
            BarReporter::hidden()
        } else {
            BarReporter::new()
        };
        service.with_progress(Arc::new(reporter))
    }

    /// Print unless `--quiet`.
    pub fn say(&self, line: impl std::fmt::Display) {
        if !self.quiet {
            println!("{line}");
        }
    }
}

/// Output format shared by listing commands.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Text,
    Json,
}

pub fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Cannot serialize output")?
    );
    Ok(())
}

pub async fn run(cmd: Command, env: &Env) -> anyhow::Result<()> {
    match cmd {
        Command::Init(args) => init::run(args, env).await,
        Command::Learn(args) => learn::run(args, env).await,
        Command::Check(args) => check::run(args, env).await,
        Command::Patterns(args) => patterns::run(args, env).await,
        Command::Violations(args) => violations::run(args, env).await,
        Command::Except(args) => except::run(args, env).await,
        Command::Resolve(args) => resolve::run(args, env).await,
        Command::History(args) => history::run(args, env).await,
        Command::Link(args) => link::run(args, env).await,
        Command::Sync(args) => sync::run(args, env).await,
        Command::Global(args) => global::run(args, env).await,
        Command::Search(args) => search::run(args, env).await,
        Command::Status(args) => status::run(args, env).await,
    }
}
