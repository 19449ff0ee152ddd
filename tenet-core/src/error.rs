/// Top-level Tenet error type.
///
/// All fallible operations in `tenet-core` return [`Result<T, TenetError>`](Result).
/// Each variant wraps a domain-specific error enum, allowing callers to
/// match on the error source without losing type information.
#[derive(thiserror::Error, Debug)]
pub enum TenetError {
    /// Error from the pattern store or project registry (`SQLite`, migrations).
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Error from the analysis engine or its resilience wrapper.
    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    /// Error while checking a code unit for compliance.
    #[error("Detection error: {0}")]
    Detect(#[from] DetectError),

    /// Error during cross-project aggregation.
    #[error("Aggregation error: {0}")]
    Aggregate(#[from] AggregateError),

    /// Error during a learning run.
    #[error("Learning error: {0}")]
    Learn(#[from] LearnError),

    /// Error in configuration parsing or validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Caller supplied input that cannot be acted on.
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// The directory has no `.tenet/` store.
    #[error("Not a Tenet project: {0} (run `tenet init`)")]
    NotInitialized(String),
}

/// Errors from the SQLite-backed pattern store and project registry.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Underlying `SQLite` operation failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Schema migration failed (version mismatch or DDL error).
    #[error("Migration failed: {0}")]
    Migration(String),

    /// A referenced row was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A learning delta cannot move between these states.
    #[error("Invalid delta transition: {0}")]
    InvalidTransition(String),

    /// A violation already carries a resolution; resolutions are recorded once.
    #[error("Violation {0} is already resolved")]
    AlreadyResolved(i64),

    /// JSON serialization/deserialization of a stored payload failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the external analysis engine and its circuit breaker.
#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    /// The engine reported a failure for this file.
    #[error("Engine failure in {path}: {message}")]
    Engine {
        /// Path of the file being analyzed.
        path: String,
        /// Description of the engine failure.
        message: String,
    },

    /// The circuit is open; calls fail fast until the recovery window elapses.
    #[error("Analysis engine circuit open (retry in {retry_in_ms}ms)")]
    CircuitOpen {
        /// Milliseconds until a half-open trial is allowed.
        retry_in_ms: u64,
    },

    /// The engine did not answer within the per-call timeout.
    #[error("Analysis engine timed out after {0}ms")]
    Timeout(u64),

    /// Filesystem I/O error while reading a source file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the conflict detector.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    /// A scanner pattern failed to compile.
    #[error("Scanner error: {0}")]
    Scanner(String),
}

/// Errors during cross-project aggregation.
#[derive(thiserror::Error, Debug)]
pub enum AggregateError {
    /// The referenced project is not linked in the registry.
    #[error("Project not linked: {0}")]
    UnknownProject(String),

    /// The project path could not be opened as a Tenet project.
    #[error("Cannot open project at {path}: {message}")]
    ProjectUnavailable {
        /// Filesystem path of the project.
        path: String,
        /// Why the project store could not be read.
        message: String,
    },

    /// A per-project fetch exceeded its timeout.
    #[error("Fetch from project {0} timed out")]
    Timeout(String),
}

/// Errors during incremental or full learning.
#[derive(thiserror::Error, Debug)]
pub enum LearnError {
    /// Another learning run is `processing` for this project.
    #[error("Learning already in progress for project {project}")]
    AlreadyInProgress {
        /// Project id whose store is locked.
        project: String,
    },

    /// A change event is missing data it requires.
    #[error("Invalid change for {path}: {message}")]
    InvalidChange {
        /// Path named by the change event.
        path: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Errors in Tenet configuration parsing and validation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist at the expected path.
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// Configuration values are present but semantically invalid.
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// Configuration file syntax could not be parsed (TOML error).
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Errors caused by caller input.
#[derive(thiserror::Error, Debug)]
pub enum InputError {
    /// The file path does not exist in the project.
    #[error("Unknown file: {0}")]
    UnknownFile(String),

    /// The input is structurally unusable (e.g. not UTF-8).
    #[error("Malformed input for {path}: {message}")]
    Malformed {
        /// Path of the offending input.
        path: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Convenience alias for `Result<T, TenetError>`.
pub type Result<T> = std::result::Result<T, TenetError>;
