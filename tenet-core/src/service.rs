//! Service facade: one initialized project plus the process-wide registry.
//!
//! Every outbound operation a transport layer needs goes through
//! [`TenetService`]; the CLI is one such transport.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::aggregate::{CrossProjectAggregator, ProjectSource, StoreSource};
use crate::config::{TENET_DIR, TenetConfig, config_path, store_path};
use crate::detect::ConflictDetector;
use crate::error::{InputError, TenetError};
use crate::extract::PatternExtractor;
use crate::learn::{CancellationHandle, IncrementalLearner};
use crate::progress::ProgressReporter;
use crate::store::{PatternStore, ProjectRegistry, SqliteRegistry, SqliteStore};
use crate::types::{
    CheckOptions, CodeUnit, ComplianceReport, GitChange, GlobalPattern, GlobalPatternFilter,
    LearningDelta, Project, SearchHit, SearchMode, Severity,
};

/// Default number of hits returned by [`TenetService::search_all_projects`].
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

pub struct TenetService {
    root: PathBuf,
    config: TenetConfig,
    store: Arc<dyn PatternStore>,
    registry: Arc<dyn ProjectRegistry>,
    detector: ConflictDetector,
    learner: IncrementalLearner,
    aggregator: CrossProjectAggregator,
}

impl std::fmt::Debug for TenetService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenetService")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl TenetService {
    /// Create `.tenet/` with a default config and an empty store, then open
    /// the project. An existing config is left untouched.
    pub fn init(root: &Path, registry_path: &Path) -> crate::error::Result<Self> {
        std::fs::create_dir_all(root.join(TENET_DIR))
            .map_err(|e| InputError::Malformed {
                path: root.display().to_string(),
                message: format!("cannot create {TENET_DIR}: {e}"),
            })?;
        let config_file = config_path(root);
        if !config_file.exists() {
            let toml = TenetConfig::default().to_toml()?;
            std::fs::write(&config_file, toml).map_err(|e| InputError::Malformed {
                path: config_file.display().to_string(),
                message: e.to_string(),
            })?;
        }
        SqliteStore::open(&store_path(root))?;
        info!(root = %root.display(), "Initialized Tenet project");
        Self::open(root, registry_path)
    }

    /// Open an initialized project.
    pub fn open(root: &Path, registry_path: &Path) -> crate::error::Result<Self> {
        let db = store_path(root);
        if !db.exists() {
            return Err(TenetError::NotInitialized(root.display().to_string()));
        }
        let config = TenetConfig::load(root)?;
        let store = SqliteStore::open(&db)?.with_settings(config.patterns.clone());
        let registry = SqliteRegistry::open(registry_path)?;
        Ok(Self::from_parts(
            root,
            config,
            Arc::new(store),
            Arc::new(registry),
            Arc::new(StoreSource),
        ))
    }

    /// Assemble a service from explicit parts (tests, embedding).
    pub fn from_parts(
        root: &Path,
        config: TenetConfig,
        store: Arc<dyn PatternStore>,
        registry: Arc<dyn ProjectRegistry>,
        source: Arc<dyn ProjectSource>,
    ) -> Self {
        let detector = ConflictDetector::new(store.clone())
            .with_frequency_threshold(config.patterns.frequency_threshold);
        let extractor = Arc::new(PatternExtractor::lexical(&config.engine));
        let learner = IncrementalLearner::new(root, store.clone(), extractor, &config);
        let aggregator =
            CrossProjectAggregator::new(registry.clone(), source, config.aggregation.clone());
        Self {
            root: root.to_path_buf(),
            config,
            store,
            registry,
            detector,
            learner,
            aggregator,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.learner = self.learner.with_progress(progress);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &TenetConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn PatternStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<dyn ProjectRegistry> {
        &self.registry
    }

    pub fn detector(&self) -> &ConflictDetector {
        &self.detector
    }

    pub fn aggregator(&self) -> &CrossProjectAggregator {
        &self.aggregator
    }

    /// Project-relative form of `path` with forward slashes.
    pub fn relative_path(&self, path: &str) -> String {
        let candidate = Path::new(path);
        let relative = candidate.strip_prefix(&self.root).unwrap_or(candidate);
        relative
            .to_string_lossy()
            .trim_start_matches("./")
            .replace('\\', "/")
    }

    /// Check a file, or a snippet attributed to `file_path`. Without a
    /// snippet the file is read from the project.
    pub async fn check_compliance(
        &self,
        file_path: &str,
        snippet: Option<&str>,
        severity_threshold: Option<Severity>,
        auto_fix: bool,
    ) -> crate::error::Result<ComplianceReport> {
        let file_path = self.relative_path(file_path);
        let content = match snippet {
            Some(code) => code.to_string(),
            None => self.read_source(&file_path).await?,
        };
        let detection = &self.config.detection;
        let options = CheckOptions {
            severity_threshold: severity_threshold.unwrap_or(detection.severity_threshold),
            include_warnings: detection.include_warnings,
            include_suggestions: detection.include_suggestions,
            auto_fix,
        };
        self.detector
            .check_compliance(&CodeUnit { file_path, content }, &options)
            .await
    }

    async fn read_source(&self, file_path: &str) -> crate::error::Result<String> {
        let bytes = match tokio::fs::read(self.root.join(file_path)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(InputError::UnknownFile(file_path.to_string()).into());
            }
            Err(e) => {
                return Err(InputError::Malformed {
                    path: file_path.to_string(),
                    message: e.to_string(),
                }
                .into());
            }
        };
        String::from_utf8(bytes).map_err(|e| {
            InputError::Malformed {
                path: file_path.to_string(),
                message: format!("not UTF-8: {e}"),
            }
            .into()
        })
    }

    /// Learn every file matched by the scan globs.
    pub async fn learn_project(
        &self,
        cancel: &CancellationHandle,
    ) -> crate::error::Result<LearningDelta> {
        self.learner.learn_project(cancel).await
    }

    /// Apply a change feed to the pattern store.
    pub async fn process_changes(
        &self,
        changes: &[GitChange],
        cancel: &CancellationHandle,
    ) -> crate::error::Result<LearningDelta> {
        self.learner.process_changes(changes, cancel).await
    }

    pub async fn get_global_patterns(
        &self,
        filter: &GlobalPatternFilter,
    ) -> crate::error::Result<Vec<GlobalPattern>> {
        self.aggregator.get_global_patterns(filter).await
    }

    /// Learning runs, newest first.
    pub async fn get_learning_history(
        &self,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> crate::error::Result<Vec<LearningDelta>> {
        self.store.list_deltas(limit, since).await
    }

    pub async fn link_project(
        &self,
        path: &str,
        name: Option<&str>,
    ) -> crate::error::Result<Project> {
        self.aggregator.link_project(path, name).await
    }

    pub async fn search_all_projects(
        &self,
        query: &str,
        mode: SearchMode,
        limit: Option<usize>,
    ) -> crate::error::Result<Vec<SearchHit>> {
        self.aggregator
            .search_all_projects(query, mode, limit.unwrap_or(DEFAULT_SEARCH_LIMIT))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeltaStatus, Severity};

    const CAMEL: &str = "\
const userName = 1;
const itemCount = 2;
const orderTotal = 3;
const pageSize = 4;
const retryLimit = 5;
const maxWidth = 6;
";

    struct Workspace {
        _dir: tempfile::TempDir,
        root: PathBuf,
        registry: PathBuf,
    }

    fn workspace() -> Workspace {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("app");
        std::fs::create_dir_all(root.join("src")).unwrap();
        let registry = dir.path().join("home").join("registry.db");
        Workspace {
            root,
            registry,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn init_writes_config_and_store() {
        let ws = workspace();
        let service = TenetService::init(&ws.root, &ws.registry).unwrap();
        assert!(config_path(&ws.root).exists());
        assert!(store_path(&ws.root).exists());
        assert!(ws.registry.exists());
        assert_eq!(service.config().patterns.frequency_threshold, 5);

        // Re-init keeps an edited config
        std::fs::write(config_path(&ws.root), "[patterns]\nfrequency_threshold = 7\n").unwrap();
        let again = TenetService::init(&ws.root, &ws.registry).unwrap();
        assert_eq!(again.config().patterns.frequency_threshold, 7);
    }

    #[tokio::test]
    async fn open_requires_init() {
        let ws = workspace();
        let err = TenetService::open(&ws.root, &ws.registry).unwrap_err();
        assert!(matches!(err, TenetError::NotInitialized(_)));
    }

    #[tokio::test]
    async fn learned_convention_flags_snippet() {
        let ws = workspace();
        std::fs::write(ws.root.join("src/settings.ts"), CAMEL).unwrap();
        let service = TenetService::init(&ws.root, &ws.registry).unwrap();

        let delta = service.learn_project(&CancellationHandle::new()).await.unwrap();
        assert_eq!(delta.status, DeltaStatus::Completed);

        let report = service
            .check_compliance("src/new.ts", Some("const user_id = 1;\n"), None, true)
            .await
            .unwrap();
        assert_eq!(report.violations.len(), 1);
        assert_eq!(
            report.violations[0].suggested_fix.as_deref(),
            Some("const userId = 1;")
        );
        assert_eq!(report.fixed_code.as_deref(), Some("const userId = 1;\n"));

        let history = service.get_learning_history(10, None).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, delta.id);
    }

    #[tokio::test]
    async fn severity_threshold_override_filters() {
        let ws = workspace();
        std::fs::write(ws.root.join("src/settings.ts"), CAMEL).unwrap();
        let service = TenetService::init(&ws.root, &ws.registry).unwrap();
        service.learn_project(&CancellationHandle::new()).await.unwrap();

        let report = service
            .check_compliance("src/settings.ts", None, Some(Severity::High), false)
            .await
            .unwrap();
        assert!(report.all().next().is_none());
        assert_eq!(report.overall_score, 100);
    }

    #[tokio::test]
    async fn unknown_file_is_an_input_error() {
        let ws = workspace();
        let service = TenetService::init(&ws.root, &ws.registry).unwrap();
        let err = service
            .check_compliance("src/missing.ts", None, None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, TenetError::Input(InputError::UnknownFile(_))));
    }

    #[tokio::test]
    async fn absolute_paths_are_made_relative() {
        let ws = workspace();
        let service = TenetService::init(&ws.root, &ws.registry).unwrap();
        let absolute = ws.root.join("src/a.ts");
        assert_eq!(service.relative_path(&absolute.to_string_lossy()), "src/a.ts");
        assert_eq!(service.relative_path("./src/a.ts"), "src/a.ts");
    }

    #[tokio::test]
    async fn linked_project_is_searchable() {
        let ws = workspace();
        std::fs::write(ws.root.join("src/settings.ts"), CAMEL).unwrap();
        let service = TenetService::init(&ws.root, &ws.registry).unwrap();
        service.learn_project(&CancellationHandle::new()).await.unwrap();

        let project = service
            .link_project(&ws.root.to_string_lossy(), Some("app"))
            .await
            .unwrap();
        assert_eq!(project.name, "app");
        assert!(project.pattern_count >= 1);

        let hits = service
            .search_all_projects("retry", SearchMode::Concepts, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "retryLimit");
        assert_eq!(hits[0].project_name, "app");
    }
}
