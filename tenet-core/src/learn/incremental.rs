use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::config::{LearningSection, ScanSection, TenetConfig};
use crate::error::{ExtractError, LearnError, TenetError};
use crate::extract::PatternExtractor;
use crate::progress::{NoopReporter, ProgressReporter};
use crate::store::PatternStore;
use crate::types::{
    ChangeType, Concept, ConceptChange, DeltaCounts, GitChange, LearningDelta, NewDelta,
    PatternCategory, PatternChange, PatternId, PatternObservation, TriggerType,
};

use super::CancellationHandle;

/// Per-run bookkeeping. A pattern counts once per run, by its net change.
#[derive(Debug, Default)]
struct Tally {
    created: HashSet<PatternId>,
    updated: HashSet<PatternId>,
    removed: HashSet<PatternId>,
    counts: DeltaCounts,
}

impl Tally {
    fn pattern(&mut self, id: PatternId, change: PatternChange) {
        match change {
            PatternChange::Created => {
                self.created.insert(id);
            }
            PatternChange::Updated => {
                self.updated.insert(id);
            }
            PatternChange::Removed => {
                self.removed.insert(id);
            }
            PatternChange::Unchanged => {}
        }
    }

    fn concept(&mut self, change: ConceptChange) {
        match change {
            ConceptChange::Added => self.counts.concepts_added += 1,
            ConceptChange::Modified => self.counts.concepts_modified += 1,
            ConceptChange::Unchanged => {}
        }
    }

    fn finish(mut self) -> DeltaCounts {
        let touched: HashSet<PatternId> = self
            .created
            .iter()
            .chain(&self.updated)
            .chain(&self.removed)
            .copied()
            .collect();
        for id in touched {
            match (self.created.contains(&id), self.removed.contains(&id)) {
                (true, false) => self.counts.patterns_added += 1,
                (false, true) => self.counts.patterns_removed += 1,
                _ => self.counts.patterns_modified += 1,
            }
        }
        self.counts
    }
}

/// Applies change sets to one project's pattern store.
pub struct IncrementalLearner {
    root: PathBuf,
    store: Arc<dyn PatternStore>,
    extractor: Arc<PatternExtractor>,
    learning: LearningSection,
    scan: ScanSection,
    progress: Arc<dyn ProgressReporter>,
}

impl std::fmt::Debug for IncrementalLearner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncrementalLearner")
            .field("root", &self.root)
            .field("learning", &self.learning)
            .finish_non_exhaustive()
    }
}

impl IncrementalLearner {
    pub fn new(
        root: &Path,
        store: Arc<dyn PatternStore>,
        extractor: Arc<PatternExtractor>,
        config: &TenetConfig,
    ) -> Self {
        Self {
            root: root.to_path_buf(),
            store,
            extractor,
            learning: config.learning.clone(),
            scan: config.scan.clone(),
            progress: Arc::new(NoopReporter),
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Apply one change set. The returned delta is `completed`, or `failed`
    /// with the counts accumulated before the failure, cancellation or
    /// timeout. Errors are returned only when the run cannot start.
    #[instrument(skip_all, name = "process_changes", fields(changes = changes.len()))]
    pub async fn process_changes(
        &self,
        changes: &[GitChange],
        cancel: &CancellationHandle,
    ) -> crate::error::Result<LearningDelta> {
        for change in changes {
            if change.change_type == ChangeType::Renamed && change.old_path.is_none() {
                return Err(LearnError::InvalidChange {
                    path: change.path.clone(),
                    message: "renamed change without old_path".into(),
                }
                .into());
            }
        }

        let commit_sha = changes.iter().find_map(|c| c.commit_sha.clone());
        let delta = NewDelta {
            trigger: if commit_sha.is_some() {
                TriggerType::Commit
            } else {
                TriggerType::Manual
            },
            commit_sha,
            commit_message: changes.iter().find_map(|c| c.commit_message.clone()),
            files_changed: changes.iter().map(|c| c.path.clone()).collect(),
        };
        self.run(delta, changes, cancel).await
    }

    /// Learn every file matched by the `[scan]` globs. Files the store still
    /// tracks that the walk no longer finds are forgotten.
    #[instrument(skip_all, name = "learn_project")]
    pub async fn learn_project(
        &self,
        cancel: &CancellationHandle,
    ) -> crate::error::Result<LearningDelta> {
        let files = self.walk();
        let walked: HashSet<&str> = files.iter().map(String::as_str).collect();
        let gone: Vec<String> = self
            .store
            .tracked_files()
            .await?
            .into_iter()
            .filter(|path| !walked.contains(path.as_str()))
            .collect();
        info!(
            file_count = files.len(),
            gone = gone.len(),
            "Full learn found files"
        );

        let change = |change_type, path: &String| GitChange {
            change_type,
            path: path.clone(),
            old_path: None,
            commit_sha: None,
            commit_message: None,
        };
        let changes: Vec<GitChange> = files
            .iter()
            .map(|path| change(ChangeType::Added, path))
            .chain(gone.iter().map(|path| change(ChangeType::Deleted, path)))
            .collect();
        let delta = NewDelta {
            trigger: TriggerType::Manual,
            commit_sha: None,
            commit_message: None,
            files_changed: changes.iter().map(|c| c.path.clone()).collect(),
        };
        self.run(delta, &changes, cancel).await
    }

    async fn run(
        &self,
        new_delta: NewDelta,
        changes: &[GitChange],
        cancel: &CancellationHandle,
    ) -> crate::error::Result<LearningDelta> {
        let delta = self
            .store
            .begin_delta(&new_delta, Duration::from_secs(self.learning.stale_after_secs))
            .await?;
        let start = Instant::now();
        let budget = self.learning.timeout();
        let mut tally = Tally::default();
        let mut error = None;

        self.progress
            .begin(u64::try_from(changes.len()).unwrap_or(u64::MAX));
        for change in changes {
            if cancel.is_cancelled() {
                error = Some("cancelled".to_string());
                break;
            }
            if start.elapsed() >= budget {
                error = Some(format!("timed out after {}s", budget.as_secs()));
                break;
            }
            if let Err(e) = self.apply(change, &mut tally).await {
                error = Some(format!("{}: {e}", change.path));
                break;
            }
            self.progress.file_done(&change.path);
        }

        let counts = tally.finish();
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let finished = self
            .store
            .finish_delta(delta.id, counts, duration_ms, error.clone())
            .await?;

        let summary = format!(
            "patterns +{} ~{} -{}, concepts +{} ~{} -{}",
            counts.patterns_added,
            counts.patterns_modified,
            counts.patterns_removed,
            counts.concepts_added,
            counts.concepts_modified,
            counts.concepts_removed
        );
        match &error {
            Some(reason) => warn!(
                delta_id = %finished.id,
                error = %reason,
                counts = %summary,
                "Learning run failed, partial results kept"
            ),
            None => info!(
                delta_id = %finished.id,
                counts = %summary,
                degraded = counts.degraded_files,
                duration_ms,
                "Learning run complete"
            ),
        }
        self.progress.end(&summary);
        Ok(finished)
    }

    async fn apply(&self, change: &GitChange, tally: &mut Tally) -> crate::error::Result<()> {
        match change.change_type {
            ChangeType::Added | ChangeType::Modified => self.learn_file(&change.path, tally).await,
            ChangeType::Deleted => self.forget_file(&change.path, tally).await,
            ChangeType::Renamed => {
                let old_path = change.old_path.as_deref().ok_or_else(|| LearnError::InvalidChange {
                    path: change.path.clone(),
                    message: "renamed change without old_path".into(),
                })?;
                let moved = self.store.relocate_file(old_path, &change.path).await?;
                debug!(from = %old_path, to = %change.path, moved, "Relocated file");
                self.forget_file(old_path, tally).await?;
                self.learn_file(&change.path, tally).await
            }
        }
    }

    /// Re-extract one file and apply the difference against what the store
    /// holds for it.
    async fn learn_file(&self, path: &str, tally: &mut Tally) -> crate::error::Result<()> {
        let bytes = match tokio::fs::read(self.root.join(path)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(file = %path, "File no longer exists, forgetting it");
                return self.forget_file(path, tally).await;
            }
            Err(e) => return Err(ExtractError::Io(e).into()),
        };
        let extraction = match self.extractor.extract(path, &bytes).await {
            Ok(extraction) => extraction,
            Err(TenetError::Input(e)) => {
                debug!(file = %path, error = %e, "Skipping file");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if extraction.degraded {
            tally.counts.degraded_files += 1;
            warn!(file = %path, "Degraded extraction, only naming patterns updated");
        }

        for observation in &extraction.observations {
            let recorded = self.store.record_occurrence(observation).await?;
            tally.pattern(recorded.pattern_id, recorded.change);
        }
        let fresh: HashSet<(String, String, String)> = extraction
            .observations
            .iter()
            .map(PatternObservation::identity)
            .collect();
        for occurrence in self.store.occurrences_for_file(path).await? {
            if fresh.contains(&occurrence.identity()) {
                continue;
            }
            if extraction.degraded && !is_naming(&occurrence.signature) {
                continue;
            }
            let change = self.store.retract_occurrence(occurrence.id).await?;
            tally.pattern(occurrence.pattern_id, change);
        }

        for concept in &extraction.concepts {
            let (_, change) = self.store.upsert_concept(concept).await?;
            tally.concept(change);
        }
        if !extraction.degraded {
            let keys: HashSet<_> = extraction.concepts.iter().map(Concept::key).collect();
            for existing in self.store.concepts_for_file(path, false).await? {
                if !keys.contains(&existing.key())
                    && self.store.soft_delete_concept(existing.id).await?
                {
                    tally.counts.concepts_removed += 1;
                }
            }
        }
        Ok(())
    }

    /// Withdraw everything a file contributed.
    async fn forget_file(&self, path: &str, tally: &mut Tally) -> crate::error::Result<()> {
        for occurrence in self.store.occurrences_for_file(path).await? {
            let change = self.store.retract_occurrence(occurrence.id).await?;
            tally.pattern(occurrence.pattern_id, change);
        }
        for concept in self.store.concepts_for_file(path, false).await? {
            if self.store.soft_delete_concept(concept.id).await? {
                tally.counts.concepts_removed += 1;
            }
        }
        Ok(())
    }

    /// Project-relative paths (forward slashes) matched by the scan globs.
    fn walk(&self) -> Vec<String> {
        let excludes: Vec<glob::Pattern> = self
            .scan
            .exclude_patterns
            .iter()
            .filter_map(|p| match glob::Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!(pattern = %p, error = %e, "Invalid exclude pattern");
                    None
                }
            })
            .collect();

        let mut files = Vec::new();
        for pattern in &self.scan.include_patterns {
            let full = self.root.join(pattern).to_string_lossy().to_string();
            match glob::glob(&full) {
                Ok(paths) => {
                    for entry in paths.flatten() {
                        if !entry.is_file() {
                            continue;
                        }
                        let Ok(relative) = entry.strip_prefix(&self.root) else {
                            continue;
                        };
                        let relative = relative.to_string_lossy().replace('\\', "/");
                        if excludes.iter().any(|p| p.matches(&relative)) {
                            continue;
                        }
                        files.push(relative);
                    }
                }
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "Invalid glob pattern");
                }
            }
        }
        files.sort();
        files.dedup();
        files
    }
}

fn is_naming(signature: &str) -> bool {
    signature
        .split(':')
        .next()
        .is_some_and(|category| category == PatternCategory::Naming.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{AnalysisEngine, CircuitBreaker, ResilientEngine};
    use crate::store::SqliteStore;
    use crate::types::{DeltaStatus, Language, PatternFilter, PatternSubject, pattern_signature};

    struct Fixture {
        dir: tempfile::TempDir,
        store: Arc<SqliteStore>,
        learner: IncrementalLearner,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_config(TenetConfig::default())
        }

        fn with_config(config: TenetConfig) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let store = Arc::new(SqliteStore::in_memory().unwrap());
            let extractor = Arc::new(PatternExtractor::lexical(&config.engine));
            let learner = IncrementalLearner::new(dir.path(), store.clone(), extractor, &config);
            Self { dir, store, learner }
        }

        fn write(&self, path: &str, content: &str) {
            let full = self.dir.path().join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, content).unwrap();
        }

        fn remove(&self, path: &str) {
            std::fs::remove_file(self.dir.path().join(path)).unwrap();
        }

        async fn process(&self, changes: &[GitChange]) -> LearningDelta {
            self.learner
                .process_changes(changes, &CancellationHandle::new())
                .await
                .unwrap()
        }

        async fn frequency(&self, subject: PatternSubject) -> Option<u64> {
            self.store
                .get_pattern_by_signature(&pattern_signature(subject, None, Language::TypeScript))
                .await
                .unwrap()
                .filter(|p| p.frequency > 0)
                .map(|p| p.frequency)
        }
    }

    fn change(change_type: ChangeType, path: &str) -> GitChange {
        GitChange {
            change_type,
            path: path.into(),
            old_path: None,
            commit_sha: Some("abc123".into()),
            commit_message: Some("update".into()),
        }
    }

    const A: &str = "const userName = 1;\nconst itemCount = 2;\n";
    const B: &str = "const orderTotal = 3;\nfunction load_order() {}\n";

    #[tokio::test]
    async fn added_files_create_patterns_and_concepts() {
        let fx = Fixture::new();
        fx.write("src/a.ts", A);
        fx.write("src/b.ts", B);

        let delta = fx
            .process(&[change(ChangeType::Added, "src/a.ts"), change(ChangeType::Added, "src/b.ts")])
            .await;
        assert_eq!(delta.status, DeltaStatus::Completed);
        assert_eq!(delta.trigger, TriggerType::Commit);
        assert_eq!(delta.commit_sha.as_deref(), Some("abc123"));
        assert_eq!(delta.counts.patterns_added, 2);
        assert_eq!(delta.counts.patterns_modified, 0);
        assert_eq!(delta.counts.concepts_added, 4);
        assert_eq!(fx.frequency(PatternSubject::VariableNaming).await, Some(3));
        assert_eq!(fx.frequency(PatternSubject::FunctionNaming).await, Some(1));
    }

    #[tokio::test]
    async fn reprocessing_the_same_changes_is_a_no_op() {
        let fx = Fixture::new();
        fx.write("src/a.ts", A);
        fx.write("src/b.ts", B);
        let changes = [change(ChangeType::Added, "src/a.ts"), change(ChangeType::Modified, "src/b.ts")];

        fx.process(&changes).await;
        let before = fx.store.list_patterns(&PatternFilter::default()).await.unwrap();
        let again = fx.process(&changes).await;
        let after = fx.store.list_patterns(&PatternFilter::default()).await.unwrap();

        assert!(again.counts.is_zero(), "{:?}", again.counts);
        assert_eq!(before.len(), after.len());
        for (b, a) in before.iter().zip(&after) {
            assert_eq!(b.frequency, a.frequency);
            assert!((b.confidence - a.confidence).abs() < f64::EPSILON);
        }
    }

    #[tokio::test]
    async fn deleting_a_file_withdraws_only_its_contributions() {
        let fx = Fixture::new();
        fx.write("src/a.ts", A);
        fx.write("src/b.ts", B);
        fx.process(&[change(ChangeType::Added, "src/a.ts"), change(ChangeType::Added, "src/b.ts")])
            .await;

        fx.remove("src/b.ts");
        let delta = fx.process(&[change(ChangeType::Deleted, "src/b.ts")]).await;

        assert_eq!(delta.counts.patterns_removed, 1);
        assert_eq!(delta.counts.patterns_modified, 1);
        assert_eq!(delta.counts.concepts_removed, 2);
        assert_eq!(fx.frequency(PatternSubject::VariableNaming).await, Some(2));
        assert_eq!(fx.frequency(PatternSubject::FunctionNaming).await, None);

        assert!(fx.store.concepts_for_file("src/b.ts", false).await.unwrap().is_empty());
        let kept = fx.store.concepts_for_file("src/b.ts", true).await.unwrap();
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|c| c.deleted));
        assert_eq!(fx.store.concepts_for_file("src/a.ts", false).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn rename_carries_identity_forward() {
        let fx = Fixture::new();
        fx.write("src/a.ts", A);
        fx.process(&[change(ChangeType::Added, "src/a.ts")]).await;
        let before = fx.store.concepts_for_file("src/a.ts", false).await.unwrap();

        fx.write("src/core/a.ts", A);
        fx.remove("src/a.ts");
        let mut rename = change(ChangeType::Renamed, "src/core/a.ts");
        rename.old_path = Some("src/a.ts".into());
        let delta = fx.process(&[rename]).await;

        assert!(delta.counts.is_zero(), "{:?}", delta.counts);
        let after = fx.store.concepts_for_file("src/core/a.ts", false).await.unwrap();
        let mut before_ids: Vec<_> = before.iter().map(|c| c.id).collect();
        let mut after_ids: Vec<_> = after.iter().map(|c| c.id).collect();
        before_ids.sort_by_key(|id| id.0);
        after_ids.sort_by_key(|id| id.0);
        assert_eq!(before_ids, after_ids);
        assert!(fx.store.occurrences_for_file("src/a.ts").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rename_without_old_path_is_rejected() {
        let fx = Fixture::new();
        let err = fx
            .learner
            .process_changes(&[change(ChangeType::Renamed, "src/x.ts")], &CancellationHandle::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TenetError::Learn(LearnError::InvalidChange { .. })));
        assert!(fx.store.list_deltas(10, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn overlapping_runs_are_rejected() {
        let fx = Fixture::new();
        fx.store
            .begin_delta(
                &NewDelta {
                    trigger: TriggerType::Manual,
                    commit_sha: None,
                    commit_message: None,
                    files_changed: Vec::new(),
                },
                Duration::from_secs(900),
            )
            .await
            .unwrap();
        let err = fx
            .learner
            .process_changes(&[], &CancellationHandle::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TenetError::Learn(LearnError::AlreadyInProgress { .. })));
    }

    #[tokio::test]
    async fn cancellation_fails_the_run_between_files() {
        let fx = Fixture::new();
        fx.write("src/a.ts", A);
        let cancel = CancellationHandle::new();
        cancel.cancel();
        let delta = fx
            .learner
            .process_changes(&[change(ChangeType::Added, "src/a.ts")], &cancel)
            .await
            .unwrap();
        assert_eq!(delta.status, DeltaStatus::Failed);
        assert_eq!(delta.error.as_deref(), Some("cancelled"));
        assert!(delta.counts.is_zero());
    }

    #[tokio::test]
    async fn exhausted_budget_fails_with_timeout() {
        let mut config = TenetConfig::default();
        config.learning.timeout_secs = 0;
        let fx = Fixture::with_config(config);
        fx.write("src/a.ts", A);
        let delta = fx.process(&[change(ChangeType::Added, "src/a.ts")]).await;
        assert_eq!(delta.status, DeltaStatus::Failed);
        assert!(delta.error.unwrap().starts_with("timed out"));
    }

    #[tokio::test]
    async fn unsupported_files_are_skipped() {
        let fx = Fixture::new();
        fx.write("README.md", "# readme\n");
        let delta = fx.process(&[change(ChangeType::Added, "README.md")]).await;
        assert_eq!(delta.status, DeltaStatus::Completed);
        assert!(delta.counts.is_zero());
    }

    #[tokio::test]
    async fn full_learn_walks_scan_globs() {
        let fx = Fixture::new();
        fx.write("src/a.ts", A);
        fx.write("src/b.ts", B);
        fx.write("node_modules/dep/index.js", "const someThing = 1;\n");
        fx.write(".tenet/config.toml", "");

        let delta = fx.learner.learn_project(&CancellationHandle::new()).await.unwrap();
        assert_eq!(delta.trigger, TriggerType::Manual);
        assert_eq!(delta.files_changed, vec!["src/a.ts".to_string(), "src/b.ts".to_string()]);
        assert_eq!(fx.frequency(PatternSubject::VariableNaming).await, Some(3));

        let again = fx.learner.learn_project(&CancellationHandle::new()).await.unwrap();
        assert!(again.counts.is_zero());
    }

    #[tokio::test]
    async fn full_learn_forgets_files_removed_since_last_run() {
        let fx = Fixture::new();
        fx.write("src/a.ts", A);
        fx.write("src/b.ts", B);
        fx.learner.learn_project(&CancellationHandle::new()).await.unwrap();
        assert_eq!(
            fx.store.tracked_files().await.unwrap(),
            vec!["src/a.ts".to_string(), "src/b.ts".to_string()]
        );

        fx.remove("src/b.ts");
        let delta = fx.learner.learn_project(&CancellationHandle::new()).await.unwrap();
        assert_eq!(delta.files_changed, vec!["src/a.ts".to_string(), "src/b.ts".to_string()]);
        assert_eq!(delta.counts.patterns_removed, 1);
        assert_eq!(delta.counts.concepts_removed, 2);
        assert_eq!(fx.frequency(PatternSubject::VariableNaming).await, Some(2));
        assert_eq!(fx.frequency(PatternSubject::FunctionNaming).await, None);
        assert_eq!(fx.store.tracked_files().await.unwrap(), vec!["src/a.ts".to_string()]);

        let again = fx.learner.learn_project(&CancellationHandle::new()).await.unwrap();
        assert!(again.counts.is_zero());
        assert_eq!(again.files_changed, vec!["src/a.ts".to_string()]);
    }

    struct BrokenEngine;

    #[async_trait::async_trait]
    impl AnalysisEngine for BrokenEngine {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn extract_concepts(
            &self,
            file_path: &str,
            _content: &str,
            _language: Language,
        ) -> crate::error::Result<Vec<Concept>> {
            Err(ExtractError::Engine {
                path: file_path.into(),
                message: "unavailable".into(),
            }
            .into())
        }

        async fn extract_candidate_patterns(
            &self,
            _file_path: &str,
            _content: &str,
            _language: Language,
        ) -> crate::error::Result<Vec<PatternObservation>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn degraded_extraction_keeps_non_naming_knowledge() {
        let fx = Fixture::new();
        let code = "const userName = 1;\ntry { run(); } catch (e) { logger.error(e); }\n";
        fx.write("src/a.ts", code);
        fx.process(&[change(ChangeType::Added, "src/a.ts")]).await;
        let live_before = fx.store.occurrences_for_file("src/a.ts").await.unwrap().len();
        assert_eq!(live_before, 2);

        let degraded = IncrementalLearner::new(
            fx.dir.path(),
            fx.store.clone(),
            Arc::new(PatternExtractor::new(ResilientEngine::with_breaker(
                Arc::new(BrokenEngine),
                CircuitBreaker::new(5, Duration::from_secs(30)),
                Duration::from_secs(5),
            ))),
            &TenetConfig::default(),
        );
        let delta = degraded
            .process_changes(&[change(ChangeType::Modified, "src/a.ts")], &CancellationHandle::new())
            .await
            .unwrap();

        assert_eq!(delta.counts.degraded_files, 1);
        assert_eq!(delta.counts.patterns_removed, 0);
        assert_eq!(
            fx.store.occurrences_for_file("src/a.ts").await.unwrap().len(),
            live_before
        );
    }

    #[test]
    fn naming_signatures_are_recognized() {
        assert!(is_naming("naming:variable-naming:go"));
        assert!(!is_naming("structural:file-location/service:go"));
    }
}
