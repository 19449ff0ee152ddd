use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::{
    AggregationRun, Concept, ConceptChange, ConceptId, DeltaCounts, DeltaId, ExceptionId,
    GlobalPattern, LearningDelta, NewDelta, NewException, OccurrenceId, Pattern, PatternChange,
    PatternException, PatternFilter, PatternId, PatternObservation, PatternOccurrence, Project,
    ProjectPattern, Recorded, Resolution, StoreStats, Violation, ViolationFilter, ViolationId,
};

/// One project's pattern store. The detector reads it; the learner writes it.
///
/// Writes are serialized by the implementation; reads see the last committed
/// write.
#[async_trait::async_trait]
pub trait PatternStore: Send + Sync {
    /// Stable id of the project that owns this store.
    async fn project_id(&self) -> crate::error::Result<String>;

    // ── Patterns ───────────────────────────────────────────────────

    /// Record one observation: create the pattern on first sight, otherwise
    /// fold the observation into its frequency, form tallies and confidence.
    /// Recording an occurrence that is already live is a no-op.
    async fn record_occurrence(
        &self,
        observation: &PatternObservation,
    ) -> crate::error::Result<Recorded>;

    /// Withdraw a live occurrence, decrementing its pattern. A pattern whose
    /// frequency reaches zero is soft-deleted.
    async fn retract_occurrence(&self, id: OccurrenceId) -> crate::error::Result<PatternChange>;

    /// Insert or replace a pattern with explicit statistics (imports, fixtures).
    async fn put_pattern(&self, pattern: &Pattern) -> crate::error::Result<PatternId>;

    async fn list_patterns(&self, filter: &PatternFilter) -> crate::error::Result<Vec<Pattern>>;

    async fn get_pattern(&self, id: PatternId) -> crate::error::Result<Option<Pattern>>;

    async fn get_pattern_by_signature(
        &self,
        signature: &str,
    ) -> crate::error::Result<Option<Pattern>>;

    /// Live occurrences observed in one file.
    async fn occurrences_for_file(
        &self,
        file_path: &str,
    ) -> crate::error::Result<Vec<PatternOccurrence>>;

    /// Files that still contribute live occurrences or concepts.
    async fn tracked_files(&self) -> crate::error::Result<Vec<String>>;

    /// Move occurrences and concepts from `old_path` to `new_path`, keeping
    /// their identity. Returns the number of rows moved.
    async fn relocate_file(&self, old_path: &str, new_path: &str) -> crate::error::Result<u64>;

    // ── Violations ─────────────────────────────────────────────────

    async fn record_violation(&self, violation: &Violation) -> crate::error::Result<ViolationId>;

    async fn list_violations(
        &self,
        filter: &ViolationFilter,
    ) -> crate::error::Result<Vec<Violation>>;

    /// Close a violation. Resolutions are recorded once; `pattern_updated`
    /// decays the pattern's confidence.
    async fn resolve_violation(
        &self,
        id: ViolationId,
        resolution: Resolution,
    ) -> crate::error::Result<Violation>;

    // ── Exceptions ─────────────────────────────────────────────────

    async fn add_exception(&self, exception: &NewException) -> crate::error::Result<ExceptionId>;

    /// Whether an active exception covers `pattern_id` in `file_path`.
    /// Expiry is evaluated against the current time on every call.
    async fn is_excepted(&self, pattern_id: PatternId, file_path: &str)
    -> crate::error::Result<bool>;

    async fn list_exceptions(
        &self,
        include_expired: bool,
    ) -> crate::error::Result<Vec<PatternException>>;

    // ── Concepts ───────────────────────────────────────────────────

    async fn concepts_for_file(
        &self,
        file_path: &str,
        include_deleted: bool,
    ) -> crate::error::Result<Vec<Concept>>;

    /// Insert or update a concept by `(file_path, kind, name)`. A soft-deleted
    /// concept is revived.
    async fn upsert_concept(
        &self,
        concept: &Concept,
    ) -> crate::error::Result<(ConceptId, ConceptChange)>;

    /// Flag a concept deleted. Returns false if it already was.
    async fn soft_delete_concept(&self, id: ConceptId) -> crate::error::Result<bool>;

    /// Live concepts whose name contains `query` (case-insensitive).
    async fn search_concepts(&self, query: &str, limit: usize)
    -> crate::error::Result<Vec<Concept>>;

    // ── Learning deltas ────────────────────────────────────────────

    /// Open a learning run in `processing`. Fails with
    /// `LearnError::AlreadyInProgress` while another run is processing;
    /// runs older than `stale_after` are first marked failed.
    async fn begin_delta(
        &self,
        delta: &NewDelta,
        stale_after: Duration,
    ) -> crate::error::Result<LearningDelta>;

    /// Close a run: `completed` when `error` is `None`, else `failed`.
    /// Counts are kept either way.
    async fn finish_delta(
        &self,
        id: DeltaId,
        counts: DeltaCounts,
        duration_ms: u64,
        error: Option<String>,
    ) -> crate::error::Result<LearningDelta>;

    /// Newest first.
    async fn list_deltas(
        &self,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> crate::error::Result<Vec<LearningDelta>>;

    // ── Metrics ────────────────────────────────────────────────────

    async fn stats(&self) -> crate::error::Result<StoreStats>;
}

/// The process-wide registry of linked projects and aggregated patterns.
#[async_trait::async_trait]
pub trait ProjectRegistry: Send + Sync {
    /// Insert a project, or update name/path of an existing one by id.
    /// `linked_at` of an existing project is preserved.
    async fn upsert_project(&self, project: &Project) -> crate::error::Result<Project>;

    async fn get_project(&self, id: &str) -> crate::error::Result<Option<Project>>;

    async fn find_project_by_path(&self, path: &str) -> crate::error::Result<Option<Project>>;

    async fn list_projects(&self) -> crate::error::Result<Vec<Project>>;

    /// Replace a project's contribution and stamp `last_sync_at`.
    async fn replace_project_patterns(
        &self,
        project_id: &str,
        patterns: &[ProjectPattern],
        concept_count: u64,
    ) -> crate::error::Result<Project>;

    async fn project_patterns(&self, project_id: &str)
    -> crate::error::Result<Vec<ProjectPattern>>;

    /// Replace the whole global pattern table with one aggregation result.
    async fn store_global_patterns(&self, run: &AggregationRun) -> crate::error::Result<()>;

    async fn global_patterns(&self) -> crate::error::Result<Vec<GlobalPattern>>;

    /// Pattern snapshots whose signature or form contains `query`.
    async fn search_project_patterns(
        &self,
        query: &str,
        limit: usize,
    ) -> crate::error::Result<Vec<(String, ProjectPattern)>>;
}
