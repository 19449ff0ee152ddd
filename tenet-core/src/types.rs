use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::convention::NamingConvention;

/// Patterns observed fewer times than this never produce violations.
pub const PATTERN_FREQUENCY_THRESHOLD: u64 = 5;

/// Multiplier applied to a pattern's confidence when a violation is
/// resolved as `pattern_updated`.
pub const OVERRIDE_DECAY_FACTOR: f64 = 0.9;

// ── Typed ID wrappers ──────────────────────────────────────────────

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

typed_id!(PatternId);
typed_id!(OccurrenceId);
typed_id!(ViolationId);
typed_id!(ExceptionId);
typed_id!(ConceptId);
typed_id!(DeltaId);

// ── Languages ──────────────────────────────────────────────────────

/// Source languages the scanner understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    TypeScript,
    JavaScript,
    Python,
    Rust,
    Go,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TypeScript => "typescript",
            Self::JavaScript => "javascript",
            Self::Python => "python",
            Self::Rust => "rust",
            Self::Go => "go",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "typescript" | "ts" => Some(Self::TypeScript),
            "javascript" | "js" => Some(Self::JavaScript),
            "python" | "py" => Some(Self::Python),
            "rust" | "rs" => Some(Self::Rust),
            "go" | "golang" => Some(Self::Go),
            _ => None,
        }
    }

    /// Detect by file extension.
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = Path::new(path).extension()?.to_str()?;
        match ext {
            "ts" | "tsx" | "mts" | "cts" => Some(Self::TypeScript),
            "js" | "jsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "py" | "pyi" => Some(Self::Python),
            "rs" => Some(Self::Rust),
            "go" => Some(Self::Go),
            _ => None,
        }
    }

    /// Whether the language uses `try`/`catch` blocks for error handling.
    pub fn is_ecmascript(self) -> bool {
        matches!(self, Self::TypeScript | Self::JavaScript)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Pattern taxonomy ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternCategory {
    Naming,
    Structural,
    Implementation,
}

impl PatternCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Naming => "naming",
            Self::Structural => "structural",
            Self::Implementation => "implementation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "naming" => Some(Self::Naming),
            "structural" => Some(Self::Structural),
            "implementation" => Some(Self::Implementation),
            _ => None,
        }
    }
}

impl std::fmt::Display for PatternCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a pattern is about. Stored as text, so new subjects need no migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternSubject {
    VariableNaming,
    FunctionNaming,
    ClassNaming,
    ConstantNaming,
    FileLocation,
    ImportOrder,
    ErrorHandling,
    AsyncControlFlow,
}

impl PatternSubject {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VariableNaming => "variable-naming",
            Self::FunctionNaming => "function-naming",
            Self::ClassNaming => "class-naming",
            Self::ConstantNaming => "constant-naming",
            Self::FileLocation => "file-location",
            Self::ImportOrder => "import-order",
            Self::ErrorHandling => "error-handling",
            Self::AsyncControlFlow => "async-control-flow",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "variable-naming" => Some(Self::VariableNaming),
            "function-naming" => Some(Self::FunctionNaming),
            "class-naming" => Some(Self::ClassNaming),
            "constant-naming" => Some(Self::ConstantNaming),
            "file-location" => Some(Self::FileLocation),
            "import-order" => Some(Self::ImportOrder),
            "error-handling" => Some(Self::ErrorHandling),
            "async-control-flow" => Some(Self::AsyncControlFlow),
            _ => None,
        }
    }

    pub fn category(self) -> PatternCategory {
        match self {
            Self::VariableNaming | Self::FunctionNaming | Self::ClassNaming | Self::ConstantNaming => {
                PatternCategory::Naming
            }
            Self::FileLocation | Self::ImportOrder => PatternCategory::Structural,
            Self::ErrorHandling | Self::AsyncControlFlow => PatternCategory::Implementation,
        }
    }

    /// Naming subject for an identifier role.
    pub fn for_role(role: IdentifierRole) -> Self {
        match role {
            IdentifierRole::Variable => Self::VariableNaming,
            IdentifierRole::Function => Self::FunctionNaming,
            IdentifierRole::Class => Self::ClassNaming,
            IdentifierRole::Constant => Self::ConstantNaming,
        }
    }
}

impl std::fmt::Display for PatternSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared role of an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierRole {
    Variable,
    Function,
    Class,
    Constant,
}

impl IdentifierRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Variable => "variable",
            Self::Function => "function",
            Self::Class => "class",
            Self::Constant => "constant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "variable" => Some(Self::Variable),
            "function" => Some(Self::Function),
            "class" => Some(Self::Class),
            "constant" => Some(Self::Constant),
            _ => None,
        }
    }
}

/// Module-path classes used for import ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportGroup {
    /// Standard library (`std::`, `os`, `node:fs`, ...).
    Builtin,
    /// Third-party packages.
    External,
    /// Project-absolute paths (`@/`, `~/`, `crate::`).
    Internal,
    /// Relative paths (`./`, `../`, `super::`).
    Relative,
}

impl ImportGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Builtin => "builtin",
            Self::External => "external",
            Self::Internal => "internal",
            Self::Relative => "relative",
        }
    }
}

/// The learned payload of a pattern, one variant per kind of convention.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PatternForm {
    /// Identifier casing.
    Naming { convention: NamingConvention },
    /// Files of a given role live under a directory containing `directory`.
    Location { directory: String },
    /// Import statements appear grouped in this order.
    ImportOrder { groups: Vec<ImportGroup> },
    /// An idiom site contains `token` (e.g. `logger.error`, `try`).
    Idiom { token: String },
}

impl PatternForm {
    /// Stable key used for tallying forms and comparing payloads.
    pub fn form_key(&self) -> String {
        match self {
            Self::Naming { convention } => convention.as_str().to_string(),
            Self::Location { directory } => format!("dir:{directory}"),
            Self::ImportOrder { groups } => format!(
                "order:{}",
                groups.iter().map(|g| g.as_str()).collect::<Vec<_>>().join(",")
            ),
            Self::Idiom { token } => format!("idiom:{token}"),
        }
    }

    /// Human-readable form used in violation messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Naming { convention } => convention.as_str().to_string(),
            Self::Location { directory } => format!("located under {directory}/"),
            Self::ImportOrder { groups } => groups
                .iter()
                .map(|g| g.as_str())
                .collect::<Vec<_>>()
                .join(" → "),
            Self::Idiom { token } => token.clone(),
        }
    }

    /// Whether an observed form conforms to this expected form.
    pub fn matches(&self, observed: &Self) -> bool {
        match (self, observed) {
            (Self::Naming { convention: expected }, Self::Naming { convention: actual }) => {
                actual.conforms_to(*expected)
            }
            (Self::Location { directory: expected }, Self::Location { directory: actual }) => {
                actual.contains(expected.as_str())
            }
            (Self::ImportOrder { groups: expected }, Self::ImportOrder { groups: actual }) => {
                import_order_consistent(expected, actual)
            }
            (Self::Idiom { token: expected }, Self::Idiom { token: actual }) => expected == actual,
            _ => false,
        }
    }
}

/// `actual` respects the relative order of `expected`; groups that
/// `expected` does not rank are ignored.
pub fn import_order_consistent(expected: &[ImportGroup], actual: &[ImportGroup]) -> bool {
    let mut last_rank = 0usize;
    for group in actual {
        if let Some(rank) = expected.iter().position(|g| g == group) {
            if rank < last_rank {
                return false;
            }
            last_rank = rank;
        }
    }
    true
}

/// Normalized signature: `{category}:{subject}[/{qualifier}]:{language}`.
pub fn pattern_signature(
    subject: PatternSubject,
    qualifier: Option<&str>,
    language: Language,
) -> String {
    match qualifier {
        Some(q) => format!("{}:{}/{q}:{}", subject.category(), subject, language),
        None => format!("{}:{}:{}", subject.category(), subject, language),
    }
}

// ── Patterns ───────────────────────────────────────────────────────

/// A learned, confidence-scored convention in one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: PatternId,
    pub category: PatternCategory,
    pub subject: PatternSubject,
    pub signature: String,
    pub expected_form: PatternForm,
    pub confidence: f64,
    pub frequency: u64,
    pub language: Language,
    pub examples: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A candidate observation emitted by the analysis engine for one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternObservation {
    pub subject: PatternSubject,
    pub signature: String,
    pub form: PatternForm,
    pub language: Language,
    pub file_path: String,
    /// Stable identity of the site within the file (identifier name,
    /// `catch#2`, `imports`, ...).
    pub anchor: String,
    pub line: u32,
    pub column: u32,
    pub snippet: String,
}

impl PatternObservation {
    pub fn category(&self) -> PatternCategory {
        self.subject.category()
    }

    /// Identity used to diff a file's observations across learning runs.
    pub fn identity(&self) -> (String, String, String) {
        (
            self.signature.clone(),
            self.anchor.clone(),
            self.form.form_key(),
        )
    }
}

/// A recorded observation contributing to a pattern's statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternOccurrence {
    pub id: OccurrenceId,
    pub pattern_id: PatternId,
    pub signature: String,
    pub file_path: String,
    pub anchor: String,
    pub form_key: String,
    pub line: u32,
    pub column: u32,
    pub deleted: bool,
    pub observed_at: DateTime<Utc>,
}

impl PatternOccurrence {
    pub fn identity(&self) -> (String, String, String) {
        (
            self.signature.clone(),
            self.anchor.clone(),
            self.form_key.clone(),
        )
    }
}

/// What happened to a pattern when an occurrence was recorded or retracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternChange {
    Created,
    Updated,
    /// Frequency dropped to zero and the pattern was soft-deleted.
    Removed,
    /// The occurrence was already live; statistics untouched.
    Unchanged,
}

/// Result of recording one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recorded {
    pub pattern_id: PatternId,
    pub occurrence_id: OccurrenceId,
    pub change: PatternChange,
}

#[derive(Debug, Clone, Default)]
pub struct PatternFilter {
    pub category: Option<PatternCategory>,
    pub language: Option<Language>,
    pub min_frequency: Option<u64>,
    /// Include soft-deleted patterns.
    pub include_deleted: bool,
}

// ── Severity and violations ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Deterministic mapping from pattern confidence; below 0.50 is not reported.
    pub fn from_confidence(confidence: f64) -> Option<Self> {
        if confidence >= 0.85 {
            Some(Self::High)
        } else if confidence >= 0.70 {
            Some(Self::Medium)
        } else if confidence >= 0.50 {
            Some(Self::Low)
        } else {
            None
        }
    }

    /// Minimum confidence for this severity level.
    pub fn min_confidence(self) -> f64 {
        match self {
            Self::High => 0.85,
            Self::Medium => 0.70,
            Self::Low => 0.50,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line/column span, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    AcceptedFix,
    Overridden,
    Ignored,
    PatternUpdated,
}

impl Resolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AcceptedFix => "accepted_fix",
            Self::Overridden => "overridden",
            Self::Ignored => "ignored",
            Self::PatternUpdated => "pattern_updated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "accepted_fix" => Some(Self::AcceptedFix),
            "overridden" => Some(Self::Overridden),
            "ignored" => Some(Self::Ignored),
            "pattern_updated" => Some(Self::PatternUpdated),
            _ => None,
        }
    }
}

/// One detected deviation from a pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub id: ViolationId,
    pub pattern_id: PatternId,
    pub file_path: String,
    pub message: String,
    pub location: Span,
    pub code_snippet: String,
    pub expected_pattern: String,
    pub actual_pattern: String,
    pub suggested_fix: Option<String>,
    pub confidence: f64,
    pub detected_at: DateTime<Utc>,
    pub resolution: Option<Resolution>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Violation {
    /// Derived from confidence; never stored.
    pub fn severity(&self) -> Option<Severity> {
        Severity::from_confidence(self.confidence)
    }

    pub fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ViolationFilter {
    pub open_only: bool,
    pub file_path: Option<String>,
    pub pattern_id: Option<PatternId>,
}

/// A standing suppression of one pattern in this project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternException {
    pub id: ExceptionId,
    pub pattern_id: PatternId,
    /// `None` applies project-wide.
    pub file_path: Option<String>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl PatternException {
    /// Expiry is evaluated lazily against `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }

    pub fn applies_to(&self, file_path: &str) -> bool {
        self.file_path.as_deref().is_none_or(|p| p == file_path)
    }
}

#[derive(Debug, Clone)]
pub struct NewException {
    pub pattern_id: PatternId,
    pub file_path: Option<String>,
    pub reason: String,
    pub expires_at: Option<DateTime<Utc>>,
}

// ── Compliance checking ────────────────────────────────────────────

/// The code to check: a whole file or a snippet attributed to a path.
#[derive(Debug, Clone)]
pub struct CodeUnit {
    pub file_path: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy)]
#[allow(clippy::struct_excessive_bools)]
pub struct CheckOptions {
    pub severity_threshold: Severity,
    pub include_warnings: bool,
    pub include_suggestions: bool,
    pub auto_fix: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            severity_threshold: Severity::Low,
            include_warnings: true,
            include_suggestions: true,
            auto_fix: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub file_path: String,
    pub language: Option<Language>,
    /// High severity.
    pub violations: Vec<Violation>,
    /// Medium severity.
    pub warnings: Vec<Violation>,
    /// Low severity.
    pub suggestions: Vec<Violation>,
    pub overall_score: u32,
    pub check_duration_ms: u64,
    pub patterns_checked: usize,
    /// Set when the unit could not be analyzed; the report is then empty.
    pub skipped_reason: Option<String>,
    pub fixed_code: Option<String>,
}

impl ComplianceReport {
    /// `max(0, 100 − 20·high − 10·medium − 5·low)`.
    pub fn score(high: usize, medium: usize, low: usize) -> u32 {
        let penalty = 20 * high + 10 * medium + 5 * low;
        u32::try_from(100usize.saturating_sub(penalty)).unwrap_or(0)
    }

    pub fn all(&self) -> impl Iterator<Item = &Violation> {
        self.violations
            .iter()
            .chain(&self.warnings)
            .chain(&self.suggestions)
    }
}

// ── Concepts ───────────────────────────────────────────────────────

/// A named declaration extracted from a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concept {
    pub id: ConceptId,
    pub file_path: String,
    pub kind: IdentifierRole,
    pub name: String,
    pub line: u32,
    pub content_hash: u64,
    pub deleted: bool,
}

impl Concept {
    pub fn key(&self) -> (IdentifierRole, String) {
        (self.kind, self.name.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConceptChange {
    Added,
    Modified,
    Unchanged,
}

/// FNV-1a 64-bit; used for change detection only.
pub fn content_hash(data: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &byte in data {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

// ── Learning deltas ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl ChangeType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "added" | "A" => Some(Self::Added),
            "modified" | "M" => Some(Self::Modified),
            "deleted" | "D" => Some(Self::Deleted),
            "renamed" | "R" => Some(Self::Renamed),
            _ => None,
        }
    }
}

/// One entry of a version-control change feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitChange {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub path: String,
    /// Previous path; required for `renamed`.
    #[serde(default)]
    pub old_path: Option<String>,
    #[serde(default)]
    pub commit_sha: Option<String>,
    #[serde(default)]
    pub commit_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerType {
    Commit,
    Manual,
}

impl TriggerType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "commit" => Some(Self::Commit),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DeltaStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Allowed transitions: pending → processing → completed | failed.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Pending | Self::Processing, Self::Failed)
                | (Self::Processing, Self::Completed)
        )
    }
}

/// Counters accumulated by one learning run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaCounts {
    pub concepts_added: u64,
    pub concepts_removed: u64,
    pub concepts_modified: u64,
    pub patterns_added: u64,
    pub patterns_removed: u64,
    pub patterns_modified: u64,
    pub degraded_files: u64,
}

impl DeltaCounts {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// Parameters for opening a learning run.
#[derive(Debug, Clone)]
pub struct NewDelta {
    pub trigger: TriggerType,
    pub commit_sha: Option<String>,
    pub commit_message: Option<String>,
    pub files_changed: Vec<String>,
}

/// The record of one learning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningDelta {
    pub id: DeltaId,
    pub trigger: TriggerType,
    pub commit_sha: Option<String>,
    pub commit_message: Option<String>,
    pub files_changed: Vec<String>,
    pub counts: DeltaCounts,
    pub duration_ms: u64,
    pub status: DeltaStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

// ── Cross-project aggregation ──────────────────────────────────────

/// A linked repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub path: String,
    pub name: String,
    pub pattern_count: u64,
    pub concept_count: u64,
    pub linked_at: DateTime<Utc>,
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// One pattern as captured from a project store at sync time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectPattern {
    pub signature: String,
    pub category: PatternCategory,
    pub subject: PatternSubject,
    pub language: Language,
    pub form: PatternForm,
    pub frequency: u64,
    pub confidence: f64,
}

impl From<&Pattern> for ProjectPattern {
    fn from(pattern: &Pattern) -> Self {
        Self {
            signature: pattern.signature.clone(),
            category: pattern.category,
            subject: pattern.subject,
            language: pattern.language,
            form: pattern.expected_form.clone(),
            frequency: pattern.frequency,
            confidence: pattern.confidence,
        }
    }
}

/// Everything the aggregator reads from one project store.
#[derive(Debug, Clone)]
pub struct ProjectSnapshot {
    pub project_id: String,
    pub patterns: Vec<ProjectPattern>,
    pub concept_count: u64,
}

/// One project's contribution to a global pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectOccurrence {
    pub project_id: String,
    pub frequency: u64,
    pub confidence: f64,
    pub form: PatternForm,
}

/// Aggregate of one normalized signature across linked projects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalPattern {
    pub signature: String,
    pub category: PatternCategory,
    pub subject: PatternSubject,
    pub language: Language,
    /// The most frequent form across contributors.
    pub dominant_form: PatternForm,
    pub occurrences: Vec<ProjectOccurrence>,
    pub aggregated_confidence: f64,
    pub consensus_score: f64,
}

impl GlobalPattern {
    pub fn project_count(&self) -> usize {
        self.occurrences.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct GlobalPatternFilter {
    pub category: Option<PatternCategory>,
    pub min_project_count: usize,
    pub min_consensus: f64,
    pub language: Option<Language>,
}

impl GlobalPatternFilter {
    pub fn accepts(&self, pattern: &GlobalPattern) -> bool {
        self.category.is_none_or(|c| c == pattern.category)
            && self.language.is_none_or(|l| l == pattern.language)
            && pattern.project_count() >= self.min_project_count
            && pattern.consensus_score >= self.min_consensus
    }
}

/// A project left out of an aggregation run, and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OmittedProject {
    pub project_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregationRun {
    pub patterns: Vec<GlobalPattern>,
    pub omitted: Vec<OmittedProject>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Patterns,
    Concepts,
    All,
}

impl SearchMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "patterns" => Some(Self::Patterns),
            "concepts" => Some(Self::Concepts),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

/// A cross-project search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub project_id: String,
    pub project_name: String,
    /// `pattern` or `concept`.
    pub kind: String,
    pub name: String,
    pub detail: String,
    pub file_path: Option<String>,
}

// ── Store statistics ───────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub patterns: u64,
    pub patterns_deleted: u64,
    pub concepts: u64,
    pub concepts_deleted: u64,
    pub open_violations: u64,
    pub resolved_violations: u64,
    pub exceptions: u64,
    pub deltas: u64,
    pub db_size_bytes: u64,
}
