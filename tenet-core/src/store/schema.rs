/// Current schema version.
pub const SCHEMA_VERSION: &str = "1";

/// Per-project pattern store schema.
pub const SCHEMA_SQL: &str = r"
-- Schema version and project identity
CREATE TABLE IF NOT EXISTS tenet_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Learned patterns, one row per normalized signature
CREATE TABLE IF NOT EXISTS patterns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    signature TEXT NOT NULL UNIQUE,
    category TEXT NOT NULL,
    subject TEXT NOT NULL,
    language TEXT NOT NULL,
    expected_form TEXT NOT NULL,
    confidence REAL NOT NULL,
    frequency INTEGER NOT NULL DEFAULT 0,
    examples TEXT NOT NULL DEFAULT '[]',
    deleted INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_patterns_category ON patterns(category);
CREATE INDEX IF NOT EXISTS idx_patterns_language ON patterns(language);

-- Per-form tallies backing the expected-form election
CREATE TABLE IF NOT EXISTS pattern_forms (
    pattern_id INTEGER NOT NULL REFERENCES patterns(id) ON DELETE CASCADE,
    form_key TEXT NOT NULL,
    form TEXT NOT NULL,
    tally INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (pattern_id, form_key)
);

-- Raw observations, kept for audit and for incremental diffs
CREATE TABLE IF NOT EXISTS pattern_occurrences (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pattern_id INTEGER NOT NULL REFERENCES patterns(id) ON DELETE CASCADE,
    signature TEXT NOT NULL,
    file_path TEXT NOT NULL,
    anchor TEXT NOT NULL,
    form_key TEXT NOT NULL,
    line INTEGER NOT NULL,
    col INTEGER NOT NULL,
    deleted INTEGER NOT NULL DEFAULT 0,
    observed_at TEXT NOT NULL,
    UNIQUE(signature, file_path, anchor, form_key)
);
CREATE INDEX IF NOT EXISTS idx_occurrences_file ON pattern_occurrences(file_path);
CREATE INDEX IF NOT EXISTS idx_occurrences_pattern ON pattern_occurrences(pattern_id);

-- Named declarations per file
CREATE TABLE IF NOT EXISTS concepts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_path TEXT NOT NULL,
    kind TEXT NOT NULL,
    name TEXT NOT NULL,
    line INTEGER NOT NULL,
    content_hash INTEGER NOT NULL,
    deleted INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL,
    UNIQUE(file_path, kind, name)
);
CREATE INDEX IF NOT EXISTS idx_concepts_file ON concepts(file_path);
CREATE INDEX IF NOT EXISTS idx_concepts_name ON concepts(name);

-- Persisted compliance findings
CREATE TABLE IF NOT EXISTS violations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pattern_id INTEGER NOT NULL REFERENCES patterns(id) ON DELETE CASCADE,
    file_path TEXT NOT NULL,
    message TEXT NOT NULL,
    location TEXT NOT NULL,
    code_snippet TEXT NOT NULL,
    expected_pattern TEXT NOT NULL,
    actual_pattern TEXT NOT NULL,
    suggested_fix TEXT,
    confidence REAL NOT NULL,
    detected_at TEXT NOT NULL,
    resolution TEXT,
    resolved_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_violations_file ON violations(file_path);
CREATE INDEX IF NOT EXISTS idx_violations_open ON violations(resolved_at);

-- Standing suppressions
CREATE TABLE IF NOT EXISTS pattern_exceptions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pattern_id INTEGER NOT NULL REFERENCES patterns(id) ON DELETE CASCADE,
    file_path TEXT,
    reason TEXT NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_exceptions_pattern ON pattern_exceptions(pattern_id);

-- Append-only learning history
CREATE TABLE IF NOT EXISTS learning_deltas (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    trigger_type TEXT NOT NULL,
    commit_sha TEXT,
    commit_message TEXT,
    files_changed TEXT NOT NULL DEFAULT '[]',
    counts TEXT NOT NULL DEFAULT '{}',
    duration_ms INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    error TEXT,
    created_at TEXT NOT NULL,
    completed_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_deltas_status ON learning_deltas(status);
CREATE INDEX IF NOT EXISTS idx_deltas_created ON learning_deltas(created_at);
";

/// Process-wide registry of linked projects and their aggregated patterns.
pub const REGISTRY_SQL: &str = r"
CREATE TABLE IF NOT EXISTS tenet_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    path TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    pattern_count INTEGER NOT NULL DEFAULT 0,
    concept_count INTEGER NOT NULL DEFAULT 0,
    linked_at TEXT NOT NULL,
    last_sync_at TEXT
);

-- Snapshot of each project's patterns as of its last sync
CREATE TABLE IF NOT EXISTS project_patterns (
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    signature TEXT NOT NULL,
    category TEXT NOT NULL,
    subject TEXT NOT NULL,
    language TEXT NOT NULL,
    form TEXT NOT NULL,
    frequency INTEGER NOT NULL,
    confidence REAL NOT NULL,
    PRIMARY KEY (project_id, signature)
);
CREATE INDEX IF NOT EXISTS idx_project_patterns_sig ON project_patterns(signature);

-- Result of the latest aggregation, keyed by normalized signature
CREATE TABLE IF NOT EXISTS global_patterns (
    signature TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    aggregated_confidence REAL NOT NULL,
    consensus_score REAL NOT NULL,
    project_count INTEGER NOT NULL,
    computed_at TEXT NOT NULL
);
";

/// `SQLite` PRAGMAs for performance.
pub const PRAGMAS_SQL: &str = r"
PRAGMA synchronous = NORMAL;
PRAGMA cache_size = -16000;
PRAGMA foreign_keys = ON;
";
