use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Transaction, params, params_from_iter};
use tracing::{debug, info, warn};

use crate::config::PatternsSection;
use crate::error::{InputError, LearnError, StoreError};
use crate::types::{
    Concept, ConceptChange, ConceptId, DeltaCounts, DeltaId, DeltaStatus, ExceptionId,
    IdentifierRole, Language, LearningDelta, NewDelta, NewException, OVERRIDE_DECAY_FACTOR,
    OccurrenceId, Pattern, PatternCategory, PatternChange, PatternException, PatternFilter,
    PatternForm, PatternId, PatternObservation, PatternOccurrence, PatternSubject, Recorded,
    Resolution, StoreStats, TriggerType, Violation, ViolationFilter, ViolationId,
};

use super::PatternStore;
use super::schema;

const PATTERN_COLUMNS: &str = "id, signature, category, subject, language, expected_form, \
     confidence, frequency, examples, created_at, updated_at";

const OCCURRENCE_COLUMNS: &str =
    "id, pattern_id, signature, file_path, anchor, form_key, line, col, deleted, observed_at";

const VIOLATION_COLUMNS: &str = "id, pattern_id, file_path, message, location, code_snippet, \
     expected_pattern, actual_pattern, suggested_fix, confidence, detected_at, resolution, resolved_at";

const DELTA_COLUMNS: &str = "id, trigger_type, commit_sha, commit_message, files_changed, counts, \
     duration_ms, status, error, created_at, completed_at";

/// SQLite-backed implementation of `PatternStore`.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
    settings: PatternsSection,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    pub fn open(path: &Path) -> crate::error::Result<Self> {
        let conn = Connection::open(path).map_err(StoreError::Sqlite)?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(path.to_path_buf()),
            settings: PatternsSection::default(),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> crate::error::Result<Self> {
        let conn = Connection::open_in_memory().map_err(StoreError::Sqlite)?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
            settings: PatternsSection::default(),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Use the project's learning rate and example limit.
    #[must_use]
    pub fn with_settings(mut self, settings: PatternsSection) -> Self {
        self.settings = settings;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> crate::error::Result<()> {
        let conn = self.conn.lock().expect("tenet store mutex poisoned");

        conn.execute_batch(schema::PRAGMAS_SQL)
            .map_err(StoreError::Sqlite)?;
        // Silently ignored for in-memory databases
        let _ = conn.execute_batch("PRAGMA journal_mode = WAL;");

        conn.execute_batch(schema::SCHEMA_SQL)
            .map_err(StoreError::Sqlite)?;

        let version: Option<String> = conn
            .query_row(
                "SELECT value FROM tenet_meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::Sqlite)?;
        match version {
            Some(v) if v != schema::SCHEMA_VERSION => {
                return Err(StoreError::Migration(format!(
                    "store schema version {v} is not supported (expected {})",
                    schema::SCHEMA_VERSION
                ))
                .into());
            }
            Some(_) => {}
            None => {
                conn.execute(
                    "INSERT INTO tenet_meta (key, value) VALUES ('schema_version', ?1)",
                    params![schema::SCHEMA_VERSION],
                )
                .map_err(StoreError::Sqlite)?;
            }
        }

        conn.execute(
            "INSERT OR IGNORE INTO tenet_meta (key, value) VALUES ('project_id', ?1)",
            params![uuid::Uuid::new_v4().to_string()],
        )
        .map_err(StoreError::Sqlite)?;

        Ok(())
    }

    // ── Row mapping ────────────────────────────────────────────────

    fn row_to_pattern(row: &rusqlite::Row<'_>) -> rusqlite::Result<Pattern> {
        let category: String = row.get("category")?;
        let subject: String = row.get("subject")?;
        let language: String = row.get("language")?;
        let form: String = row.get("expected_form")?;
        let examples: String = row.get("examples")?;
        Ok(Pattern {
            id: PatternId(row.get("id")?),
            category: PatternCategory::parse(&category)
                .ok_or_else(|| conversion_error(2, format!("unknown category {category}")))?,
            subject: PatternSubject::parse(&subject)
                .ok_or_else(|| conversion_error(3, format!("unknown subject {subject}")))?,
            signature: row.get("signature")?,
            expected_form: serde_json::from_str(&form)
                .map_err(|e| conversion_error(5, e.to_string()))?,
            confidence: row.get("confidence")?,
            frequency: to_u64(row.get("frequency")?),
            language: Language::parse(&language)
                .ok_or_else(|| conversion_error(4, format!("unknown language {language}")))?,
            examples: serde_json::from_str(&examples).unwrap_or_default(),
            created_at: ts_column(row, "created_at")?,
            updated_at: ts_column(row, "updated_at")?,
        })
    }

    fn row_to_occurrence(row: &rusqlite::Row<'_>) -> rusqlite::Result<PatternOccurrence> {
        Ok(PatternOccurrence {
            id: OccurrenceId(row.get("id")?),
            pattern_id: PatternId(row.get("pattern_id")?),
            signature: row.get("signature")?,
            file_path: row.get("file_path")?,
            anchor: row.get("anchor")?,
            form_key: row.get("form_key")?,
            line: row.get("line")?,
            column: row.get("col")?,
            deleted: row.get("deleted")?,
            observed_at: ts_column(row, "observed_at")?,
        })
    }

    fn row_to_violation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Violation> {
        let location: String = row.get("location")?;
        let resolution: Option<String> = row.get("resolution")?;
            Ok(Violation {
            id: ViolationId(row.get("id")?),
            pattern_id: PatternId(row.get("pattern_id")?),
            file_path: row.get("file_path")?,
            message: row.get("message")?,
            location: serde_json::from_str(&location).unwrap_or_default(),
            code_snippet: row.get("code_snippet")?,
            expected_pattern: row.get("expected_pattern")?,
            actual_pattern: row.get("actual_pattern")?,
            suggested_fix: row.get("suggested_fix")?,
            confidence: row.get("confidence")?,
            detected_at: ts_column(row, "detected_at")?,
            resolution: resolution.as_deref().and_then(Resolution::parse),
            resolved_at: opt_ts_column(row, "resolved_at")?,
        })
    }

    fn row_to_exception(row: &rusqlite::Row<'_>) -> rusqlite::Result<PatternException> {
            Ok(PatternException {
            id: ExceptionId(row.get("id")?),
            pattern_id: PatternId(row.get("pattern_id")?),
            file_path: row.get("file_path")?,
            reason: row.get("reason")?,
            created_at: ts_column(row, "created_at")?,
            expires_at: opt_ts_column(row, "expires_at")?,
        })
    }

    fn row_to_concept(row: &rusqlite::Row<'_>) -> rusqlite::Result<Concept> {
        let kind: String = row.get("kind")?;
        // Stored as i64 bits; reinterpret as u64
        let hash: i64 = row.get("content_hash")?;
        Ok(Concept {
            id: ConceptId(row.get("id")?),
            file_path: row.get("file_path")?,
            kind: IdentifierRole::parse(&kind)
                .ok_or_else(|| conversion_error(2, format!("unknown concept kind {kind}")))?,
            name: row.get("name")?,
            line: row.get("line")?,
            #[allow(clippy::cast_sign_loss)]
            content_hash: hash as u64,
            deleted: row.get("deleted")?,
        })
    }

    fn row_to_delta(row: &rusqlite::Row<'_>) -> rusqlite::Result<LearningDelta> {
        let trigger: String = row.get("trigger_type")?;
        let status: String = row.get("status")?;
        let files: String = row.get("files_changed")?;
        let counts: String = row.get("counts")?;
            Ok(LearningDelta {
            id: DeltaId(row.get("id")?),
            trigger: TriggerType::parse(&trigger)
                .ok_or_else(|| conversion_error(1, format!("unknown trigger {trigger}")))?,
            commit_sha: row.get("commit_sha")?,
            commit_message: row.get("commit_message")?,
            files_changed: serde_json::from_str(&files).unwrap_or_default(),
            counts: serde_json::from_str(&counts).unwrap_or_default(),
            duration_ms: to_u64(row.get("duration_ms")?),
            status: DeltaStatus::parse(&status)
                .ok_or_else(|| conversion_error(7, format!("unknown status {status}")))?,
            error: row.get("error")?,
            created_at: ts_column(row, "created_at")?,
            completed_at: opt_ts_column(row, "completed_at")?,
        })
    }

    fn load_delta(conn: &Connection, id: DeltaId) -> crate::error::Result<LearningDelta> {
        conn.query_row(
            &format!("SELECT {DELTA_COLUMNS} FROM learning_deltas WHERE id = ?1"),
            params![id.0],
            Self::row_to_delta,
        )
        .optional()
        .map_err(StoreError::Sqlite)?
        .ok_or_else(|| StoreError::NotFound(format!("learning delta {id}")).into())
    }

    fn load_violation(conn: &Connection, id: ViolationId) -> crate::error::Result<Violation> {
        conn.query_row(
            &format!("SELECT {VIOLATION_COLUMNS} FROM violations WHERE id = ?1"),
            params![id.0],
            Self::row_to_violation,
        )
        .optional()
        .map_err(StoreError::Sqlite)?
        .ok_or_else(|| StoreError::NotFound(format!("violation {id}")).into())
    }

    // ── Pattern statistics ─────────────────────────────────────────

    /// Current tally of one form.
    fn tally(tx: &Transaction<'_>, pattern_id: i64, form_key: &str) -> rusqlite::Result<u64> {
        let tally: Option<i64> = tx
            .query_row(
                "SELECT tally FROM pattern_forms WHERE pattern_id = ?1 AND form_key = ?2",
                params![pattern_id, form_key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(tally.map_or(0, to_u64))
    }

    /// The form with the highest tally, ties broken by key.
    fn leader(tx: &Transaction<'_>, pattern_id: i64) -> rusqlite::Result<Option<(String, String, u64)>> {
        tx.query_row(
            "SELECT form_key, form, tally FROM pattern_forms
             WHERE pattern_id = ?1 AND tally > 0
             ORDER BY tally DESC, form_key ASC LIMIT 1",
            params![pattern_id],
            |row| Ok((row.get(0)?, row.get(1)?, to_u64(row.get(2)?))),
        )
        .optional()
    }

    /// Re-elect the expected form. Returns the new form's JSON and share
    /// when a different form now strictly leads.
    fn elect(
        tx: &Transaction<'_>,
        pattern_id: i64,
        expected_key: &str,
        frequency: u64,
    ) -> rusqlite::Result<Option<(String, f64)>> {
        let expected_tally = Self::tally(tx, pattern_id, expected_key)?;
        match Self::leader(tx, pattern_id)? {
            Some((key, form, tally)) if key != expected_key && tally > expected_tally => {
                Ok(Some((form, share(tally, frequency))))
            }
            _ => Ok(None),
        }
    }

    fn insert_pattern(
        tx: &Transaction<'_>,
        observation: &PatternObservation,
        form_json: &str,
        now: &str,
    ) -> rusqlite::Result<i64> {
        let examples = serde_json::to_string(&[observation.snippet.as_str()])
            .unwrap_or_else(|_| "[]".to_string());
        tx.execute(
            "INSERT INTO patterns (signature, category, subject, language, expected_form,
                                   confidence, frequency, examples, deleted, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1.0, 1, ?6, 0, ?7, ?7)",
            params![
                observation.signature,
                observation.category().as_str(),
                observation.subject.as_str(),
                observation.language.as_str(),
                form_json,
                examples,
                now,
            ],
        )?;
        Ok(tx.last_insert_rowid())
    }

    fn bump_tally(
        tx: &Transaction<'_>,
        pattern_id: i64,
        form_key: &str,
        form_json: &str,
        delta: i64,
    ) -> rusqlite::Result<()> {
        tx.execute(
            "INSERT INTO pattern_forms (pattern_id, form_key, form, tally)
             VALUES (?1, ?2, ?3, MAX(?4, 0))
             ON CONFLICT(pattern_id, form_key) DO UPDATE SET tally = MAX(tally + ?4, 0)",
            params![pattern_id, form_key, form_json, delta],
        )?;
        Ok(())
    }

    fn record_in_tx(
        &self,
        tx: &Transaction<'_>,
        observation: &PatternObservation,
    ) -> crate::error::Result<Recorded> {
        let now = ts(Utc::now());
        let form_key = observation.form.form_key();
        let form_json =
            serde_json::to_string(&observation.form).map_err(StoreError::Serialization)?;

        let existing: Option<(i64, i64, bool)> = tx
            .query_row(
                "SELECT id, pattern_id, deleted FROM pattern_occurrences
                 WHERE signature = ?1 AND file_path = ?2 AND anchor = ?3 AND form_key = ?4",
                params![
                    observation.signature,
                    observation.file_path,
                    observation.anchor,
                    form_key
                ],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(StoreError::Sqlite)?;

        if let Some((occurrence_id, pattern_id, false)) = existing {
            tx.execute(
                "UPDATE pattern_occurrences SET line = ?1, col = ?2 WHERE id = ?3",
                params![observation.line, observation.column, occurrence_id],
            )
            .map_err(StoreError::Sqlite)?;
            return Ok(Recorded {
                pattern_id: PatternId(pattern_id),
                occurrence_id: OccurrenceId(occurrence_id),
                change: PatternChange::Unchanged,
            });
        }

        let current: Option<(i64, bool, f64, i64, String, String)> = tx
            .query_row(
                "SELECT id, deleted, confidence, frequency, expected_form, examples
                 FROM patterns WHERE signature = ?1",
                params![observation.signature],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()
            .map_err(StoreError::Sqlite)?;

        let (pattern_id, change) = match current {
            None => {
                let id = Self::insert_pattern(tx, observation, &form_json, &now)
                    .map_err(StoreError::Sqlite)?;
                Self::bump_tally(tx, id, &form_key, &form_json, 1).map_err(StoreError::Sqlite)?;
                (id, PatternChange::Created)
            }
            Some((id, true, ..)) => {
                // Revive a soft-deleted pattern with fresh statistics
                let examples = serde_json::to_string(&[observation.snippet.as_str()])
                    .map_err(StoreError::Serialization)?;
                tx.execute("DELETE FROM pattern_forms WHERE pattern_id = ?1", params![id])
                    .map_err(StoreError::Sqlite)?;
                tx.execute(
                    "UPDATE patterns SET expected_form = ?1, confidence = 1.0, frequency = 1,
                            examples = ?2, deleted = 0, updated_at = ?3
                     WHERE id = ?4",
                    params![form_json, examples, now, id],
                )
                .map_err(StoreError::Sqlite)?;
                Self::bump_tally(tx, id, &form_key, &form_json, 1).map_err(StoreError::Sqlite)?;
                (id, PatternChange::Created)
            }
            Some((id, false, confidence, frequency, expected_json, examples_json)) => {
                let expected: PatternForm =
                    serde_json::from_str(&expected_json).map_err(StoreError::Serialization)?;
                Self::bump_tally(tx, id, &form_key, &form_json, 1).map_err(StoreError::Sqlite)?;

                let matched = expected.matches(&observation.form);
                let alpha = self.settings.learning_rate;
                let mut confidence =
                    (1.0 - alpha) * confidence + alpha * if matched { 1.0 } else { 0.0 };
                let frequency = to_u64(frequency) + 1;

                let mut expected_json = expected_json;
                if let Some((leader_json, leader_share)) =
                    Self::elect(tx, id, &expected.form_key(), frequency)
                        .map_err(StoreError::Sqlite)?
                {
                    debug!(
                        pattern_id = id,
                        signature = %observation.signature,
                        "Expected form changed"
                    );
                    expected_json = leader_json;
                    confidence = leader_share;
                }

                let mut examples: Vec<String> =
                    serde_json::from_str(&examples_json).unwrap_or_default();
                if matched
                    && examples.len() < self.settings.max_examples
                    && !examples.contains(&observation.snippet)
                {
                    examples.push(observation.snippet.clone());
                }

                tx.execute(
                    "UPDATE patterns SET expected_form = ?1, confidence = ?2, frequency = ?3,
                            examples = ?4, updated_at = ?5
                     WHERE id = ?6",
                    params![
                        expected_json,
                        confidence.clamp(0.0, 1.0),
                        to_i64(frequency),
                        serde_json::to_string(&examples).map_err(StoreError::Serialization)?,
                        now,
                        id
                    ],
                )
                .map_err(StoreError::Sqlite)?;
                (id, PatternChange::Updated)
            }
        };

        let occurrence_id = match existing {
            Some((occurrence_id, _, _)) => {
                tx.execute(
                    "UPDATE pattern_occurrences
                     SET deleted = 0, pattern_id = ?1, line = ?2, col = ?3, observed_at = ?4
                     WHERE id = ?5",
                    params![
                        pattern_id,
                        observation.line,
                        observation.column,
                        now,
                        occurrence_id
                    ],
                )
                .map_err(StoreError::Sqlite)?;
                occurrence_id
            }
            None => {
                tx.execute(
                    "INSERT INTO pattern_occurrences
                        (pattern_id, signature, file_path, anchor, form_key, line, col, deleted, observed_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)",
                    params![
                        pattern_id,
                        observation.signature,
                        observation.file_path,
                        observation.anchor,
                        form_key,
                        observation.line,
                        observation.column,
                        now
                    ],
                )
                .map_err(StoreError::Sqlite)?;
                tx.last_insert_rowid()
            }
        };

        Ok(Recorded {
            pattern_id: PatternId(pattern_id),
            occurrence_id: OccurrenceId(occurrence_id),
            change,
        })
    }

    fn retract_in_tx(tx: &Transaction<'_>, id: OccurrenceId) -> crate::error::Result<PatternChange> {
        let occurrence: Option<(i64, String, bool)> = tx
            .query_row(
                "SELECT pattern_id, form_key, deleted FROM pattern_occurrences WHERE id = ?1",
                params![id.0],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(StoreError::Sqlite)?;
        let Some((pattern_id, form_key, deleted)) = occurrence else {
            return Err(StoreError::NotFound(format!("occurrence {id}")).into());
        };
        if deleted {
            return Ok(PatternChange::Unchanged);
        }

        let now = ts(Utc::now());
        tx.execute(
            "UPDATE pattern_occurrences SET deleted = 1 WHERE id = ?1",
            params![id.0],
        )
        .map_err(StoreError::Sqlite)?;
        Self::bump_tally(tx, pattern_id, &form_key, "", -1).map_err(StoreError::Sqlite)?;

        let (frequency, expected_json): (i64, String) = tx
            .query_row(
                "SELECT frequency, expected_form FROM patterns WHERE id = ?1",
                params![pattern_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(StoreError::Sqlite)?;
        let frequency = to_u64(frequency).saturating_sub(1);

        if frequency == 0 {
            tx.execute(
                "UPDATE patterns SET frequency = 0, deleted = 1, updated_at = ?1 WHERE id = ?2",
                params![now, pattern_id],
            )
            .map_err(StoreError::Sqlite)?;
            debug!(pattern_id, "Pattern soft-deleted after last occurrence retracted");
            return Ok(PatternChange::Removed);
        }

        let expected: PatternForm =
            serde_json::from_str(&expected_json).map_err(StoreError::Serialization)?;
        let expected_key = expected.form_key();
        let (expected_json, confidence) =
            match Self::elect(tx, pattern_id, &expected_key, frequency).map_err(StoreError::Sqlite)? {
                Some(leader) => leader,
                None => {
                    let tally = Self::tally(tx, pattern_id, &expected_key).map_err(StoreError::Sqlite)?;
                    (expected_json, share(tally, frequency))
                }
            };
        tx.execute(
            "UPDATE patterns SET frequency = ?1, expected_form = ?2, confidence = ?3, updated_at = ?4
             WHERE id = ?5",
            params![to_i64(frequency), expected_json, confidence, now, pattern_id],
        )
        .map_err(StoreError::Sqlite)?;
        Ok(PatternChange::Updated)
    }
}

#[async_trait::async_trait]
impl PatternStore for SqliteStore {
    async fn project_id(&self) -> crate::error::Result<String> {
        let conn = self.conn.lock().expect("tenet store mutex poisoned");
        let id = conn
            .query_row(
                "SELECT value FROM tenet_meta WHERE key = 'project_id'",
                [],
                |row| row.get(0),
            )
            .map_err(StoreError::Sqlite)?;
        Ok(id)
    }

    // ── Patterns ───────────────────────────────────────────────────

    async fn record_occurrence(
        &self,
        observation: &PatternObservation,
    ) -> crate::error::Result<Recorded> {
        let mut conn = self.conn.lock().expect("tenet store mutex poisoned");
        let tx = conn.transaction().map_err(StoreError::Sqlite)?;
        let recorded = self.record_in_tx(&tx, observation)?;
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(recorded)
    }

    async fn retract_occurrence(&self, id: OccurrenceId) -> crate::error::Result<PatternChange> {
        let mut conn = self.conn.lock().expect("tenet store mutex poisoned");
        let tx = conn.transaction().map_err(StoreError::Sqlite)?;
        let change = Self::retract_in_tx(&tx, id)?;
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(change)
    }

    async fn put_pattern(&self, pattern: &Pattern) -> crate::error::Result<PatternId> {
        let mut conn = self.conn.lock().expect("tenet store mutex poisoned");
        let tx = conn.transaction().map_err(StoreError::Sqlite)?;
        let form_json =
            serde_json::to_string(&pattern.expected_form).map_err(StoreError::Serialization)?;
        let examples =
            serde_json::to_string(&pattern.examples).map_err(StoreError::Serialization)?;

        tx.execute(
            "INSERT INTO patterns (signature, category, subject, language, expected_form,
                                   confidence, frequency, examples, deleted, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(signature) DO UPDATE SET
                category = excluded.category,
                subject = excluded.subject,
                language = excluded.language,
                expected_form = excluded.expected_form,
                confidence = excluded.confidence,
                frequency = excluded.frequency,
                examples = excluded.examples,
                deleted = excluded.deleted,
                updated_at = excluded.updated_at",
            params![
                pattern.signature,
                pattern.category.as_str(),
                pattern.subject.as_str(),
                pattern.language.as_str(),
                form_json,
                pattern.confidence.clamp(0.0, 1.0),
                to_i64(pattern.frequency),
                examples,
                pattern.frequency == 0,
                ts(pattern.created_at),
                ts(pattern.updated_at),
            ],
        )
        .map_err(StoreError::Sqlite)?;
        let id: i64 = tx
            .query_row(
                "SELECT id FROM patterns WHERE signature = ?1",
                params![pattern.signature],
                |row| row.get(0),
            )
            .map_err(StoreError::Sqlite)?;

        tx.execute("DELETE FROM pattern_forms WHERE pattern_id = ?1", params![id])
            .map_err(StoreError::Sqlite)?;
        Self::bump_tally(
            &tx,
            id,
            &pattern.expected_form.form_key(),
            &form_json,
            to_i64(pattern.frequency),
        )
        .map_err(StoreError::Sqlite)?;
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(PatternId(id))
    }

    async fn list_patterns(&self, filter: &PatternFilter) -> crate::error::Result<Vec<Pattern>> {
        let conn = self.conn.lock().expect("tenet store mutex poisoned");
        let mut sql = format!("SELECT {PATTERN_COLUMNS} FROM patterns WHERE 1 = 1");
        let mut values: Vec<Value> = Vec::new();
        if !filter.include_deleted {
            sql.push_str(" AND deleted = 0");
        }
        if let Some(category) = filter.category {
            values.push(Value::Text(category.as_str().to_string()));
            sql.push_str(&format!(" AND category = ?{}", values.len()));
        }
        if let Some(language) = filter.language {
            values.push(Value::Text(language.as_str().to_string()));
            sql.push_str(&format!(" AND language = ?{}", values.len()));
        }
        if let Some(min) = filter.min_frequency {
            values.push(Value::Integer(to_i64(min)));
            sql.push_str(&format!(" AND frequency >= ?{}", values.len()));
        }
        sql.push_str(" ORDER BY frequency DESC, signature ASC");

        let mut stmt = conn.prepare(&sql).map_err(StoreError::Sqlite)?;
        let patterns = stmt
            .query_map(params_from_iter(values), Self::row_to_pattern)
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(patterns)
    }

    async fn get_pattern(&self, id: PatternId) -> crate::error::Result<Option<Pattern>> {
        let conn = self.conn.lock().expect("tenet store mutex poisoned");
        let pattern = conn
            .query_row(
                &format!("SELECT {PATTERN_COLUMNS} FROM patterns WHERE id = ?1"),
                params![id.0],
                Self::row_to_pattern,
            )
            .optional()
            .map_err(StoreError::Sqlite)?;
        Ok(pattern)
    }

    async fn get_pattern_by_signature(
        &self,
        signature: &str,
    ) -> crate::error::Result<Option<Pattern>> {
        let conn = self.conn.lock().expect("tenet store mutex poisoned");
        let pattern = conn
            .query_row(
                &format!("SELECT {PATTERN_COLUMNS} FROM patterns WHERE signature = ?1"),
                params![signature],
                Self::row_to_pattern,
            )
            .optional()
            .map_err(StoreError::Sqlite)?;
        Ok(pattern)
    }

    async fn occurrences_for_file(
        &self,
        file_path: &str,
    ) -> crate::error::Result<Vec<PatternOccurrence>> {
        let conn = self.conn.lock().expect("tenet store mutex poisoned");
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {OCCURRENCE_COLUMNS} FROM pattern_occurrences
                 WHERE file_path = ?1 AND deleted = 0 ORDER BY id"
            ))
            .map_err(StoreError::Sqlite)?;
        let occurrences = stmt
            .query_map(params![file_path], Self::row_to_occurrence)
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(occurrences)
    }

    async fn tracked_files(&self) -> crate::error::Result<Vec<String>> {
        let conn = self.conn.lock().expect("tenet store mutex poisoned");
        let mut stmt = conn
            .prepare(
                "SELECT file_path FROM pattern_occurrences WHERE deleted = 0
                 UNION
                 SELECT file_path FROM concepts WHERE deleted = 0
                 ORDER BY file_path",
            )
            .map_err(StoreError::Sqlite)?;
        let files = stmt
            .query_map([], |row| row.get(0))
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<String>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(files)
    }

    async fn relocate_file(&self, old_path: &str, new_path: &str) -> crate::error::Result<u64> {
        let mut conn = self.conn.lock().expect("tenet store mutex poisoned");
        let tx = conn.transaction().map_err(StoreError::Sqlite)?;
        // Retracted audit rows at the destination would collide with moved identities
        tx.execute(
            "DELETE FROM pattern_occurrences WHERE file_path = ?1 AND deleted = 1",
            params![new_path],
        )
        .map_err(StoreError::Sqlite)?;
        let occurrences = tx
            .execute(
                "UPDATE OR IGNORE pattern_occurrences SET file_path = ?2
                 WHERE file_path = ?1 AND deleted = 0",
                params![old_path, new_path],
            )
            .map_err(StoreError::Sqlite)?;
        let concepts = tx
            .execute(
                "UPDATE OR IGNORE concepts SET file_path = ?2, updated_at = ?3
                 WHERE file_path = ?1 AND deleted = 0",
                params![old_path, new_path, ts(Utc::now())],
            )
            .map_err(StoreError::Sqlite)?;
        tx.commit().map_err(StoreError::Sqlite)?;
        debug!(from = old_path, to = new_path, occurrences, concepts, "Relocated file");
        Ok(u64::try_from(occurrences + concepts).unwrap_or(u64::MAX))
    }

    // ── Violations ─────────────────────────────────────────────────

    async fn record_violation(&self, violation: &Violation) -> crate::error::Result<ViolationId> {
        let conn = self.conn.lock().expect("tenet store mutex poisoned");
        let location =
            serde_json::to_string(&violation.location).map_err(StoreError::Serialization)?;
        conn.execute(
            "INSERT INTO violations (pattern_id, file_path, message, location, code_snippet,
                                     expected_pattern, actual_pattern, suggested_fix, confidence,
                                     detected_at, resolution, resolved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                violation.pattern_id.0,
                violation.file_path,
                violation.message,
                location,
                violation.code_snippet,
                violation.expected_pattern,
                violation.actual_pattern,
                violation.suggested_fix,
                violation.confidence,
                ts(violation.detected_at),
                violation.resolution.map(Resolution::as_str),
                violation.resolved_at.map(ts),
            ],
        )
        .map_err(StoreError::Sqlite)?;
        Ok(ViolationId(conn.last_insert_rowid()))
    }

    async fn list_violations(
        &self,
        filter: &ViolationFilter,
    ) -> crate::error::Result<Vec<Violation>> {
        let conn = self.conn.lock().expect("tenet store mutex poisoned");
        let mut sql = format!("SELECT {VIOLATION_COLUMNS} FROM violations WHERE 1 = 1");
        let mut values: Vec<Value> = Vec::new();
        if filter.open_only {
            sql.push_str(" AND resolved_at IS NULL");
        }
        if let Some(path) = &filter.file_path {
            values.push(Value::Text(path.clone()));
            sql.push_str(&format!(" AND file_path = ?{}", values.len()));
        }
        if let Some(pattern_id) = filter.pattern_id {
            values.push(Value::Integer(pattern_id.0));
            sql.push_str(&format!(" AND pattern_id = ?{}", values.len()));
        }
        sql.push_str(" ORDER BY id DESC");

        let mut stmt = conn.prepare(&sql).map_err(StoreError::Sqlite)?;
        let violations = stmt
            .query_map(params_from_iter(values), Self::row_to_violation)
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(violations)
    }

    async fn resolve_violation(
        &self,
        id: ViolationId,
        resolution: Resolution,
    ) -> crate::error::Result<Violation> {
        let mut conn = self.conn.lock().expect("tenet store mutex poisoned");
        let tx = conn.transaction().map_err(StoreError::Sqlite)?;
        let violation = Self::load_violation(&tx, id)?;
        if !violation.is_open() {
            return Err(StoreError::AlreadyResolved(id.0).into());
        }

        let now = ts(Utc::now());
        tx.execute(
            "UPDATE violations SET resolution = ?1, resolved_at = ?2 WHERE id = ?3",
            params![resolution.as_str(), now, id.0],
        )
        .map_err(StoreError::Sqlite)?;

        if resolution == Resolution::PatternUpdated {
            tx.execute(
                "UPDATE patterns SET confidence = confidence * ?1, updated_at = ?2 WHERE id = ?3",
                params![OVERRIDE_DECAY_FACTOR, now, violation.pattern_id.0],
            )
            .map_err(StoreError::Sqlite)?;
            info!(
                violation_id = id.0,
                pattern_id = violation.pattern_id.0,
                "Pattern confidence decayed after accepted deviation"
            );
        }

        let resolved = Self::load_violation(&tx, id)?;
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(resolved)
    }

    // ── Exceptions ─────────────────────────────────────────────────

    async fn add_exception(&self, exception: &NewException) -> crate::error::Result<ExceptionId> {
        if exception.reason.trim().is_empty() {
            return Err(InputError::Malformed {
                path: exception.file_path.clone().unwrap_or_else(|| "*".to_string()),
                message: "an exception requires a reason".to_string(),
            }
            .into());
        }
        let conn = self.conn.lock().expect("tenet store mutex poisoned");
        let exists: Option<i64> = conn
            .query_row(
                "SELECT id FROM patterns WHERE id = ?1",
                params![exception.pattern_id.0],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::Sqlite)?;
        if exists.is_none() {
            return Err(StoreError::NotFound(format!("pattern {}", exception.pattern_id)).into());
        }

        conn.execute(
            "INSERT INTO pattern_exceptions (pattern_id, file_path, reason, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                exception.pattern_id.0,
                exception.file_path,
                exception.reason,
                ts(Utc::now()),
                exception.expires_at.map(ts),
            ],
        )
        .map_err(StoreError::Sqlite)?;
        Ok(ExceptionId(conn.last_insert_rowid()))
    }

    async fn is_excepted(
        &self,
        pattern_id: PatternId,
        file_path: &str,
    ) -> crate::error::Result<bool> {
        let conn = self.conn.lock().expect("tenet store mutex poisoned");
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, pattern_id, file_path, reason, created_at, expires_at
                 FROM pattern_exceptions
                 WHERE pattern_id = ?1 AND (file_path IS NULL OR file_path = ?2)",
            )
            .map_err(StoreError::Sqlite)?;
        let now = Utc::now();
        let exceptions = stmt
            .query_map(params![pattern_id.0, file_path], Self::row_to_exception)
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(exceptions
            .iter()
            .any(|e| e.is_active(now) && e.applies_to(file_path)))
    }

    async fn list_exceptions(
        &self,
        include_expired: bool,
    ) -> crate::error::Result<Vec<PatternException>> {
        let conn = self.conn.lock().expect("tenet store mutex poisoned");
        let mut stmt = conn
            .prepare(
                "SELECT id, pattern_id, file_path, reason, created_at, expires_at
                 FROM pattern_exceptions ORDER BY id",
            )
            .map_err(StoreError::Sqlite)?;
        let now = Utc::now();
        let exceptions = stmt
            .query_map([], Self::row_to_exception)
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(exceptions
            .into_iter()
            .filter(|e| include_expired || e.is_active(now))
            .collect())
    }

    // ── Concepts ───────────────────────────────────────────────────

    async fn concepts_for_file(
        &self,
        file_path: &str,
        include_deleted: bool,
    ) -> crate::error::Result<Vec<Concept>> {
        let conn = self.conn.lock().expect("tenet store mutex poisoned");
        let sql = if include_deleted {
            "SELECT id, file_path, kind, name, line, content_hash, deleted
             FROM concepts WHERE file_path = ?1 ORDER BY line, id"
        } else {
            "SELECT id, file_path, kind, name, line, content_hash, deleted
             FROM concepts WHERE file_path = ?1 AND deleted = 0 ORDER BY line, id"
        };
        let mut stmt = conn.prepare(sql).map_err(StoreError::Sqlite)?;
        let concepts = stmt
            .query_map(params![file_path], Self::row_to_concept)
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(concepts)
    }

    async fn upsert_concept(
        &self,
        concept: &Concept,
    ) -> crate::error::Result<(ConceptId, ConceptChange)> {
        let conn = self.conn.lock().expect("tenet store mutex poisoned");
        let now = ts(Utc::now());
        #[allow(clippy::cast_possible_wrap)]
        let hash = concept.content_hash as i64;

        let existing: Option<(i64, u32, i64, bool)> = conn
            .query_row(
                "SELECT id, line, content_hash, deleted FROM concepts
                 WHERE file_path = ?1 AND kind = ?2 AND name = ?3",
                params![concept.file_path, concept.kind.as_str(), concept.name],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()
            .map_err(StoreError::Sqlite)?;

        match existing {
            None => {
                conn.execute(
                    "INSERT INTO concepts (file_path, kind, name, line, content_hash, deleted, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
                    params![
                        concept.file_path,
                        concept.kind.as_str(),
                        concept.name,
                        concept.line,
                        hash,
                        now
                    ],
                )
                .map_err(StoreError::Sqlite)?;
                Ok((ConceptId(conn.last_insert_rowid()), ConceptChange::Added))
            }
            Some((id, line, stored_hash, deleted)) => {
                let change = if deleted {
                    ConceptChange::Added
                } else if stored_hash == hash && line == concept.line {
                    return Ok((ConceptId(id), ConceptChange::Unchanged));
                } else {
                    ConceptChange::Modified
                };
                conn.execute(
                    "UPDATE concepts SET line = ?1, content_hash = ?2, deleted = 0, updated_at = ?3
                     WHERE id = ?4",
                    params![concept.line, hash, now, id],
                )
                .map_err(StoreError::Sqlite)?;
                Ok((ConceptId(id), change))
            }
        }
    }

    async fn soft_delete_concept(&self, id: ConceptId) -> crate::error::Result<bool> {
        let conn = self.conn.lock().expect("tenet store mutex poisoned");
        let changed = conn
            .execute(
                "UPDATE concepts SET deleted = 1, updated_at = ?1 WHERE id = ?2 AND deleted = 0",
                params![ts(Utc::now()), id.0],
            )
            .map_err(StoreError::Sqlite)?;
        Ok(changed > 0)
    }

    async fn search_concepts(
        &self,
        query: &str,
        limit: usize,
    ) -> crate::error::Result<Vec<Concept>> {
        let conn = self.conn.lock().expect("tenet store mutex poisoned");
        let pattern = format!("%{}%", escape_like(query));
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = conn
            .prepare(
                "SELECT id, file_path, kind, name, line, content_hash, deleted
                 FROM concepts
                 WHERE deleted = 0 AND name LIKE ?1 ESCAPE '\\'
                 ORDER BY name, file_path LIMIT ?2",
            )
            .map_err(StoreError::Sqlite)?;
        let concepts = stmt
            .query_map(params![pattern, limit], Self::row_to_concept)
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(concepts)
    }

    // ── Learning deltas ────────────────────────────────────────────

    async fn begin_delta(
        &self,
        delta: &NewDelta,
        stale_after: Duration,
    ) -> crate::error::Result<LearningDelta> {
        let mut conn = self.conn.lock().expect("tenet store mutex poisoned");
        let tx = conn.transaction().map_err(StoreError::Sqlite)?;
        let now = Utc::now();
        let cutoff = now
            - chrono::Duration::from_std(stale_after).unwrap_or_else(|_| chrono::Duration::zero());

        let processing: Vec<(i64, String)> = {
            let mut stmt = tx
                .prepare("SELECT id, created_at FROM learning_deltas WHERE status = 'processing'")
                .map_err(StoreError::Sqlite)?;
            stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
                .map_err(StoreError::Sqlite)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(StoreError::Sqlite)?
        };

        let mut blocked = false;
        for (id, created_at) in processing {
            let started = parse_ts(&created_at).ok_or_else(|| {
                StoreError::Sqlite(conversion_error(
                    1,
                    format!("delta {id}: invalid created_at {created_at}"),
                ))
            })?;
            if started <= cutoff {
                tx.execute(
                    "UPDATE learning_deltas SET status = 'failed', error = 'abandoned', completed_at = ?1
                     WHERE id = ?2",
                    params![ts(now), id],
                )
                .map_err(StoreError::Sqlite)?;
                warn!(delta_id = id, "Marked stale learning run as abandoned");
            } else {
                blocked = true;
            }
        }
        if blocked {
            let project: String = tx
                .query_row(
                    "SELECT value FROM tenet_meta WHERE key = 'project_id'",
                    [],
                    |row| row.get(0),
                )
                .map_err(StoreError::Sqlite)?;
            return Err(LearnError::AlreadyInProgress { project }.into());
        }

        let files = serde_json::to_string(&delta.files_changed).map_err(StoreError::Serialization)?;
        let counts =
            serde_json::to_string(&DeltaCounts::default()).map_err(StoreError::Serialization)?;
        tx.execute(
            "INSERT INTO learning_deltas (trigger_type, commit_sha, commit_message, files_changed,
                                          counts, duration_ms, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7)",
            params![
                delta.trigger.as_str(),
                delta.commit_sha,
                delta.commit_message,
                files,
                counts,
                DeltaStatus::Pending.as_str(),
                ts(now),
            ],
        )
        .map_err(StoreError::Sqlite)?;
        let id = DeltaId(tx.last_insert_rowid());

        debug_assert!(DeltaStatus::Pending.can_transition_to(DeltaStatus::Processing));
        tx.execute(
            "UPDATE learning_deltas SET status = ?1 WHERE id = ?2",
            params![DeltaStatus::Processing.as_str(), id.0],
        )
        .map_err(StoreError::Sqlite)?;

        let opened = Self::load_delta(&tx, id)?;
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(opened)
    }

    async fn finish_delta(
        &self,
        id: DeltaId,
        counts: DeltaCounts,
        duration_ms: u64,
        error: Option<String>,
    ) -> crate::error::Result<LearningDelta> {
        let mut conn = self.conn.lock().expect("tenet store mutex poisoned");
        let tx = conn.transaction().map_err(StoreError::Sqlite)?;
        let current = Self::load_delta(&tx, id)?;
        let next = if error.is_some() {
            DeltaStatus::Failed
        } else {
            DeltaStatus::Completed
        };
        if !current.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition(format!(
                "delta {id}: {} -> {}",
                current.status.as_str(),
                next.as_str()
            ))
            .into());
        }

        let counts_json = serde_json::to_string(&counts).map_err(StoreError::Serialization)?;
        tx.execute(
            "UPDATE learning_deltas
             SET status = ?1, counts = ?2, duration_ms = ?3, error = ?4, completed_at = ?5
             WHERE id = ?6",
            params![
                next.as_str(),
                counts_json,
                to_i64(duration_ms),
                error,
                ts(Utc::now()),
                id.0
            ],
        )
        .map_err(StoreError::Sqlite)?;
        let finished = Self::load_delta(&tx, id)?;
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(finished)
    }

    async fn list_deltas(
        &self,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> crate::error::Result<Vec<LearningDelta>> {
        let conn = self.conn.lock().expect("tenet store mutex poisoned");
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let since = since.map_or_else(String::new, ts);
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {DELTA_COLUMNS} FROM learning_deltas
                 WHERE created_at >= ?1 ORDER BY id DESC LIMIT ?2"
            ))
            .map_err(StoreError::Sqlite)?;
        let deltas = stmt
            .query_map(params![since, limit], Self::row_to_delta)
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(deltas)
    }

    // ── Metrics ────────────────────────────────────────────────────

    async fn stats(&self) -> crate::error::Result<StoreStats> {
        let conn = self.conn.lock().expect("tenet store mutex poisoned");
        let count = |sql: &str| -> crate::error::Result<u64> {
            let n: i64 = conn
                .query_row(sql, [], |row| row.get(0))
                .map_err(StoreError::Sqlite)?;
            Ok(to_u64(n))
        };

        let db_size_bytes = self
            .db_path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map_or(0, |m| m.len());

        Ok(StoreStats {
            patterns: count("SELECT COUNT(*) FROM patterns WHERE deleted = 0")?,
            patterns_deleted: count("SELECT COUNT(*) FROM patterns WHERE deleted = 1")?,
            concepts: count("SELECT COUNT(*) FROM concepts WHERE deleted = 0")?,
            concepts_deleted: count("SELECT COUNT(*) FROM concepts WHERE deleted = 1")?,
            open_violations: count("SELECT COUNT(*) FROM violations WHERE resolved_at IS NULL")?,
            resolved_violations: count(
                "SELECT COUNT(*) FROM violations WHERE resolved_at IS NOT NULL",
            )?,
            exceptions: count("SELECT COUNT(*) FROM pattern_exceptions")?,
            deltas: count("SELECT COUNT(*) FROM learning_deltas")?,
            db_size_bytes,
        })
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Fixed-width RFC 3339 in UTC so stored timestamps sort lexically.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn ts_column(row: &rusqlite::Row<'_>, name: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(name)?;
    parse_ts(&raw).ok_or_else(|| invalid_timestamp(row, name, &raw))
}

fn opt_ts_column(row: &rusqlite::Row<'_>, name: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(name)?;
    raw.map(|raw| parse_ts(&raw).ok_or_else(|| invalid_timestamp(row, name, &raw)))
        .transpose()
}

fn invalid_timestamp(row: &rusqlite::Row<'_>, name: &str, raw: &str) -> rusqlite::Error {
    let column = row.as_ref().column_index(name).unwrap_or(0);
    conversion_error(column, format!("invalid timestamp in {name}: {raw:?}"))
}

fn to_u64(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[allow(clippy::cast_precision_loss)]
fn share(tally: u64, frequency: u64) -> f64 {
    if frequency == 0 {
        0.0
    } else {
        (tally as f64 / frequency as f64).clamp(0.0, 1.0)
    }
}

/// Escape `%`, `_` and `\\` for a `LIKE ... ESCAPE '\\'` clause.
pub(crate) fn escape_like(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convention::NamingConvention;
    use crate::error::TenetError;
    use crate::types::{Span, pattern_signature};

    fn naming_obs(file: &str, ident: &str) -> PatternObservation {
        let convention = NamingConvention::detect(ident);
        PatternObservation {
            subject: PatternSubject::VariableNaming,
            signature: pattern_signature(PatternSubject::VariableNaming, None, Language::TypeScript),
            form: PatternForm::Naming { convention },
            language: Language::TypeScript,
            file_path: file.to_string(),
            anchor: ident.to_string(),
            line: 1,
            column: 7,
            snippet: format!("const {ident} = 1;"),
        }
    }

    fn seeded(confidence: f64, frequency: u64) -> Pattern {
        let now = Utc::now();
        Pattern {
            id: PatternId(0),
            category: PatternCategory::Naming,
            subject: PatternSubject::VariableNaming,
            signature: pattern_signature(PatternSubject::VariableNaming, None, Language::TypeScript),
            expected_form: PatternForm::Naming {
                convention: NamingConvention::CamelCase,
            },
            confidence,
            frequency,
            language: Language::TypeScript,
            examples: vec!["const userId = 1;".into()],
            created_at: now,
            updated_at: now,
        }
    }

    fn new_delta() -> NewDelta {
        NewDelta {
            trigger: TriggerType::Commit,
            commit_sha: Some("abc123".into()),
            commit_message: Some("feat: add users".into()),
            files_changed: vec!["src/a.ts".into()],
        }
    }

    #[tokio::test]
    async fn first_observation_creates_pattern() {
        let store = SqliteStore::in_memory().unwrap();
        let recorded = store.record_occurrence(&naming_obs("src/a.ts", "userId")).await.unwrap();
        assert_eq!(recorded.change, PatternChange::Created);

        let pattern = store.get_pattern(recorded.pattern_id).await.unwrap().unwrap();
        assert_eq!(pattern.frequency, 1);
        assert!((pattern.confidence - 1.0).abs() < f64::EPSILON);
        assert_eq!(pattern.category, PatternCategory::Naming);
        assert_eq!(pattern.examples, vec!["const userId = 1;".to_string()]);
    }

    #[tokio::test]
    async fn recording_the_same_occurrence_twice_is_a_noop() {
        let store = SqliteStore::in_memory().unwrap();
        let obs = naming_obs("src/a.ts", "userId");
        let first = store.record_occurrence(&obs).await.unwrap();
        let second = store.record_occurrence(&obs).await.unwrap();
        assert_eq!(second.change, PatternChange::Unchanged);
        assert_eq!(first.occurrence_id, second.occurrence_id);

        let pattern = store.get_pattern(first.pattern_id).await.unwrap().unwrap();
        assert_eq!(pattern.frequency, 1);
    }

    #[tokio::test]
    async fn mismatch_lowers_confidence_by_ewma() {
        let store = SqliteStore::in_memory().unwrap();
        store.record_occurrence(&naming_obs("src/a.ts", "userId")).await.unwrap();
        store.record_occurrence(&naming_obs("src/a.ts", "orderTotal")).await.unwrap();
        let r = store.record_occurrence(&naming_obs("src/b.ts", "user_name")).await.unwrap();

        let pattern = store.get_pattern(r.pattern_id).await.unwrap().unwrap();
        assert_eq!(pattern.frequency, 3);
        assert!((pattern.confidence - 0.9).abs() < 1e-9);
        assert_eq!(
            pattern.expected_form,
            PatternForm::Naming {
                convention: NamingConvention::CamelCase
            }
        );
    }

    #[tokio::test]
    async fn leading_form_takes_over_with_its_share() {
        let store = SqliteStore::in_memory().unwrap();
        store.record_occurrence(&naming_obs("src/a.ts", "userId")).await.unwrap();
        store.record_occurrence(&naming_obs("src/a.ts", "user_name")).await.unwrap();
        let r = store.record_occurrence(&naming_obs("src/a.ts", "order_total")).await.unwrap();

        let pattern = store.get_pattern(r.pattern_id).await.unwrap().unwrap();
        assert_eq!(
            pattern.expected_form,
            PatternForm::Naming {
                convention: NamingConvention::SnakeCase
            }
        );
        assert!((pattern.confidence - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn retracting_last_occurrence_soft_deletes_pattern() {
        let store = SqliteStore::in_memory().unwrap();
        let r = store.record_occurrence(&naming_obs("src/a.ts", "userId")).await.unwrap();
        let change = store.retract_occurrence(r.occurrence_id).await.unwrap();
        assert_eq!(change, PatternChange::Removed);

        let live = store.list_patterns(&PatternFilter::default()).await.unwrap();
        assert!(live.is_empty());
        let all = store
            .list_patterns(&PatternFilter {
                include_deleted: true,
                ..PatternFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].frequency, 0);

        // Re-observing revives the same row
        let again = store.record_occurrence(&naming_obs("src/a.ts", "userId")).await.unwrap();
        assert_eq!(again.change, PatternChange::Created);
        assert_eq!(again.pattern_id, r.pattern_id);
    }

    #[tokio::test]
    async fn retraction_resets_confidence_to_share() {
        let store = SqliteStore::in_memory().unwrap();
        store.record_occurrence(&naming_obs("src/a.ts", "userId")).await.unwrap();
        store.record_occurrence(&naming_obs("src/a.ts", "orderTotal")).await.unwrap();
        let snake = store.record_occurrence(&naming_obs("src/b.ts", "user_name")).await.unwrap();
        store.record_occurrence(&naming_obs("src/b.ts", "itemCount")).await.unwrap();

        let change = store.retract_occurrence(snake.occurrence_id).await.unwrap();
        assert_eq!(change, PatternChange::Updated);
        let pattern = store.get_pattern(snake.pattern_id).await.unwrap().unwrap();
        assert_eq!(pattern.frequency, 3);
        assert!((pattern.confidence - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn pattern_updated_resolution_decays_confidence_once() {
        let store = SqliteStore::in_memory().unwrap();
        let pattern_id = store.put_pattern(&seeded(0.9, 20)).await.unwrap();
        let violation_id = store
            .record_violation(&Violation {
                id: ViolationId(0),
                pattern_id,
                file_path: "src/a.ts".into(),
                message: "variable `user_id` is snake_case".into(),
                location: Span::default(),
                code_snippet: "const user_id = 1;".into(),
                expected_pattern: "camelCase".into(),
                actual_pattern: "snake_case".into(),
                suggested_fix: Some("const userId = 1;".into()),
                confidence: 0.9,
                detected_at: Utc::now(),
                resolution: None,
                resolved_at: None,
            })
            .await
            .unwrap();

        let resolved = store
            .resolve_violation(violation_id, Resolution::PatternUpdated)
            .await
            .unwrap();
        assert_eq!(resolved.resolution, Some(Resolution::PatternUpdated));
        assert!(resolved.resolved_at.is_some());

        let pattern = store.get_pattern(pattern_id).await.unwrap().unwrap();
        assert!((pattern.confidence - 0.81).abs() < 1e-9);

        let err = store
            .resolve_violation(violation_id, Resolution::Ignored)
            .await
            .unwrap_err();
        assert!(matches!(err, TenetError::Store(StoreError::AlreadyResolved(_))));

        let open = store
            .list_violations(&ViolationFilter {
                open_only: true,
                ..ViolationFilter::default()
            })
            .await
            .unwrap();
        assert!(open.is_empty());
    }

    #[tokio::test]
    async fn exceptions_scope_and_expiry() {
        let store = SqliteStore::in_memory().unwrap();
        let pattern_id = store.put_pattern(&seeded(0.9, 20)).await.unwrap();

        store
            .add_exception(&NewException {
                pattern_id,
                file_path: Some("src/legacy.ts".into()),
                reason: "generated code".into(),
                expires_at: None,
            })
            .await
            .unwrap();
        store
            .add_exception(&NewException {
                pattern_id,
                file_path: None,
                reason: "migration finished last week".into(),
                expires_at: Some(Utc::now() - chrono::Duration::days(1)),
            })
            .await
            .unwrap();

        assert!(store.is_excepted(pattern_id, "src/legacy.ts").await.unwrap());
        assert!(!store.is_excepted(pattern_id, "src/new.ts").await.unwrap());
        assert_eq!(store.list_exceptions(false).await.unwrap().len(), 1);
        assert_eq!(store.list_exceptions(true).await.unwrap().len(), 2);

        let err = store
            .add_exception(&NewException {
                pattern_id,
                file_path: None,
                reason: "  ".into(),
                expires_at: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TenetError::Input(_)));
    }

    #[tokio::test]
    async fn concept_upsert_transitions() {
        let store = SqliteStore::in_memory().unwrap();
        let mut concept = Concept {
            id: ConceptId(0),
            file_path: "src/a.ts".into(),
            kind: IdentifierRole::Function,
            name: "loadUser".into(),
            line: 3,
            content_hash: u64::MAX - 7,
            deleted: false,
        };
        let (id, change) = store.upsert_concept(&concept).await.unwrap();
        assert_eq!(change, ConceptChange::Added);
        assert_eq!(store.upsert_concept(&concept).await.unwrap().1, ConceptChange::Unchanged);

        concept.line = 4;
        assert_eq!(store.upsert_concept(&concept).await.unwrap().1, ConceptChange::Modified);

        assert!(store.soft_delete_concept(id).await.unwrap());
        assert!(!store.soft_delete_concept(id).await.unwrap());
        assert!(store.concepts_for_file("src/a.ts", false).await.unwrap().is_empty());
        let all = store.concepts_for_file("src/a.ts", true).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].deleted);
        assert_eq!(all[0].content_hash, u64::MAX - 7);

        assert_eq!(store.upsert_concept(&concept).await.unwrap().1, ConceptChange::Added);
    }

    #[tokio::test]
    async fn concurrent_learning_is_rejected() {
        let store = SqliteStore::in_memory().unwrap();
        let stale_after = Duration::from_secs(900);
        let delta = store.begin_delta(&new_delta(), stale_after).await.unwrap();
        assert_eq!(delta.status, DeltaStatus::Processing);

        let err = store.begin_delta(&new_delta(), stale_after).await.unwrap_err();
        assert!(matches!(err, TenetError::Learn(LearnError::AlreadyInProgress { .. })));

        let counts = DeltaCounts {
            concepts_added: 2,
            ..DeltaCounts::default()
        };
        let done = store.finish_delta(delta.id, counts, 12, None).await.unwrap();
        assert_eq!(done.status, DeltaStatus::Completed);
        assert_eq!(done.counts.concepts_added, 2);
        assert!(done.completed_at.is_some());

        let err = store.finish_delta(delta.id, counts, 12, None).await.unwrap_err();
        assert!(matches!(err, TenetError::Store(StoreError::InvalidTransition(_))));

        assert!(store.begin_delta(&new_delta(), stale_after).await.is_ok());
    }

    #[tokio::test]
    async fn stale_processing_delta_is_abandoned() {
        let store = SqliteStore::in_memory().unwrap();
        let first = store.begin_delta(&new_delta(), Duration::from_secs(900)).await.unwrap();
        let second = store.begin_delta(&new_delta(), Duration::ZERO).await.unwrap();
        assert_ne!(first.id, second.id);

        let history = store.list_deltas(10, None).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[1].status, DeltaStatus::Failed);
        assert_eq!(history[1].error.as_deref(), Some("abandoned"));
    }

    #[tokio::test]
    async fn run_within_stale_window_keeps_blocking() {
        let store = SqliteStore::in_memory().unwrap();
        let first = store.begin_delta(&new_delta(), Duration::from_secs(60)).await.unwrap();
        for window in [60, 301, 900] {
            let err = store
                .begin_delta(&new_delta(), Duration::from_secs(window))
                .await
                .unwrap_err();
            assert!(matches!(err, TenetError::Learn(LearnError::AlreadyInProgress { .. })));
        }

        let done = store
            .finish_delta(first.id, DeltaCounts::default(), 5, None)
            .await
            .unwrap();
        assert_eq!(done.status, DeltaStatus::Completed);
        assert!(done.error.is_none());
    }

    #[tokio::test]
    async fn corrupt_timestamp_is_an_error() {
        let store = SqliteStore::in_memory().unwrap();
        let delta = store.begin_delta(&new_delta(), Duration::from_secs(900)).await.unwrap();
        store
            .conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE learning_deltas SET created_at = 'yesterday' WHERE id = ?1",
                params![delta.id.0],
            )
            .unwrap();

        let err = store.list_deltas(10, None).await.unwrap_err();
        assert!(matches!(err, TenetError::Store(StoreError::Sqlite(_))), "{err}");
        let err = store
            .begin_delta(&new_delta(), Duration::from_secs(900))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid created_at"), "{err}");
    }

    #[tokio::test]
    async fn relocate_moves_occurrences_and_concepts() {
        let store = SqliteStore::in_memory().unwrap();
        store.record_occurrence(&naming_obs("src/old.ts", "userId")).await.unwrap();
        store
            .upsert_concept(&Concept {
                id: ConceptId(0),
                file_path: "src/old.ts".into(),
                kind: IdentifierRole::Variable,
                name: "userId".into(),
                line: 1,
                content_hash: 1,
                deleted: false,
            })
            .await
            .unwrap();

        let moved = store.relocate_file("src/old.ts", "src/new.ts").await.unwrap();
        assert_eq!(moved, 2);
        assert!(store.occurrences_for_file("src/old.ts").await.unwrap().is_empty());
        assert_eq!(store.occurrences_for_file("src/new.ts").await.unwrap().len(), 1);
        assert_eq!(store.concepts_for_file("src/new.ts", false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concept_search_is_case_insensitive_and_literal() {
        let store = SqliteStore::in_memory().unwrap();
        for (name, line) in [("loadUser", 1), ("user_name", 2), ("Invoice", 3)] {
            store
                .upsert_concept(&Concept {
                    id: ConceptId(0),
                    file_path: "src/a.ts".into(),
                    kind: IdentifierRole::Variable,
                    name: name.into(),
                    line,
                    content_hash: 0,
                    deleted: false,
                })
                .await
                .unwrap();
        }
        let hits = store.search_concepts("USER", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        let underscore = store.search_concepts("_", 10).await.unwrap();
        assert_eq!(underscore.len(), 1);
        assert_eq!(underscore[0].name, "user_name");
    }

    #[tokio::test]
    async fn stats_and_project_id() {
        let store = SqliteStore::in_memory().unwrap();
        store.put_pattern(&seeded(0.9, 10)).await.unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.patterns, 1);
        assert_eq!(stats.open_violations, 0);

        let id = store.project_id().await.unwrap();
        assert_eq!(id, store.project_id().await.unwrap());
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }

    #[tokio::test]
    async fn list_patterns_filters() {
        let store = SqliteStore::in_memory().unwrap();
        store.put_pattern(&seeded(0.9, 10)).await.unwrap();
        store.record_occurrence(&naming_obs("src/a.ts", "userId")).await.ok();

        let frequent = store
            .list_patterns(&PatternFilter {
                min_frequency: Some(5),
                ..PatternFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(frequent.len(), 1);

        let structural = store
            .list_patterns(&PatternFilter {
                category: Some(PatternCategory::Structural),
                ..PatternFilter::default()
            })
            .await
            .unwrap();
        assert!(structural.is_empty());
    }

    #[tokio::test]
    async fn on_disk_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tenet.db");
        let project_id = {
            let store = SqliteStore::open(&path).unwrap();
            store.record_occurrence(&naming_obs("src/a.ts", "userId")).await.unwrap();
            store.project_id().await.unwrap()
        };
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.project_id().await.unwrap(), project_id);
        assert_eq!(store.list_patterns(&PatternFilter::default()).await.unwrap().len(), 1);
        assert!(store.stats().await.unwrap().db_size_bytes > 0);
    }
}
