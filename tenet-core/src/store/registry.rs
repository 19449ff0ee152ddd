use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{AggregateError, StoreError};
use crate::types::{
    AggregationRun, GlobalPattern, Language, PatternCategory, PatternSubject, Project,
    ProjectPattern,
};

use super::ProjectRegistry;
use super::schema;
use super::sqlite::escape_like;

const PROJECT_COLUMNS: &str =
    "id, path, name, pattern_count, concept_count, linked_at, last_sync_at";

/// SQLite-backed registry shared by every project on this machine.
#[derive(Debug)]
pub struct SqliteRegistry {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteRegistry {
    /// Open (or create) the registry, creating parent directories as needed.
    pub fn open(path: &Path) -> crate::error::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Migration(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path).map_err(StoreError::Sqlite)?;
        let registry = Self {
            conn: Mutex::new(conn),
            db_path: Some(path.to_path_buf()),
        };
        registry.initialize()?;
        Ok(registry)
    }

    /// Create an in-memory registry (for testing).
    pub fn in_memory() -> crate::error::Result<Self> {
        let conn = Connection::open_in_memory().map_err(StoreError::Sqlite)?;
        let registry = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        registry.initialize()?;
        Ok(registry)
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> crate::error::Result<()> {
        let conn = self.conn.lock().expect("tenet registry mutex poisoned");
        conn.execute_batch(schema::PRAGMAS_SQL)
            .map_err(StoreError::Sqlite)?;
        let _ = conn.execute_batch("PRAGMA journal_mode = WAL;");
        conn.execute_batch(schema::REGISTRY_SQL)
            .map_err(StoreError::Sqlite)?;
        conn.execute(
            "INSERT OR IGNORE INTO tenet_meta (key, value) VALUES ('schema_version', ?1)",
            params![schema::SCHEMA_VERSION],
        )
        .map_err(StoreError::Sqlite)?;
        Ok(())
    }

    fn row_to_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
        Ok(Project {
            id: row.get("id")?,
            path: row.get("path")?,
            name: row.get("name")?,
            pattern_count: u64::try_from(row.get::<_, i64>("pattern_count")?).unwrap_or(0),
            concept_count: u64::try_from(row.get::<_, i64>("concept_count")?).unwrap_or(0),
            linked_at: ts_column(row, "linked_at")?,
            last_sync_at: opt_ts_column(row, "last_sync_at")?,
        })
    }

    fn row_to_project_pattern(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProjectPattern> {
        let category: String = row.get("category")?;
        let subject: String = row.get("subject")?;
        let language: String = row.get("language")?;
        let form: String = row.get("form")?;
        let invalid = |column: usize, what: String| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                what.into(),
            )
        };
        Ok(ProjectPattern {
            signature: row.get("signature")?,
            category: PatternCategory::parse(&category)
                .ok_or_else(|| invalid(2, format!("unknown category {category}")))?,
            subject: PatternSubject::parse(&subject)
                .ok_or_else(|| invalid(3, format!("unknown subject {subject}")))?,
            language: Language::parse(&language)
                .ok_or_else(|| invalid(4, format!("unknown language {language}")))?,
            form: serde_json::from_str(&form).map_err(|e| invalid(5, e.to_string()))?,
            frequency: u64::try_from(row.get::<_, i64>("frequency")?).unwrap_or(0),
            confidence: row.get("confidence")?,
        })
    }

    fn load_project(conn: &Connection, id: &str) -> rusqlite::Result<Option<Project>> {
        conn.query_row(
            &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"),
            params![id],
            Self::row_to_project,
        )
        .optional()
    }
}

#[async_trait::async_trait]
impl ProjectRegistry for SqliteRegistry {
    async fn upsert_project(&self, project: &Project) -> crate::error::Result<Project> {
        let conn = self.conn.lock().expect("tenet registry mutex poisoned");
        conn.execute(
            "INSERT INTO projects (id, path, name, pattern_count, concept_count, linked_at, last_sync_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET path = excluded.path, name = excluded.name",
            params![
                project.id,
                project.path,
                project.name,
                i64::try_from(project.pattern_count).unwrap_or(i64::MAX),
                i64::try_from(project.concept_count).unwrap_or(i64::MAX),
                ts(project.linked_at),
                project.last_sync_at.map(ts),
            ],
        )
        .map_err(StoreError::Sqlite)?;
        Self::load_project(&conn, &project.id)
            .map_err(StoreError::Sqlite)?
            .ok_or_else(|| AggregateError::UnknownProject(project.id.clone()).into())
    }

    async fn get_project(&self, id: &str) -> crate::error::Result<Option<Project>> {
        let conn = self.conn.lock().expect("tenet registry mutex poisoned");
        Ok(Self::load_project(&conn, id).map_err(StoreError::Sqlite)?)
    }

    async fn find_project_by_path(&self, path: &str) -> crate::error::Result<Option<Project>> {
        let conn = self.conn.lock().expect("tenet registry mutex poisoned");
        let project = conn
            .query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE path = ?1"),
                params![path],
                Self::row_to_project,
            )
            .optional()
            .map_err(StoreError::Sqlite)?;
        Ok(project)
    }

    async fn list_projects(&self) -> crate::error::Result<Vec<Project>> {
        let conn = self.conn.lock().expect("tenet registry mutex poisoned");
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY name, id"
            ))
            .map_err(StoreError::Sqlite)?;
        let projects = stmt
            .query_map([], Self::row_to_project)
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(projects)
    }

    async fn replace_project_patterns(
        &self,
        project_id: &str,
        patterns: &[ProjectPattern],
        concept_count: u64,
    ) -> crate::error::Result<Project> {
        let mut conn = self.conn.lock().expect("tenet registry mutex poisoned");
        let tx = conn.transaction().map_err(StoreError::Sqlite)?;
        if Self::load_project(&tx, project_id)
            .map_err(StoreError::Sqlite)?
            .is_none()
        {
            return Err(AggregateError::UnknownProject(project_id.to_string()).into());
        }

        tx.execute(
            "DELETE FROM project_patterns WHERE project_id = ?1",
            params![project_id],
        )
        .map_err(StoreError::Sqlite)?;
        {
            let mut insert = tx
                .prepare(
                    "INSERT OR REPLACE INTO project_patterns
                        (project_id, signature, category, subject, language, form, frequency, confidence)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .map_err(StoreError::Sqlite)?;
            for pattern in patterns {
                let form = serde_json::to_string(&pattern.form).map_err(StoreError::Serialization)?;
                insert
                    .execute(params![
                        project_id,
                        pattern.signature,
                        pattern.category.as_str(),
                        pattern.subject.as_str(),
                        pattern.language.as_str(),
                        form,
                        i64::try_from(pattern.frequency).unwrap_or(i64::MAX),
                        pattern.confidence,
                    ])
                    .map_err(StoreError::Sqlite)?;
            }
        }
        tx.execute(
            "UPDATE projects SET pattern_count = ?1, concept_count = ?2, last_sync_at = ?3
             WHERE id = ?4",
            params![
                i64::try_from(patterns.len()).unwrap_or(i64::MAX),
                i64::try_from(concept_count).unwrap_or(i64::MAX),
                ts(Utc::now()),
                project_id
            ],
        )
        .map_err(StoreError::Sqlite)?;
        let project = Self::load_project(&tx, project_id)
            .map_err(StoreError::Sqlite)?
            .ok_or_else(|| AggregateError::UnknownProject(project_id.to_string()))?;
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(project)
    }

    async fn project_patterns(
        &self,
        project_id: &str,
    ) -> crate::error::Result<Vec<ProjectPattern>> {
        let conn = self.conn.lock().expect("tenet registry mutex poisoned");
        let mut stmt = conn
            .prepare(
                "SELECT signature, category, subject, language, form, frequency, confidence
                 FROM project_patterns WHERE project_id = ?1 ORDER BY signature",
            )
            .map_err(StoreError::Sqlite)?;
        let patterns = stmt
            .query_map(params![project_id], Self::row_to_project_pattern)
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(patterns)
    }

    async fn store_global_patterns(&self, run: &AggregationRun) -> crate::error::Result<()> {
        let mut conn = self.conn.lock().expect("tenet registry mutex poisoned");
        let tx = conn.transaction().map_err(StoreError::Sqlite)?;
        tx.execute("DELETE FROM global_patterns", [])
            .map_err(StoreError::Sqlite)?;
        let now = ts(Utc::now());
        {
            let mut insert = tx
                .prepare(
                    "INSERT INTO global_patterns
                        (signature, data, aggregated_confidence, consensus_score, project_count, computed_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .map_err(StoreError::Sqlite)?;
            for pattern in &run.patterns {
                let data = serde_json::to_string(pattern).map_err(StoreError::Serialization)?;
                insert
                    .execute(params![
                        pattern.signature,
                        data,
                        pattern.aggregated_confidence,
                        pattern.consensus_score,
                        i64::try_from(pattern.project_count()).unwrap_or(i64::MAX),
                        now,
                    ])
                    .map_err(StoreError::Sqlite)?;
            }
        }
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn global_patterns(&self) -> crate::error::Result<Vec<GlobalPattern>> {
        let conn = self.conn.lock().expect("tenet registry mutex poisoned");
        let mut stmt = conn
            .prepare(
                "SELECT data FROM global_patterns
                 ORDER BY aggregated_confidence DESC, signature ASC",
            )
            .map_err(StoreError::Sqlite)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        let mut patterns = Vec::with_capacity(rows.len());
        for data in rows {
            patterns.push(serde_json::from_str(&data).map_err(StoreError::Serialization)?);
        }
        Ok(patterns)
    }

    async fn search_project_patterns(
        &self,
        query: &str,
        limit: usize,
    ) -> crate::error::Result<Vec<(String, ProjectPattern)>> {
        let conn = self.conn.lock().expect("tenet registry mutex poisoned");
        let needle = format!("%{}%", escape_like(query));
        let mut stmt = conn
            .prepare(
                "SELECT project_id, signature, category, subject, language, form, frequency, confidence
                 FROM project_patterns
                 WHERE signature LIKE ?1 ESCAPE '\\' OR form LIKE ?1 ESCAPE '\\'
                 ORDER BY frequency DESC, signature ASC LIMIT ?2",
            )
            .map_err(StoreError::Sqlite)?;
        let hits = stmt
            .query_map(
                params![needle, i64::try_from(limit).unwrap_or(i64::MAX)],
                |row| Ok((row.get::<_, String>("project_id")?, Self::row_to_project_pattern(row)?)),
            )
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(hits)
    }
}

fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn ts_column(row: &rusqlite::Row<'_>, name: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(name)?;
    parse_ts(row, name, &raw)
}

fn opt_ts_column(row: &rusqlite::Row<'_>, name: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(name)?;
    raw.map(|raw| parse_ts(row, name, &raw)).transpose()
}

fn parse_ts(row: &rusqlite::Row<'_>, name: &str, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                row.as_ref().column_index(name).unwrap_or(0),
                rusqlite::types::Type::Text,
                format!("invalid timestamp in {name}: {e}").into(),
            )
        })
}
