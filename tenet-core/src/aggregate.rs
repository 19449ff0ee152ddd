// Cross-project aggregation: fan out over linked project stores, fold their
// patterns into consensus-scored global patterns keyed by signature.
#![allow(clippy::cast_precision_loss)]

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::config::{AggregationSection, store_path};
use crate::convention::consensus;
use crate::error::{AggregateError, InputError, TenetError};
use crate::store::{PatternStore, ProjectRegistry, SqliteStore};
use crate::types::{
    AggregationRun, Concept, GlobalPattern, GlobalPatternFilter, OmittedProject, PatternFilter,
    Project, ProjectOccurrence, ProjectPattern, ProjectSnapshot, SearchHit, SearchMode,
};

/// Read-only access to project stores by path.
#[async_trait::async_trait]
pub trait ProjectSource: Send + Sync {
    /// Normalize a user-supplied project path.
    fn locate(&self, path: &str) -> crate::error::Result<String> {
        Ok(path.to_string())
    }

    async fn snapshot(&self, project_path: &str) -> crate::error::Result<ProjectSnapshot>;

    async fn search_concepts(
        &self,
        project_path: &str,
        query: &str,
        limit: usize,
    ) -> crate::error::Result<Vec<Concept>>;
}

/// Opens `<project>/.tenet/tenet.db` on every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct StoreSource;

impl StoreSource {
    fn open(project_path: &str) -> crate::error::Result<SqliteStore> {
        let db = store_path(Path::new(project_path));
        if !db.exists() {
            return Err(AggregateError::ProjectUnavailable {
                path: project_path.to_string(),
                message: "no .tenet store (run `tenet init`)".into(),
            }
            .into());
        }
        SqliteStore::open(&db).map_err(|e| {
            AggregateError::ProjectUnavailable {
                path: project_path.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }
}

#[async_trait::async_trait]
impl ProjectSource for StoreSource {
    fn locate(&self, path: &str) -> crate::error::Result<String> {
        let canonical = std::fs::canonicalize(path).map_err(|e| AggregateError::ProjectUnavailable {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Ok(canonical.to_string_lossy().to_string())
    }

    async fn snapshot(&self, project_path: &str) -> crate::error::Result<ProjectSnapshot> {
        let store = Self::open(project_path)?;
        let patterns = store
            .list_patterns(&PatternFilter::default())
            .await?
            .iter()
            .map(ProjectPattern::from)
            .collect();
        let stats = store.stats().await?;
        Ok(ProjectSnapshot {
            project_id: store.project_id().await?,
            patterns,
            concept_count: stats.concepts,
        })
    }

    async fn search_concepts(
        &self,
        project_path: &str,
        query: &str,
        limit: usize,
    ) -> crate::error::Result<Vec<Concept>> {
        Self::open(project_path)?.search_concepts(query, limit).await
    }
}

/// Links projects, keeps their pattern snapshots fresh, and computes the
/// global pattern table.
pub struct CrossProjectAggregator {
    registry: Arc<dyn ProjectRegistry>,
    source: Arc<dyn ProjectSource>,
    config: AggregationSection,
}

impl std::fmt::Debug for CrossProjectAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossProjectAggregator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CrossProjectAggregator {
    pub fn new(
        registry: Arc<dyn ProjectRegistry>,
        source: Arc<dyn ProjectSource>,
        config: AggregationSection,
    ) -> Self {
        Self {
            registry,
            source,
            config,
        }
    }

    fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.config.fetch_timeout_ms)
    }

    async fn fetch(&self, project_path: &str) -> crate::error::Result<ProjectSnapshot> {
        tokio::time::timeout(self.fetch_timeout(), self.source.snapshot(project_path))
            .await
            .map_err(|_| {
                AggregateError::Timeout(format!(
                    "{project_path} after {}ms",
                    self.config.fetch_timeout_ms
                ))
            })?
    }

    /// Link a project by path, or refresh an already-linked one. The
    /// project's pattern snapshot is captured immediately.
    #[instrument(skip_all, name = "link_project", fields(path = %path))]
    pub async fn link_project(
        &self,
        path: &str,
        name: Option<&str>,
    ) -> crate::error::Result<Project> {
        let path = self.source.locate(path)?;
        let snapshot = self.fetch(&path).await?;
        let existing = self.registry.find_project_by_path(&path).await?;

        let id = existing
            .as_ref()
            .map_or_else(|| snapshot.project_id.clone(), |p| p.id.clone());
        let name = name.map(str::to_string).unwrap_or_else(|| {
            existing.as_ref().map_or_else(
                || {
                    Path::new(&path)
                        .file_name()
                        .map_or_else(|| path.clone(), |n| n.to_string_lossy().to_string())
                },
                |p| p.name.clone(),
            )
        });

        self.registry
            .upsert_project(&Project {
                id: id.clone(),
                path: path.clone(),
                name,
                pattern_count: 0,
                concept_count: 0,
                linked_at: Utc::now(),
                last_sync_at: None,
            })
            .await?;
        let project = self
            .registry
            .replace_project_patterns(&id, &snapshot.patterns, snapshot.concept_count)
            .await?;
        info!(project = %project.id, patterns = project.pattern_count, "Project linked");
        Ok(project)
    }

    /// Re-read one linked project's store and replace its contribution.
    #[instrument(skip_all, name = "sync_project", fields(project = %project_id))]
    pub async fn sync_project(&self, project_id: &str) -> crate::error::Result<Project> {
        let project = self
            .registry
            .get_project(project_id)
            .await?
            .ok_or_else(|| AggregateError::UnknownProject(project_id.to_string()))?;
        let snapshot = self.fetch(&project.path).await?;
        let project = self
            .registry
            .replace_project_patterns(project_id, &snapshot.patterns, snapshot.concept_count)
            .await?;
        debug!(patterns = project.pattern_count, "Project synced");
        Ok(project)
    }

    /// Resync the given projects (all linked projects when empty) in
    /// parallel and recompute the global pattern table from the projects
    /// that answered. Failing projects are omitted, not fatal.
    #[instrument(skip_all, name = "aggregate")]
    pub async fn aggregate(&self, project_ids: &[String]) -> crate::error::Result<AggregationRun> {
        let start = Instant::now();
        let mut omitted = Vec::new();

        let projects = if project_ids.is_empty() {
            self.registry.list_projects().await?
        } else {
            let mut found = Vec::with_capacity(project_ids.len());
            for id in project_ids {
                match self.registry.get_project(id).await? {
                    Some(project) => found.push(project),
                    None => omitted.push(OmittedProject {
                        project_id: id.clone(),
                        reason: "not linked".into(),
                    }),
                }
            }
            found
        };

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        for project in projects {
            let source = self.source.clone();
            let semaphore = semaphore.clone();
            let timeout = self.fetch_timeout();
            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => tokio::time::timeout(timeout, source.snapshot(&project.path))
                        .await
                        .unwrap_or_else(|_| {
                            Err(AggregateError::Timeout(format!(
                                "{} after {}ms",
                                project.path,
                                timeout.as_millis()
                            ))
                            .into())
                        }),
                    Err(e) => Err(TenetError::from(AggregateError::ProjectUnavailable {
                        path: project.path.clone(),
                        message: e.to_string(),
                    })),
                };
                (project, result)
            });
        }

        let mut contributions: Vec<(String, Vec<ProjectPattern>)> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (project, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "Aggregation task failed");
                    continue;
                }
            };
            match result {
                Ok(snapshot) => {
                    self.registry
                        .replace_project_patterns(
                            &project.id,
                            &snapshot.patterns,
                            snapshot.concept_count,
                        )
                        .await?;
                    contributions.push((project.id, snapshot.patterns));
                }
                Err(e) => {
                    warn!(project = %project.id, path = %project.path, error = %e, "Project omitted from aggregation");
                    omitted.push(OmittedProject {
                        project_id: project.id,
                        reason: e.to_string(),
                    });
                }
            }
        }
        contributions.sort_by(|a, b| a.0.cmp(&b.0));
        omitted.sort_by(|a, b| a.project_id.cmp(&b.project_id));

        let run = AggregationRun {
            patterns: compute_global_patterns(&contributions),
            omitted,
        };
        self.registry.store_global_patterns(&run).await?;
        info!(
            projects = contributions.len(),
            omitted = run.omitted.len(),
            patterns = run.patterns.len(),
            duration = ?start.elapsed(),
            "Aggregation complete"
        );
        Ok(run)
    }

    /// Stored global patterns passing `filter`, highest confidence first.
    pub async fn get_global_patterns(
        &self,
        filter: &GlobalPatternFilter,
    ) -> crate::error::Result<Vec<GlobalPattern>> {
        let mut patterns: Vec<GlobalPattern> = self
            .registry
            .global_patterns()
            .await?
            .into_iter()
            .filter(|p| filter.accepts(p))
            .collect();
        patterns.sort_by(|a, b| {
            b.aggregated_confidence
                .total_cmp(&a.aggregated_confidence)
                .then_with(|| a.signature.cmp(&b.signature))
        });
        Ok(patterns)
    }

    /// Search pattern snapshots in the registry and/or concepts in each
    /// linked project's store. Unreachable projects are skipped.
    #[instrument(skip_all, name = "search_all_projects", fields(query = %query))]
    pub async fn search_all_projects(
        &self,
        query: &str,
        mode: SearchMode,
        limit: usize,
    ) -> crate::error::Result<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(InputError::Malformed {
                path: "query".into(),
                message: "search query is empty".into(),
            }
            .into());
        }
        let projects = self.registry.list_projects().await?;
        let names: HashMap<&str, &str> = projects
            .iter()
            .map(|p| (p.id.as_str(), p.name.as_str()))
            .collect();
        let mut hits = Vec::new();

        if matches!(mode, SearchMode::Patterns | SearchMode::All) {
            for (project_id, pattern) in self.registry.search_project_patterns(query, limit).await? {
                hits.push(SearchHit {
                    project_name: names.get(project_id.as_str()).map_or_else(
                        || project_id.clone(),
                        |n| (*n).to_string(),
                    ),
                    project_id,
                    kind: "pattern".into(),
                    name: pattern.signature,
                    detail: format!(
                        "{} (confidence {:.2}, frequency {})",
                        pattern.form.describe(),
                        pattern.confidence,
                        pattern.frequency
                    ),
                    file_path: None,
                });
            }
        }

        if matches!(mode, SearchMode::Concepts | SearchMode::All) {
            for project in &projects {
                let found = tokio::time::timeout(
                    self.fetch_timeout(),
                    self.source.search_concepts(&project.path, query, limit),
                )
                .await;
                match found {
                    Ok(Ok(concepts)) => hits.extend(concepts.into_iter().map(|c| SearchHit {
                        project_id: project.id.clone(),
                        project_name: project.name.clone(),
                        kind: "concept".into(),
                        name: c.name,
                        detail: format!("{} at line {}", c.kind.as_str(), c.line),
                        file_path: Some(c.file_path),
                    })),
                    Ok(Err(e)) => {
                        warn!(project = %project.id, error = %e, "Concept search skipped project");
                    }
                    Err(_) => {
                        warn!(project = %project.id, "Concept search timed out");
                    }
                }
            }
        }

        hits.truncate(limit);
        Ok(hits)
    }
}

/// Fold per-project pattern snapshots into global patterns.
///
/// Per signature: `aggregated_confidence = min(1, mean · (1 + ln(1 + n)))`
/// over the `n` contributing projects, `consensus_score` is the mean
/// pairwise similarity of their form keys, and the dominant form is the
/// one with the highest summed frequency.
pub fn compute_global_patterns(contributions: &[(String, Vec<ProjectPattern>)]) -> Vec<GlobalPattern> {
    let mut by_signature: BTreeMap<&str, Vec<(&str, &ProjectPattern)>> = BTreeMap::new();
    for (project_id, patterns) in contributions {
        for pattern in patterns {
            by_signature
                .entry(pattern.signature.as_str())
                .or_default()
                .push((project_id.as_str(), pattern));
        }
    }

    by_signature
        .into_iter()
        .filter_map(|(signature, members)| {
            let (_, first) = members.first()?;
            let n = members.len() as f64;
            let mean = members.iter().map(|(_, p)| p.confidence).sum::<f64>() / n;
            let aggregated = (mean * (1.0 + (1.0 + n).ln())).clamp(0.0, 1.0);

            let keys: Vec<String> = members.iter().map(|(_, p)| p.form.form_key()).collect();
            let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();

            let mut weight: BTreeMap<&str, (u64, &ProjectPattern)> = BTreeMap::new();
            for (&(_, pattern), key) in members.iter().zip(key_refs.iter().copied()) {
                let entry = weight.entry(key).or_insert((0, pattern));
                entry.0 += pattern.frequency;
            }
            let dominant = weight
                .values()
                .fold(None::<(u64, &ProjectPattern)>, |best, &(freq, p)| match best {
                    Some((best_freq, _)) if best_freq >= freq => best,
                    _ => Some((freq, p)),
                })
                .map(|(_, p)| p.form.clone())?;

            Some(GlobalPattern {
                signature: signature.to_string(),
                category: first.category,
                subject: first.subject,
                language: first.language,
                dominant_form: dominant,
                occurrences: members
                    .iter()
                    .map(|(project_id, p)| ProjectOccurrence {
                        project_id: (*project_id).to_string(),
                        frequency: p.frequency,
                        confidence: p.confidence,
                        form: p.form.clone(),
                    })
                    .collect(),
                aggregated_confidence: aggregated,
                consensus_score: consensus(&key_refs),
            })
        })
        .collect()
}
