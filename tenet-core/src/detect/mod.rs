//! Conflict detection: compares a code unit against the learned patterns of
//! its project and reports deviations by severity.

mod implementation;
mod naming;
mod structural;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, instrument, warn};

use crate::scan;
use crate::store::PatternStore;
use crate::types::{
    CheckOptions, CodeUnit, ComplianceReport, Language, PATTERN_FREQUENCY_THRESHOLD, Pattern,
    PatternFilter, Severity, Span, Violation, ViolationId,
};

/// One deviation found by a category checker, before severity filtering.
#[derive(Debug, Clone)]
pub(crate) struct Finding<'a> {
    pub pattern: &'a Pattern,
    pub message: String,
    pub location: Span,
    pub snippet: String,
    pub expected: String,
    pub actual: String,
    pub suggested_fix: Option<String>,
    pub edit: Option<Edit>,
}

/// A mechanical rewrite applied when auto-fix is requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Edit {
    /// Rename references to a binding across the unit.
    Rename { from: String, to: String },
    /// Replace 1-based lines with new text.
    ReplaceLines(Vec<(u32, String)>),
}

/// Learned patterns indexed by signature for one language.
pub(crate) struct PatternIndex<'a> {
    by_signature: HashMap<&'a str, &'a Pattern>,
}

impl<'a> PatternIndex<'a> {
    fn new(patterns: &'a [Pattern]) -> Self {
        Self {
            by_signature: patterns.iter().map(|p| (p.signature.as_str(), p)).collect(),
        }
    }

    pub fn get(&self, signature: &str) -> Option<&'a Pattern> {
        self.by_signature.get(signature).copied()
    }
}

/// Checks code against one project's pattern store.
pub struct ConflictDetector {
    store: Arc<dyn PatternStore>,
    frequency_threshold: u64,
    detections: AtomicU64,
}

impl std::fmt::Debug for ConflictDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConflictDetector")
            .field("frequency_threshold", &self.frequency_threshold)
            .field("detections", &self.detection_count())
            .finish_non_exhaustive()
    }
}

impl ConflictDetector {
    pub fn new(store: Arc<dyn PatternStore>) -> Self {
        Self {
            store,
            frequency_threshold: PATTERN_FREQUENCY_THRESHOLD,
            detections: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn with_frequency_threshold(mut self, threshold: u64) -> Self {
        self.frequency_threshold = threshold.max(1);
        self
    }

    /// Total deviations detected since construction, including those
    /// suppressed by exceptions or filtered by severity.
    pub fn detection_count(&self) -> u64 {
        self.detections.load(Ordering::Relaxed)
    }

    #[instrument(skip_all, name = "check_compliance", fields(file = %unit.file_path))]
    pub async fn check_compliance(
        &self,
        unit: &CodeUnit,
        options: &CheckOptions,
    ) -> crate::error::Result<ComplianceReport> {
        let start = Instant::now();

        let Some(language) = Language::from_path(&unit.file_path) else {
            warn!(file = %unit.file_path, "Cannot analyze code unit: unsupported language");
            return Ok(skipped(unit, None, "unsupported language", start));
        };
        if unit.content.trim().is_empty() {
            warn!(file = %unit.file_path, "Cannot analyze code unit: empty content");
            return Ok(skipped(unit, Some(language), "empty code unit", start));
        }

        let patterns: Vec<Pattern> = self
            .store
            .list_patterns(&PatternFilter {
                language: Some(language),
                min_frequency: Some(self.frequency_threshold),
                ..PatternFilter::default()
            })
            .await?
            .into_iter()
            .filter(|p| p.frequency >= self.frequency_threshold)
            .collect();
        let index = PatternIndex::new(&patterns);

        let mut findings = naming::check(&index, &unit.content, language);
        findings.extend(structural::check(
            &index,
            &unit.file_path,
            &unit.content,
            language,
        ));
        findings.extend(implementation::check(&index, &unit.content, language));

        let mut report = ComplianceReport {
            file_path: unit.file_path.clone(),
            language: Some(language),
            patterns_checked: patterns.len(),
            ..ComplianceReport::default()
        };
        let mut edits = Vec::new();

        for finding in findings {
            self.detections.fetch_add(1, Ordering::Relaxed);
            let pattern = finding.pattern;
            debug!(
                pattern_id = %pattern.id,
                signature = %pattern.signature,
                line = finding.location.start_line,
                "Deviation detected"
            );

            if self.store.is_excepted(pattern.id, &unit.file_path).await? {
                debug!(pattern_id = %pattern.id, "Deviation suppressed by exception");
                continue;
            }
            let Some(severity) = Severity::from_confidence(pattern.confidence) else {
                continue;
            };
            if pattern.confidence < options.severity_threshold.min_confidence()
                || (severity == Severity::Medium && !options.include_warnings)
                || (severity == Severity::Low && !options.include_suggestions)
            {
                continue;
            }

            let mut violation = Violation {
                id: ViolationId(0),
                pattern_id: pattern.id,
                file_path: unit.file_path.clone(),
                message: finding.message,
                location: finding.location,
                code_snippet: finding.snippet,
                expected_pattern: finding.expected,
                actual_pattern: finding.actual,
                suggested_fix: finding.suggested_fix,
                confidence: pattern.confidence,
                detected_at: Utc::now(),
                resolution: None,
                resolved_at: None,
            };
            violation.id = self.store.record_violation(&violation).await?;
            if let Some(edit) = finding.edit {
                edits.push(edit);
            }

            match severity {
                Severity::High => report.violations.push(violation),
                Severity::Medium => report.warnings.push(violation),
                Severity::Low => report.suggestions.push(violation),
            }
        }

        report.overall_score = ComplianceReport::score(
            report.violations.len(),
            report.warnings.len(),
            report.suggestions.len(),
        );
        if options.auto_fix {
            report.fixed_code = Some(apply_edits(&unit.content, &edits, language));
        }
        report.check_duration_ms = elapsed_ms(start);

        debug!(
            high = report.violations.len(),
            medium = report.warnings.len(),
            low = report.suggestions.len(),
            score = report.overall_score,
            "Compliance check complete"
        );
        Ok(report)
    }
}

fn skipped(
    unit: &CodeUnit,
    language: Option<Language>,
    reason: &str,
    start: Instant,
) -> ComplianceReport {
    ComplianceReport {
        file_path: unit.file_path.clone(),
        language,
        overall_score: 100,
        check_duration_ms: elapsed_ms(start),
        skipped_reason: Some(reason.to_string()),
        ..ComplianceReport::default()
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Line replacements first, then identifier renames over the whole text.
fn apply_edits(content: &str, edits: &[Edit], language: Language) -> String {
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
    for edit in edits {
        if let Edit::ReplaceLines(replacements) = edit {
            for (line, text) in replacements {
                if let Some(slot) = usize::try_from(*line)
                    .ok()
                    .and_then(|l| l.checked_sub(1))
                    .and_then(|idx| lines.get_mut(idx))
                {
                    slot.clone_from(text);
                }
            }
        }
    }
    let mut text = lines.join("\n");
    if content.ends_with('\n') {
        text.push('\n');
    }
    for edit in edits {
        if let Edit::Rename { from, to } = edit {
            text = scan::rename_identifier(&text, from, to, language);
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convention::NamingConvention;
    use crate::store::SqliteStore;
    use crate::types::{
        ImportGroup, NewException, PatternForm, PatternId, PatternSubject,
        ViolationFilter, pattern_signature,
    };

    fn pattern(
        subject: PatternSubject,
        qualifier: Option<&str>,
        form: PatternForm,
        confidence: f64,
        frequency: u64,
    ) -> Pattern {
        Pattern {
            id: PatternId(0),
            category: subject.category(),
            subject,
            signature: pattern_signature(subject, qualifier, Language::TypeScript),
            expected_form: form,
            confidence,
            frequency,
            language: Language::TypeScript,
            examples: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn camel(confidence: f64, frequency: u64) -> Pattern {
        pattern(
            PatternSubject::VariableNaming,
            None,
            PatternForm::Naming {
                convention: NamingConvention::CamelCase,
            },
            confidence,
            frequency,
        )
    }

    fn unit(path: &str, content: &str) -> CodeUnit {
        CodeUnit {
            file_path: path.into(),
            content: content.into(),
        }
    }

    async fn detector_with(patterns: &[Pattern]) -> (Arc<SqliteStore>, ConflictDetector) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        for p in patterns {
            store.put_pattern(p).await.unwrap();
        }
        let detector = ConflictDetector::new(store.clone());
        (store, detector)
    }

    #[tokio::test]
    async fn snake_case_variable_against_camel_case_pattern() {
        let (store, detector) = detector_with(&[camel(0.92, 50)]).await;
        let report = detector
            .check_compliance(&unit("src/a.ts", "const user_id = 1;\n"), &CheckOptions::default())
            .await
            .unwrap();

        assert_eq!(report.violations.len(), 1);
        assert!(report.warnings.is_empty() && report.suggestions.is_empty());
        let v = &report.violations[0];
        assert_eq!(v.severity(), Some(Severity::High));
        assert_eq!(v.suggested_fix.as_deref(), Some("const userId = 1;"));
        assert_eq!(v.expected_pattern, "camelCase");
        assert_eq!(v.actual_pattern, "snake_case");
        assert_eq!(report.overall_score, 80);

        let persisted = store
            .list_violations(&ViolationFilter::default())
            .await
            .unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].id, v.id);
    }

    #[tokio::test]
    async fn low_frequency_patterns_never_fire() {
        let (_store, detector) = detector_with(&[camel(0.99, 4)]).await;
        let report = detector
            .check_compliance(&unit("src/a.ts", "const user_id = 1;\n"), &CheckOptions::default())
            .await
            .unwrap();
        assert_eq!(report.all().count(), 0);
        assert_eq!(detector.detection_count(), 0);
    }

    #[tokio::test]
    async fn severity_threshold_and_include_flags_filter() {
        let (_store, detector) = detector_with(&[camel(0.75, 20)]).await;
        let code = unit("src/a.ts", "let user_id = 1;\n");

        let all = detector
            .check_compliance(&code, &CheckOptions::default())
            .await
            .unwrap();
        assert_eq!(all.warnings.len(), 1);

        let high_only = detector
            .check_compliance(
                &code,
                &CheckOptions {
                    severity_threshold: Severity::High,
                    ..CheckOptions::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(high_only.all().count(), 0);

        let no_warnings = detector
            .check_compliance(
                &code,
                &CheckOptions {
                    include_warnings: false,
                    ..CheckOptions::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(no_warnings.all().count(), 0);
        assert_eq!(detector.detection_count(), 3);
    }

    #[tokio::test]
    async fn exceptions_suppress_reporting_but_not_detection() {
        let (store, detector) = detector_with(&[camel(0.92, 50)]).await;
        let pattern_id = store
            .get_pattern_by_signature("naming:variable-naming:typescript")
            .await
            .unwrap()
            .unwrap()
            .id;
        store
            .add_exception(&NewException {
                pattern_id,
                file_path: Some("src/legacy.ts".into()),
                reason: "generated bindings".into(),
                expires_at: None,
            })
            .await
            .unwrap();

        let report = detector
            .check_compliance(&unit("src/legacy.ts", "const user_id = 1;\n"), &CheckOptions::default())
            .await
            .unwrap();
        assert_eq!(report.all().count(), 0);
        assert_eq!(report.overall_score, 100);
        assert_eq!(detector.detection_count(), 1);
        assert!(
            store
                .list_violations(&ViolationFilter::default())
                .await
                .unwrap()
                .is_empty()
        );

        let elsewhere = detector
            .check_compliance(&unit("src/fresh.ts", "const user_id = 1;\n"), &CheckOptions::default())
            .await
            .unwrap();
        assert_eq!(elsewhere.violations.len(), 1);
    }

    #[tokio::test]
    async fn unanalyzable_units_yield_empty_reports() {
        let (_store, detector) = detector_with(&[camel(0.92, 50)]).await;
        let report = detector
            .check_compliance(&unit("notes.txt", "user_id"), &CheckOptions::default())
            .await
            .unwrap();
        assert_eq!(report.skipped_reason.as_deref(), Some("unsupported language"));
        assert_eq!(report.all().count(), 0);

        let report = detector
            .check_compliance(&unit("src/a.ts", "   \n"), &CheckOptions::default())
            .await
            .unwrap();
        assert_eq!(report.skipped_reason.as_deref(), Some("empty code unit"));
    }

    #[tokio::test]
    async fn structural_and_implementation_deviations() {
        let patterns = [
            pattern(
                PatternSubject::FileLocation,
                Some("service"),
                PatternForm::Location {
                    directory: "services".into(),
                },
                0.9,
                12,
            ),
            pattern(
                PatternSubject::ImportOrder,
                None,
                PatternForm::ImportOrder {
                    groups: vec![ImportGroup::External, ImportGroup::Relative],
                },
                0.8,
                30,
            ),
            pattern(
                PatternSubject::ErrorHandling,
                None,
                PatternForm::Idiom {
                    token: "logger.error".into(),
                },
                0.6,
                9,
            ),
        ];
        let (_store, detector) = detector_with(&patterns).await;
        let code = "import { db } from './db';\nimport express from 'express';\n\ntry { run(); } catch (e) { console.log(e); }\n";
        let report = detector
            .check_compliance(
                &unit("src/utils/billing.service.ts", code),
                &CheckOptions {
                    auto_fix: true,
                    ..CheckOptions::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].suggested_fix.as_deref(), Some("services/billing.service.ts"));
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.suggestions.len(), 1);
        assert_eq!(report.suggestions[0].actual_pattern, "console.log");
        assert_eq!(report.overall_score, 65);
        assert_eq!(report.patterns_checked, 3);

        let fixed = report.fixed_code.unwrap();
        assert!(fixed.starts_with("import express from 'express';\nimport { db } from './db';\n"));
    }

    #[tokio::test]
    async fn auto_fix_renames_every_use() {
        let (_store, detector) = detector_with(&[camel(0.9, 10)]).await;
        let code = "let user_id = load();\nsave(user_id);\n";
        let report = detector
            .check_compliance(
                &unit("src/a.ts", code),
                &CheckOptions {
                    auto_fix: true,
                    ..CheckOptions::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(
            report.fixed_code.as_deref(),
            Some("let userId = load();\nsave(userId);\n")
        );
    }

    #[tokio::test]
    async fn auto_fix_keeps_fields_and_string_keys() {
        let (_store, detector) = detector_with(&[camel(0.9, 10)]).await;
        let code = "const user_id = row.user_id;\nsend({ \"user_id\": user_id });";
        let report = detector
            .check_compliance(
                &unit("src/a.ts", code),
                &CheckOptions {
                    auto_fix: true,
                    ..CheckOptions::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(report.violations.len(), 1);
        assert_eq!(
            report.violations[0].suggested_fix.as_deref(),
            Some("const userId = row.user_id;")
        );
        assert_eq!(
            report.fixed_code.as_deref(),
            Some("const userId = row.user_id;\nsend({ \"user_id\": userId });")
        );
    }

    #[test]
    fn line_edits_apply_before_renames() {
        let edits = vec![
            Edit::Rename {
                from: "a_b".into(),
                to: "aB".into(),
            },
            Edit::ReplaceLines(vec![(1, "second".into()), (2, "first a_b".into())]),
        ];
        assert_eq!(apply_edits("first a_b\nsecond", &edits, Language::TypeScript), "second\nfirst aB");
    }
}
