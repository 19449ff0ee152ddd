use std::collections::HashSet;

use crate::convention::NamingConvention;
use crate::scan;
use crate::types::{
    Concept, ConceptId, Language, PatternForm, PatternObservation, PatternSubject, content_hash,
    pattern_signature,
};

use super::AnalysisEngine;

/// Built-in engine over the line-oriented scanner in [`crate::scan`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalEngine;

impl LexicalEngine {
    pub fn concepts(file_path: &str, content: &str, language: Language) -> Vec<Concept> {
        let mut seen = HashSet::new();
        scan::declarations(content, language)
            .into_iter()
            .filter(|decl| seen.insert((decl.role, decl.name.clone())))
            .map(|decl| Concept {
                id: ConceptId(0),
                file_path: file_path.to_string(),
                kind: decl.role,
                name: decl.name,
                line: decl.line,
                content_hash: content_hash(decl.line_text.trim().as_bytes()),
                deleted: false,
            })
            .collect()
    }

    /// Identifier casing per declaration. Identifiers whose casing says
    /// nothing about a convention (single lowercase words, mixed) are skipped.
    pub fn naming_observations(
        file_path: &str,
        content: &str,
        language: Language,
    ) -> Vec<PatternObservation> {
        scan::declarations(content, language)
            .into_iter()
            .filter_map(|decl| {
                let convention = NamingConvention::detect(&decl.name);
                if !convention.is_learnable() {
                    return None;
                }
                let subject = PatternSubject::for_role(decl.role);
                Some(PatternObservation {
                    subject,
                    signature: pattern_signature(subject, None, language),
                    form: PatternForm::Naming { convention },
                    language,
                    file_path: file_path.to_string(),
                    anchor: decl.name,
                    line: decl.line,
                    column: decl.column,
                    snippet: decl.line_text.trim().to_string(),
                })
            })
            .collect()
    }

    /// File placement by role, plus import grouping order.
    pub fn structural_observations(
        file_path: &str,
        content: &str,
        language: Language,
    ) -> Vec<PatternObservation> {
        let mut out = Vec::new();

        if let Some((role, dir)) = scan::file_role(file_path) {
            if let Some(directory) = location_segment(&role, &dir) {
                let subject = PatternSubject::FileLocation;
                out.push(PatternObservation {
                    subject,
                    signature: pattern_signature(subject, Some(&role), language),
                    form: PatternForm::Location { directory },
                    language,
                    file_path: file_path.to_string(),
                    anchor: "location".to_string(),
                    line: 1,
                    column: 1,
                    snippet: file_path.to_string(),
                });
            }
        }

        let imports = scan::imports(content, language);
        let groups = scan::import_groups(&imports);
        if groups.len() >= 2 {
            let subject = PatternSubject::ImportOrder;
            out.push(PatternObservation {
                subject,
                signature: pattern_signature(subject, None, language),
                form: PatternForm::ImportOrder { groups },
                language,
                file_path: file_path.to_string(),
                anchor: "imports".to_string(),
                line: imports.first().map_or(1, |i| i.line),
                column: 1,
                snippet: imports
                    .iter()
                    .map(|i| i.text.trim())
                    .collect::<Vec<_>>()
                    .join("\n"),
            });
        }
        out
    }

    /// Leading statement of error handlers and the failure style of async
    /// bodies.
    pub fn implementation_observations(
        file_path: &str,
        content: &str,
        language: Language,
    ) -> Vec<PatternObservation> {
        let mut out = Vec::new();

        let subject = PatternSubject::ErrorHandling;
        let signature = pattern_signature(subject, None, language);
        for (idx, site) in scan::error_handling_sites(content, language)
            .into_iter()
            .enumerate()
        {
            out.push(PatternObservation {
                subject,
                signature: signature.clone(),
                form: PatternForm::Idiom {
                    token: scan::error_handling_token(&site.body),
                },
                language,
                file_path: file_path.to_string(),
                anchor: format!("catch#{idx}"),
                line: site.line,
                column: site.column,
                snippet: site.header,
            });
        }

        let subject = PatternSubject::AsyncControlFlow;
        let signature = pattern_signature(subject, None, language);
        for (idx, site) in scan::async_sites(content, language).into_iter().enumerate() {
            let Some(token) = scan::async_token(&site.body, language) else {
                continue;
            };
            out.push(PatternObservation {
                subject,
                signature: signature.clone(),
                form: PatternForm::Idiom {
                    token: token.to_string(),
                },
                language,
                file_path: file_path.to_string(),
                anchor: format!("async#{idx}"),
                line: site.line,
                column: site.column,
                snippet: site.header,
            });
        }
        out
    }
}

/// The directory segment that characterizes where files of `role` live:
/// the first segment naming the role (`services` for `service`), else the
/// immediate parent. Root-level files carry no location information.
fn location_segment(role: &str, dir: &str) -> Option<String> {
    let segments: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    let last = segments.last()?;
    let named = segments
        .iter()
        .find(|s| s.to_ascii_lowercase().contains(role))
        .unwrap_or(last);
    Some((*named).to_string())
}

#[async_trait::async_trait]
impl AnalysisEngine for LexicalEngine {
    fn name(&self) -> &'static str {
        "lexical"
    }

    async fn extract_concepts(
        &self,
        file_path: &str,
        content: &str,
        language: Language,
    ) -> crate::error::Result<Vec<Concept>> {
        Ok(Self::concepts(file_path, content, language))
    }

    async fn extract_candidate_patterns(
        &self,
        file_path: &str,
        content: &str,
        language: Language,
    ) -> crate::error::Result<Vec<PatternObservation>> {
        let mut out = Self::naming_observations(file_path, content, language);
        out.extend(Self::structural_observations(file_path, content, language));
        out.extend(Self::implementation_observations(file_path, content, language));
        Ok(out)
    }
}
