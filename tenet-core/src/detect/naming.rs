use crate::convention::NamingConvention;
use crate::scan;
use crate::types::{Language, PatternForm, PatternSubject, Span, pattern_signature};

use super::{Edit, Finding, PatternIndex};

/// Identifier casing against the learned convention for its role.
pub(crate) fn check<'a>(
    index: &PatternIndex<'a>,
    content: &str,
    language: Language,
) -> Vec<Finding<'a>> {
    let mut findings = Vec::new();
    for decl in scan::declarations(content, language) {
        let subject = PatternSubject::for_role(decl.role);
        let Some(pattern) = index.get(&pattern_signature(subject, None, language)) else {
            continue;
        };
        let PatternForm::Naming { convention: expected } = pattern.expected_form else {
            continue;
        };

        let actual = NamingConvention::detect(&decl.name);
        if actual.conforms_to(expected) {
            continue;
        }

        let renamed = expected.convert(&decl.name);
        let (suggested_fix, edit) = if renamed == decl.name {
            (None, None)
        } else {
            (
                Some(scan::rename_identifier(
                    &decl.line_text,
                    &decl.name,
                    &renamed,
                    language,
                )),
                Some(Edit::Rename {
                    from: decl.name.clone(),
                    to: renamed,
                }),
            )
        };
        let width = u32::try_from(decl.name.chars().count()).unwrap_or(0);
        findings.push(Finding {
            pattern,
            message: format!(
                "{} '{}' is {}, expected {}",
                decl.role.as_str(),
                decl.name,
                actual,
                expected
            ),
            location: Span {
                start_line: decl.line,
                start_column: decl.column,
                end_line: decl.line,
                end_column: decl.column + width,
            },
            snippet: decl.line_text,
            expected: expected.as_str().to_string(),
            actual: actual.as_str().to_string(),
            suggested_fix,
            edit,
        });
    }
    findings
}
