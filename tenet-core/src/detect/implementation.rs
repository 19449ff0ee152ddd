use crate::scan::{self, IdiomSite};
use crate::types::{Language, Pattern, PatternForm, PatternSubject, Span, pattern_signature};

use super::{Finding, PatternIndex};

/// Expected idiom tokens inside error handlers and async bodies.
pub(crate) fn check<'a>(
    index: &PatternIndex<'a>,
    content: &str,
    language: Language,
) -> Vec<Finding<'a>> {
    let mut findings = Vec::new();

    if let Some((pattern, token)) = idiom(index, PatternSubject::ErrorHandling, language) {
        for site in scan::error_handling_sites(content, language) {
            let actual = scan::error_handling_token(&site.body);
            let present = if token == "empty" {
                actual == "empty"
            } else {
                scan::contains_token(&site.body, token)
            };
            if !present {
                findings.push(finding(pattern, &site, "error handler", token, actual));
            }
        }
    }

    if let Some((pattern, token)) = idiom(index, PatternSubject::AsyncControlFlow, language) {
        for site in scan::async_sites(content, language) {
            let Some(actual) = scan::async_token(&site.body, language) else {
                continue;
            };
            if !scan::contains_token(&site.body, token) {
                findings.push(finding(
                    pattern,
                    &site,
                    "async body",
                    token,
                    actual.to_string(),
                ));
            }
        }
    }
    findings
}

fn idiom<'a>(
    index: &PatternIndex<'a>,
    subject: PatternSubject,
    language: Language,
) -> Option<(&'a Pattern, &'a str)> {
    let pattern = index.get(&pattern_signature(subject, None, language))?;
    match &pattern.expected_form {
        PatternForm::Idiom { token } => Some((pattern, token.as_str())),
        _ => None,
    }
}

fn finding<'a>(
    pattern: &'a Pattern,
    site: &IdiomSite,
    what: &str,
    expected: &str,
    actual: String,
) -> Finding<'a> {
    Finding {
        pattern,
        message: format!("{what} does not use {expected} (found {actual})"),
        location: Span {
            start_line: site.line,
            start_column: site.column,
            end_line: site.end_line,
            end_column: 1,
        },
        snippet: site.header.clone(),
        expected: expected.to_string(),
        actual,
        suggested_fix: None,
        edit: None,
    }
}
