use crate::scan;
use crate::types::{
    ImportGroup, Language, PatternForm, PatternSubject, Span, import_order_consistent,
    pattern_signature,
};

use super::{Edit, Finding, PatternIndex};

/// File placement and import ordering.
pub(crate) fn check<'a>(
    index: &PatternIndex<'a>,
    file_path: &str,
    content: &str,
    language: Language,
) -> Vec<Finding<'a>> {
    let mut findings = Vec::new();
    findings.extend(check_location(index, file_path, language));
    findings.extend(check_imports(index, content, language));
    findings
}

fn check_location<'a>(
    index: &PatternIndex<'a>,
    file_path: &str,
    language: Language,
) -> Option<Finding<'a>> {
    let (role, dir) = scan::file_role(file_path)?;
    let pattern = index.get(&pattern_signature(
        PatternSubject::FileLocation,
        Some(&role),
        language,
    ))?;
    let expected = &pattern.expected_form;
    let PatternForm::Location { directory } = expected else {
        return None;
    };
    let observed = PatternForm::Location {
        directory: dir.clone(),
    };
    if expected.matches(&observed) {
        return None;
    }

    let file_name = file_path.rsplit('/').next().unwrap_or(file_path);
    let actual = if dir.is_empty() { "(project root)".to_string() } else { format!("{dir}/") };
    Some(Finding {
        pattern,
        message: format!("{role} file is in {actual}, expected under {directory}/"),
        location: Span {
            start_line: 1,
            start_column: 1,
            end_line: 1,
            end_column: 1,
        },
        snippet: file_path.to_string(),
        expected: format!("{directory}/"),
        actual,
        suggested_fix: Some(format!("{directory}/{file_name}")),
        edit: None,
    })
}

fn check_imports<'a>(
    index: &PatternIndex<'a>,
    content: &str,
    language: Language,
) -> Option<Finding<'a>> {
    let pattern = index.get(&pattern_signature(PatternSubject::ImportOrder, None, language))?;
    let PatternForm::ImportOrder { groups: expected } = &pattern.expected_form else {
        return None;
    };
    let imports = scan::imports(content, language);
    let actual = scan::import_groups(&imports);
    if import_order_consistent(expected, &actual) {
        return None;
    }

    let mut sorted: Vec<&scan::ImportLine> = imports.iter().collect();
    sorted.sort_by_key(|i| rank(expected, i.group));
    let first = imports.first()?;
    let last = imports.last()?;

    Some(Finding {
        pattern,
        message: format!(
            "imports are ordered {}, expected {}",
            describe(&actual),
            describe(expected)
        ),
        location: Span {
            start_line: first.line,
            start_column: 1,
            end_line: last.line,
            end_column: u32::try_from(last.text.chars().count() + 1).unwrap_or(1),
        },
        snippet: imports
            .iter()
            .map(|i| i.text.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
        expected: describe(expected),
        actual: describe(&actual),
        suggested_fix: Some(
            sorted
                .iter()
                .map(|i| i.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        edit: Some(Edit::ReplaceLines(
            imports
                .iter()
                .zip(&sorted)
                .map(|(slot, import)| (slot.line, import.text.clone()))
                .collect(),
        )),
    })
}

/// Groups the expected order does not rank sort after the ranked ones.
fn rank(expected: &[ImportGroup], group: ImportGroup) -> usize {
    expected
        .iter()
        .position(|g| *g == group)
        .unwrap_or(expected.len())
}

fn describe(groups: &[ImportGroup]) -> String {
    PatternForm::ImportOrder {
        groups: groups.to_vec(),
    }
    .describe()
}
