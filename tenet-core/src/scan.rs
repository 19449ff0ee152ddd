// Lightweight structural scanning: declarations by role, import groups,
// error-handling and async sites, file roles. Line-oriented regex matching
// plus brace/indent block extraction; no full parsing.

use std::sync::LazyLock;

use regex::Regex;

use crate::convention::NamingConvention;
use crate::types::{IdentifierRole, ImportGroup, Language};

/// A declared identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub role: IdentifierRole,
    pub name: String,
    /// 1-based.
    pub line: u32,
    /// 1-based column of the identifier.
    pub column: u32,
    pub line_text: String,
}

/// A single import statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportLine {
    pub group: ImportGroup,
    pub source: String,
    pub line: u32,
    pub text: String,
}

/// A block of code where an idiom is expected (catch block, async body).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdiomSite {
    pub line: u32,
    pub column: u32,
    pub end_line: u32,
    pub header: String,
    pub body: String,
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("scanner regex must compile")
}

// ── Declarations ───────────────────────────────────────────────────

static ES_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    re(r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)")
});
static ES_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    re(r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?(?:class|interface|enum)\s+([A-Za-z_$][\w$]*)")
});
static ES_BINDING: LazyLock<Regex> = LazyLock::new(|| {
    re(r"^\s*(?:export\s+)?(const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(.*)$")
});
static ES_ARROW: LazyLock<Regex> =
    LazyLock::new(|| re(r"^(?:async\s+)?(?:function\b|\([^)]*\)\s*(?::[^=]+)?=>|[A-Za-z_$][\w$]*\s*=>)"));

static PY_FUNCTION: LazyLock<Regex> =
    LazyLock::new(|| re(r"^\s*(?:async\s+)?def\s+([A-Za-z_]\w*)"));
static PY_CLASS: LazyLock<Regex> = LazyLock::new(|| re(r"^\s*class\s+([A-Za-z_]\w*)"));
static PY_BINDING: LazyLock<Regex> =
    LazyLock::new(|| re(r"^\s*([A-Za-z_]\w*)\s*(?::\s*[^=]+)?=[^=]"));

static RS_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    re(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+([A-Za-z_]\w*)")
});
static RS_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait|type|union)\s+([A-Za-z_]\w*)")
});
static RS_CONST: LazyLock<Regex> = LazyLock::new(|| {
    re(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:const|static)\s+(?:mut\s+)?([A-Za-z_]\w*)\s*:")
});
static RS_LET: LazyLock<Regex> = LazyLock::new(|| re(r"^\s*let\s+(?:mut\s+)?([A-Za-z_]\w*)"));

static GO_FUNCTION: LazyLock<Regex> =
    LazyLock::new(|| re(r"^func\s+(?:\([^)]*\)\s*)?([A-Za-z_]\w*)"));
static GO_TYPE: LazyLock<Regex> =
    LazyLock::new(|| re(r"^\s*type\s+([A-Za-z_]\w*)\s+(?:struct|interface)"));
static GO_CONST: LazyLock<Regex> = LazyLock::new(|| re(r"^\s*const\s+([A-Za-z_]\w*)"));
static GO_VAR: LazyLock<Regex> = LazyLock::new(|| re(r"^\s*var\s+([A-Za-z_]\w*)"));
static GO_SHORT: LazyLock<Regex> =
    LazyLock::new(|| re(r"^\s*([A-Za-z_]\w*)\s*(?:,\s*[A-Za-z_]\w*\s*)*:="));

fn is_comment(trimmed: &str, language: Language) -> bool {
    match language {
        Language::Python => trimmed.starts_with('#'),
        _ => trimmed.starts_with("//") || trimmed.starts_with("/*") || trimmed.starts_with('*'),
    }
}

/// Extract declared identifiers with their roles.
pub fn declarations(content: &str, language: Language) -> Vec<Declaration> {
    let mut out = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || is_comment(trimmed, language) {
            continue;
        }
        let found = match language {
            Language::TypeScript | Language::JavaScript => ecmascript_declaration(line),
            Language::Python => python_declaration(line),
            Language::Rust => first_match(
                line,
                &[
                    (&RS_FUNCTION, IdentifierRole::Function),
                    (&RS_TYPE, IdentifierRole::Class),
                    (&RS_CONST, IdentifierRole::Constant),
                    (&RS_LET, IdentifierRole::Variable),
                ],
            ),
            Language::Go => first_match(
                line,
                &[
                    (&GO_FUNCTION, IdentifierRole::Function),
                    (&GO_TYPE, IdentifierRole::Class),
                    (&GO_CONST, IdentifierRole::Constant),
                    (&GO_VAR, IdentifierRole::Variable),
                    (&GO_SHORT, IdentifierRole::Variable),
                ],
            ),
        };
        if let Some((role, start, name)) = found {
            if name == "_" {
                continue;
            }
            out.push(Declaration {
                role,
                name: name.to_string(),
                line: line_number(idx),
                column: column_number(start),
                line_text: line.trim().to_string(),
            });
        }
    }
    out
}

fn first_match<'a>(
    line: &'a str,
    table: &[(&LazyLock<Regex>, IdentifierRole)],
) -> Option<(IdentifierRole, usize, &'a str)> {
    table.iter().find_map(|(regex, role)| {
        regex
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| (*role, m.start(), m.as_str()))
    })
}

fn ecmascript_declaration(line: &str) -> Option<(IdentifierRole, usize, &str)> {
    if let Some(found) = first_match(
        line,
        &[
            (&ES_FUNCTION, IdentifierRole::Function),
            (&ES_CLASS, IdentifierRole::Class),
        ],
    ) {
        return Some(found);
    }
    let caps = ES_BINDING.captures(line)?;
    let keyword = caps.get(1)?.as_str();
    let name = caps.get(2)?;
    let rhs = caps.get(3).map_or("", |m| m.as_str().trim_start());
    let role = if ES_ARROW.is_match(rhs) {
        IdentifierRole::Function
    } else if keyword == "const"
        && NamingConvention::detect(name.as_str()) == NamingConvention::ScreamingSnakeCase
    {
        IdentifierRole::Constant
    } else {
        IdentifierRole::Variable
    };
    Some((role, name.start(), name.as_str()))
}

fn python_declaration(line: &str) -> Option<(IdentifierRole, usize, &str)> {
    if let Some(found) = first_match(
        line,
        &[
            (&PY_FUNCTION, IdentifierRole::Function),
            (&PY_CLASS, IdentifierRole::Class),
        ],
    ) {
        return Some(found);
    }
    let caps = PY_BINDING.captures(line)?;
    let name = caps.get(1)?;
    if matches!(name.as_str(), "self" | "cls" | "return" | "if" | "elif" | "while") {
        return None;
    }
    let role = if NamingConvention::detect(name.as_str()) == NamingConvention::ScreamingSnakeCase {
        IdentifierRole::Constant
    } else {
        IdentifierRole::Variable
    };
    Some((role, name.start(), name.as_str()))
}

// ── Imports ────────────────────────────────────────────────────────

static ES_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| re(r#"^\s*import\s+(?:type\s+)?(?:[^'"]*?\s+from\s+)?['"]([^'"]+)['"]"#));
static ES_REQUIRE: LazyLock<Regex> = LazyLock::new(|| {
    re(r#"^\s*(?:const|let|var)\s+[^=]+=\s*require\(\s*['"]([^'"]+)['"]\s*\)"#)
});
static PY_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| re(r"^(?:from\s+(\.*[\w.]*)\s+import\b|import\s+([\w.]+))"));
static RS_USE: LazyLock<Regex> =
    LazyLock::new(|| re(r"^(?:pub(?:\([^)]*\))?\s+)?use\s+(?:::)?([\w:]+)"));
static GO_IMPORT_SINGLE: LazyLock<Regex> =
    LazyLock::new(|| re(r#"^import\s+(?:[\w.]+\s+)?"([^"]+)""#));
static GO_IMPORT_ITEM: LazyLock<Regex> = LazyLock::new(|| re(r#"^\s*(?:[\w.]+\s+)?"([^"]+)""#));

const NODE_BUILTINS: &[&str] = &[
    "assert", "buffer", "child_process", "crypto", "events", "fs", "http", "https", "net", "os",
    "path", "stream", "url", "util", "zlib", "readline", "worker_threads",
];

const PYTHON_STDLIB: &[&str] = &[
    "abc", "asyncio", "collections", "contextlib", "dataclasses", "datetime", "enum",
    "functools", "itertools", "json", "logging", "math", "os", "pathlib", "re", "subprocess",
    "sys", "time", "typing", "unittest", "uuid",
];

/// Classify a module path into an import group.
pub fn classify_import(source: &str, language: Language) -> ImportGroup {
    match language {
        Language::TypeScript | Language::JavaScript => {
            let root = source.split('/').next().unwrap_or(source);
            if source.starts_with('.') {
                ImportGroup::Relative
            } else if source.starts_with("@/") || source.starts_with("~/") || source.starts_with("src/") {
                ImportGroup::Internal
            } else if source.starts_with("node:") || NODE_BUILTINS.contains(&root) {
                ImportGroup::Builtin
            } else {
                ImportGroup::External
            }
        }
        Language::Python => {
            let root = source.split('.').next().unwrap_or(source);
            if source.starts_with('.') {
                ImportGroup::Relative
            } else if PYTHON_STDLIB.contains(&root) {
                ImportGroup::Builtin
            } else {
                ImportGroup::External
            }
        }
        Language::Rust => {
            let root = source.split("::").next().unwrap_or(source);
            match root {
                "std" | "core" | "alloc" => ImportGroup::Builtin,
                "crate" => ImportGroup::Internal,
                "super" | "self" => ImportGroup::Relative,
                _ => ImportGroup::External,
            }
        }
        Language::Go => {
            let root = source.split('/').next().unwrap_or(source);
            if root.contains('.') {
                ImportGroup::External
            } else {
                ImportGroup::Builtin
            }
        }
    }
}

/// Extract import statements in source order.
pub fn imports(content: &str, language: Language) -> Vec<ImportLine> {
    let mut out = Vec::new();
    let mut in_go_block = false;
    for (idx, line) in content.lines().enumerate() {
        let source = match language {
            Language::TypeScript | Language::JavaScript => ES_IMPORT
                .captures(line)
                .or_else(|| ES_REQUIRE.captures(line))
                .and_then(|c| c.get(1))
                .map(|m| m.as_str()),
            Language::Python => PY_IMPORT
                .captures(line)
                .and_then(|c| c.get(1).or_else(|| c.get(2)))
                .map(|m| m.as_str()),
            Language::Rust => RS_USE.captures(line).and_then(|c| c.get(1)).map(|m| m.as_str()),
            Language::Go => {
                let trimmed = line.trim();
                if in_go_block {
                    if trimmed.starts_with(')') {
                        in_go_block = false;
                        None
                    } else {
                        GO_IMPORT_ITEM
                            .captures(line)
                            .and_then(|c| c.get(1))
                            .map(|m| m.as_str())
                    }
                } else if trimmed.starts_with("import (") {
                    in_go_block = true;
                    None
                } else {
                    GO_IMPORT_SINGLE
                        .captures(trimmed)
                        .and_then(|c| c.get(1))
                        .map(|m| m.as_str())
                }
            }
        };
        if let Some(source) = source {
            out.push(ImportLine {
                group: classify_import(source, language),
                source: source.to_string(),
                line: line_number(idx),
                text: line.to_string(),
            });
        }
    }
    out
}

/// Group sequence with consecutive duplicates collapsed.
pub fn import_groups(imports: &[ImportLine]) -> Vec<ImportGroup> {
    let mut groups: Vec<ImportGroup> = Vec::new();
    for import in imports {
        if groups.last() != Some(&import.group) {
            groups.push(import.group);
        }
    }
    groups
}

// ── Idiom sites ────────────────────────────────────────────────────

static ES_CATCH: LazyLock<Regex> = LazyLock::new(|| re(r"\bcatch\s*(?:\([^)]*\))?\s*\{"));
static PY_EXCEPT: LazyLock<Regex> = LazyLock::new(|| re(r"^\s*except\b[^:]*:"));
static GO_ERR: LazyLock<Regex> = LazyLock::new(|| re(r"\bif\s+err\s*!=\s*nil\s*\{"));
static RS_ERR_ARM: LazyLock<Regex> = LazyLock::new(|| re(r"\bErr\(\s*\w+\s*\)\s*=>\s*"));

static ES_ASYNC: LazyLock<Regex> = LazyLock::new(|| {
    re(r"\basync\s+(?:function\b[^{]*|[A-Za-z_$][\w$]*\s*\([^)]*\)[^{;=]*|(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*(?::[^=]+)?=>\s*)\{")
});
static PY_ASYNC: LazyLock<Regex> = LazyLock::new(|| re(r"^\s*async\s+def\s+\w+[^:]*:"));
static RS_ASYNC: LazyLock<Regex> = LazyLock::new(|| re(r"\basync\s+fn\s+\w+[^{;]*\{"));

/// Error-handling blocks: `catch`, `except`, `if err != nil`, `Err(..) =>`.
pub fn error_handling_sites(content: &str, language: Language) -> Vec<IdiomSite> {
    match language {
        Language::TypeScript | Language::JavaScript => brace_sites(content, &ES_CATCH),
        Language::Python => indent_sites(content, &PY_EXCEPT),
        Language::Go => brace_sites(content, &GO_ERR),
        Language::Rust => rust_err_arms(content),
    }
}

/// Bodies of asynchronous functions.
pub fn async_sites(content: &str, language: Language) -> Vec<IdiomSite> {
    match language {
        Language::TypeScript | Language::JavaScript => brace_sites(content, &ES_ASYNC),
        Language::Python => indent_sites(content, &PY_ASYNC),
        Language::Rust => brace_sites(content, &RS_ASYNC),
        Language::Go => Vec::new(),
    }
}

/// Sites whose header regex ends at an opening brace.
fn brace_sites(content: &str, header: &Regex) -> Vec<IdiomSite> {
    header
        .find_iter(content)
        .filter_map(|m| {
            let open = m.end() - 1;
            let close = matching_brace(content, open)?;
            let (line, column) = position(content, m.start());
            let (end_line, _) = position(content, close);
            Some(IdiomSite {
                line,
                column,
                end_line,
                header: m.as_str().trim().to_string(),
                body: content[open + 1..close].to_string(),
            })
        })
        .collect()
}

/// Python-style sites: the body is every following line indented deeper
/// than the header.
fn indent_sites(content: &str, header: &Regex) -> Vec<IdiomSite> {
    let lines: Vec<&str> = content.lines().collect();
    let mut out = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        if !header.is_match(line) {
            continue;
        }
        let indent = indentation(line);
        let mut body = Vec::new();
        let mut end = idx;
        for (j, next) in lines.iter().enumerate().skip(idx + 1) {
            if next.trim().is_empty() {
                continue;
            }
            if indentation(next) <= indent {
                break;
            }
            body.push(*next);
            end = j;
        }
        out.push(IdiomSite {
            line: line_number(idx),
            column: column_number(indent),
            end_line: line_number(end),
            header: line.trim().to_string(),
            body: body.join("\n"),
        });
    }
    out
}

fn rust_err_arms(content: &str) -> Vec<IdiomSite> {
    RS_ERR_ARM
        .find_iter(content)
        .map(|m| {
            let rest = &content[m.end()..];
            let (body, body_end) = if rest.starts_with('{') {
                let open = m.end();
                match matching_brace(content, open) {
                    Some(close) => (content[open + 1..close].to_string(), close),
                    None => (rest.to_string(), content.len()),
                }
            } else {
                let stop = rest.find([',', '\n']).unwrap_or(rest.len());
                (rest[..stop].to_string(), m.end() + stop)
            };
            let (line, column) = position(content, m.start());
            let (end_line, _) = position(content, body_end.saturating_sub(1).max(m.start()));
            IdiomSite {
                line,
                column,
                end_line,
                header: m.as_str().trim().to_string(),
                body,
            }
        })
        .collect()
}

static LEADING_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    re(r"^(?:await\s+)?([A-Za-z_$][\w$]*(?:(?:\.|::)[A-Za-z_$][\w$]*)*!?)")
});

/// Token naming the first statement of an error-handling body
/// (`logger.error`, `throw`, `return`, `tracing::error!`), or `empty`.
pub fn error_handling_token(body: &str) -> String {
    body.lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with("//") && !l.starts_with('#'))
        .and_then(|l| LEADING_TOKEN.captures(l))
        .and_then(|c| c.get(1))
        .map_or_else(|| "empty".to_string(), |m| m.as_str().to_string())
}

/// Classify how an async body handles failure, or `None` when the body
/// does not await anything.
pub fn async_token(body: &str, language: Language) -> Option<&'static str> {
    let awaits = contains_token(body, "await") || body.contains(".then(");
    if !awaits {
        return None;
    }
    match language {
        Language::Rust => Some(if body.contains(".await?") { "?" } else { "await" }),
        _ => {
            if contains_token(body, "try") {
                Some("try")
            } else if body.contains(".then(") {
                Some(".then(")
            } else {
                Some("await")
            }
        }
    }
}

/// Whether `token` appears in `text`, respecting identifier boundaries at
/// the token's alphanumeric ends.
pub fn contains_token(text: &str, token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    let is_ident = |c: char| c.is_alphanumeric() || c == '_' || c == '$';
    let starts_ident = token.chars().next().is_some_and(is_ident);
    let ends_ident = token.chars().next_back().is_some_and(is_ident);
    let mut offset = 0;
    while let Some(pos) = text[offset..].find(token) {
        let start = offset + pos;
        let end = start + token.len();
        let before_ok = !starts_ident || !text[..start].chars().next_back().is_some_and(is_ident);
        let after_ok = !ends_ident || !text[end..].chars().next().is_some_and(is_ident);
        if before_ok && after_ok {
            return true;
        }
        offset = start + token.len().max(1);
        while !text.is_char_boundary(offset) {
            offset += 1;
        }
    }
    false
}

// ── File roles ─────────────────────────────────────────────────────

const ROLES: &[&str] = &[
    "service",
    "controller",
    "model",
    "repository",
    "handler",
    "component",
    "middleware",
    "route",
    "schema",
    "store",
    "util",
    "helper",
    "view",
    "hook",
];

/// The architectural role suggested by a file name, and the file's directory.
///
/// `src/billing/invoice.service.ts` → `("service", "src/billing")`.
pub fn file_role(path: &str) -> Option<(String, String)> {
    let normalized = path.replace('\\', "/");
    let (dir, file) = match normalized.rsplit_once('/') {
        Some((d, f)) => (d.to_string(), f.to_string()),
        None => (String::new(), normalized.clone()),
    };
    let stem = file.split('.').next().unwrap_or(&file);
    let lower = file.to_ascii_lowercase();

    if lower.contains(".test.")
        || lower.contains(".spec.")
        || lower.contains("_test.")
        || lower.starts_with("test_")
    {
        return Some(("test".to_string(), dir));
    }

    let dotted_role = file.split('.').skip(1).find_map(|part| {
        let part = part.to_ascii_lowercase();
        ROLES.iter().find(|r| part == **r || part == format!("{r}s"))
    });
    let word_role = || {
        let words = crate::convention::split_words(stem);
        let last = words.last()?.clone();
        if stem.starts_with("use") && words.len() > 1 {
            return ROLES.iter().find(|r| **r == "hook");
        }
        ROLES
            .iter()
            .find(|r| last == **r || last == format!("{r}s"))
    };
    dotted_role
        .or_else(word_role)
        .map(|role| ((*role).to_string(), dir))
}

// ── Renaming ───────────────────────────────────────────────────────

static SCRIPT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    re(concat!(
        r"(?P<skip>\.\.\.?)",
        r#"|(?P<fstr>\b[rR]?[fF][rR]?(?:"(?:[^"\\\n]|\\.)*"?|'(?:[^'\\\n]|\\.)*'?))"#,
        r"|(?P<tpl>`(?:[^`\\]|\\.)*`?)",
        r#"|(?P<str>"(?:[^"\\\n]|\\.)*"?|'(?:[^'\\\n]|\\.)*'?)"#,
        r"|(?P<member>\??\.\s*[A-Za-z_$][\w$]*)",
        r"|(?P<ident>[A-Za-z_$][\w$]*)",
    ))
});
static RUST_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    re(concat!(
        r"(?P<skip>\.\.=?)",
        r#"|(?P<str>"(?:[^"\\]|\\.)*"?)"#,
        r"|(?P<chr>'(?:[^'\\]|\\[^']*)')",
        r"|(?P<member>(?:\.|::)\s*[A-Za-z_][\w]*)",
        r"|(?P<ident>[A-Za-z_][\w]*)",
    ))
});

/// Rename references to the identifier `from`. Member accesses and paths
/// (`x.from`, `x?.from`, `x::from`) name other bindings and are left alone,
/// as is text inside string and character literals. Interpolations in
/// template literals and f-strings are code and are renamed.
pub fn rename_identifier(text: &str, from: &str, to: &str, language: Language) -> String {
    if from.is_empty() || !text.contains(from) {
        return text.to_string();
    }
    let tokens: &Regex = if language == Language::Rust {
        &RUST_TOKEN
    } else {
        &SCRIPT_TOKEN
    };

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in tokens.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&text[last..whole.start()]);
        last = whole.end();
        let token = whole.as_str();
        if caps.name("ident").is_some() && token == from {
            out.push_str(to);
        } else if caps.name("tpl").is_some() {
            out.push_str(&rename_interpolations(token, "${", from, to, language));
        } else if caps.name("fstr").is_some() {
            out.push_str(&rename_interpolations(token, "{", from, to, language));
        } else {
            out.push_str(token);
        }
    }
    out.push_str(&text[last..]);
    out
}

fn rename_interpolations(
    literal: &str,
    open: &str,
    from: &str,
    to: &str,
    language: Language,
) -> String {
    let mut out = String::with_capacity(literal.len());
    let mut rest = literal;
    while let Some(pos) = rest.find(open) {
        let body_start = pos + open.len();
        // `{{` is an escaped brace in f-strings
        if open == "{" && rest[body_start..].starts_with('{') {
            out.push_str(&rest[..=body_start]);
            rest = &rest[body_start + 1..];
            continue;
        }
        let Some(len) = closing_brace(&rest[body_start..]) else {
            break;
        };
        out.push_str(&rest[..body_start]);
        out.push_str(&rename_identifier(
            &rest[body_start..body_start + len],
            from,
            to,
            language,
        ));
        rest = &rest[body_start + len..];
    }
    out.push_str(rest);
    out
}

/// Byte length up to the `}` closing an already-open brace.
fn closing_brace(text: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, c) in text.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

// ── Position helpers ───────────────────────────────────────────────

fn matching_brace(content: &str, open: usize) -> Option<usize> {
    let bytes = content.as_bytes();
    if bytes.get(open) != Some(&b'{') {
        return None;
    }
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// 1-based (line, column) for a byte offset.
fn position(content: &str, offset: usize) -> (u32, u32) {
    let before = &content[..offset.min(content.len())];
    let line = before.matches('\n').count();
    let column = before.rfind('\n').map_or(before.len(), |nl| before.len() - nl - 1);
    (line_number(line), column_number(column))
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn line_number(idx: usize) -> u32 {
    u32::try_from(idx + 1).unwrap_or(u32::MAX)
}

fn column_number(idx: usize) -> u32 {
    u32::try_from(idx + 1).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typescript_declarations_by_role() {
        let src = "import { x } from 'y';\nconst user_id = 1;\nconst MAX_RETRIES = 3;\nlet count = 0;\nfunction fetchUser() {}\nconst load = async () => {};\nexport class UserService {}\n// const ignored_name = 2;\n";
        let decls = declarations(src, Language::TypeScript);
        let summary: Vec<_> = decls.iter().map(|d| (d.role, d.name.as_str())).collect();
        assert_eq!(
            summary,
            vec![
                (IdentifierRole::Variable, "user_id"),
                (IdentifierRole::Constant, "MAX_RETRIES"),
                (IdentifierRole::Variable, "count"),
                (IdentifierRole::Function, "fetchUser"),
                (IdentifierRole::Function, "load"),
                (IdentifierRole::Class, "UserService"),
            ]
        );
        assert_eq!(decls[0].line, 2);
        assert_eq!(decls[0].column, 7);
        assert_eq!(decls[0].line_text, "const user_id = 1;");
    }

    #[test]
    fn python_and_rust_declarations() {
        let py = "import os\nMAX_SIZE = 10\nclass UserRepo:\n    def find_user(self):\n        user_name = 'x'\n";
        let roles: Vec<_> = declarations(py, Language::Python)
            .into_iter()
            .map(|d| (d.role, d.name))
            .collect();
        assert_eq!(roles[0], (IdentifierRole::Constant, "MAX_SIZE".to_string()));
        assert_eq!(roles[1], (IdentifierRole::Class, "UserRepo".to_string()));
        assert_eq!(roles[2], (IdentifierRole::Function, "find_user".to_string()));
        assert_eq!(roles[3], (IdentifierRole::Variable, "user_name".to_string()));

        let rs = "pub struct Store;\nconst LIMIT: usize = 3;\npub async fn open_store() {\n    let mut conn = 1;\n}\n";
        let names: Vec<_> = declarations(rs, Language::Rust)
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["Store", "LIMIT", "open_store", "conn"]);
    }

    #[test]
    fn imports_are_grouped() {
        let src = "import fs from 'fs';\nimport React from 'react';\nimport { api } from '@/api';\nimport { util } from './util';\n";
        let found = imports(src, Language::TypeScript);
        assert_eq!(
            import_groups(&found),
            vec![
                ImportGroup::Builtin,
                ImportGroup::External,
                ImportGroup::Internal,
                ImportGroup::Relative
            ]
        );

        let go = "package main\n\nimport (\n\t\"fmt\"\n\t\"github.com/pkg/errors\"\n)\n";
        let groups = import_groups(&imports(go, Language::Go));
        assert_eq!(groups, vec![ImportGroup::Builtin, ImportGroup::External]);
    }

    #[test]
    fn catch_blocks_and_tokens() {
        let src = "try {\n  run();\n} catch (err) {\n  logger.error(err);\n  throw err;\n}\n";
        let sites = error_handling_sites(src, Language::TypeScript);
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].line, 3);
        assert_eq!(error_handling_token(&sites[0].body), "logger.error");

        let py = "try:\n    run()\nexcept ValueError:\n    raise\n";
        let sites = error_handling_sites(py, Language::Python);
        assert_eq!(error_handling_token(&sites[0].body), "raise");

        let rs = "match open() {\n    Ok(v) => v,\n    Err(e) => return Err(e.into()),\n}\n";
        let sites = error_handling_sites(rs, Language::Rust);
        assert_eq!(error_handling_token(&sites[0].body), "return");
    }

    #[test]
    fn async_bodies_are_classified() {
        let src = "async function load() {\n  try {\n    await fetch(url);\n  } catch (e) {\n    logger.error(e);\n  }\n}\nconst go = async () => {\n  await fetch(url);\n};\n";
        let sites = async_sites(src, Language::TypeScript);
        assert_eq!(sites.len(), 2);
        assert_eq!(async_token(&sites[0].body, Language::TypeScript), Some("try"));
        assert_eq!(async_token(&sites[1].body, Language::TypeScript), Some("await"));
        assert_eq!(async_token("return 1;", Language::TypeScript), None);
    }

    #[test]
    fn token_search_respects_boundaries() {
        assert!(contains_token("  try {", "try"));
        assert!(!contains_token("retry()", "try"));
        assert!(contains_token("logger.error(e)", "logger.error"));
        assert!(!contains_token("mylogger.errors", "logger.error"));
        assert!(contains_token("x.then(y)", ".then("));
    }

    #[test]
    fn rename_leaves_members_and_strings_alone() {
        let code = "const user_id = row.user_id;\nsend({ \"user_id\": user_id, other: row?.user_id });";
        assert_eq!(
            rename_identifier(code, "user_id", "userId", Language::TypeScript),
            "const userId = row.user_id;\nsend({ \"user_id\": userId, other: row?.user_id });"
        );

        let code = "const user_id = 1;\nconst user_id_map = {};\nuse(user_id, ...user_id);";
        assert_eq!(
            rename_identifier(code, "user_id", "userId", Language::TypeScript),
            "const userId = 1;\nconst user_id_map = {};\nuse(userId, ...userId);"
        );
    }

    #[test]
    fn rename_reaches_into_interpolations() {
        let code = "log(`user_id=${user_id} of ${ids[user_id]}`, 'user_id');";
        assert_eq!(
            rename_identifier(code, "user_id", "userId", Language::JavaScript),
            "log(`user_id=${userId} of ${ids[userId]}`, 'user_id');"
        );

        let code = "print(f\"{userId} {{userId}}\", \"userId\", self.userId)";
        assert_eq!(
            rename_identifier(code, "userId", "user_id", Language::Python),
            "print(f\"{user_id} {{userId}}\", \"userId\", self.userId)"
        );
    }

    #[test]
    fn rename_in_rust_skips_paths_and_chars() {
        let code = "fn load<'a>(userId: &'a str) -> Id { let c = 'u'; ids::userId(userId, self.userId, \"userId\") }";
        assert_eq!(
            rename_identifier(code, "userId", "user_id", Language::Rust),
            "fn load<'a>(user_id: &'a str) -> Id { let c = 'u'; ids::userId(user_id, self.userId, \"userId\") }"
        );
    }

    #[test]
    fn file_roles_from_names() {
        assert_eq!(
            file_role("src/services/user.service.ts"),
            Some(("service".to_string(), "src/services".to_string()))
        );
        assert_eq!(
            file_role("src/api/UserController.ts"),
            Some(("controller".to_string(), "src/api".to_string()))
        );
        assert_eq!(
            file_role("tests/test_models.py"),
            Some(("test".to_string(), "tests".to_string()))
        );
        assert_eq!(file_role("src/hooks/useAuth.ts").map(|r| r.0), Some("hook".to_string()));
        assert_eq!(file_role("src/index.ts"), None);
    }
}
