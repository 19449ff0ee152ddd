// Naming-convention detection and conversion, plus the payload similarity
// used for cross-project consensus. All purely algorithmic.

use serde::{Deserialize, Serialize};

/// Identifier casing conventions Tenet can learn and enforce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamingConvention {
    #[serde(rename = "camelCase")]
    CamelCase,
    #[serde(rename = "PascalCase")]
    PascalCase,
    #[serde(rename = "snake_case")]
    SnakeCase,
    #[serde(rename = "SCREAMING_SNAKE_CASE")]
    ScreamingSnakeCase,
    #[serde(rename = "kebab-case")]
    KebabCase,
    /// A single all-lowercase word; consistent with several conventions.
    #[serde(rename = "lowercase")]
    Lowercase,
    #[serde(rename = "mixed")]
    Mixed,
}

impl NamingConvention {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CamelCase => "camelCase",
            Self::PascalCase => "PascalCase",
            Self::SnakeCase => "snake_case",
            Self::ScreamingSnakeCase => "SCREAMING_SNAKE_CASE",
            Self::KebabCase => "kebab-case",
            Self::Lowercase => "lowercase",
            Self::Mixed => "mixed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "camelCase" | "camel" => Some(Self::CamelCase),
            "PascalCase" | "pascal" => Some(Self::PascalCase),
            "snake_case" | "snake" => Some(Self::SnakeCase),
            "SCREAMING_SNAKE_CASE" | "screaming" => Some(Self::ScreamingSnakeCase),
            "kebab-case" | "kebab" => Some(Self::KebabCase),
            "lowercase" => Some(Self::Lowercase),
            "mixed" => Some(Self::Mixed),
            _ => None,
        }
    }

    /// Classify an identifier. Leading/trailing underscores are ignored.
    pub fn detect(ident: &str) -> Self {
        let core = ident.trim_matches('_');
        if core.is_empty() {
            return Self::Mixed;
        }
        let has_upper = core.chars().any(char::is_uppercase);
        let has_lower = core.chars().any(char::is_lowercase);

        if core.contains('-') {
            return if !has_upper && !core.contains('_') {
                Self::KebabCase
            } else {
                Self::Mixed
            };
        }
        if core.contains('_') {
            return match (has_upper, has_lower) {
                (false, _) => Self::SnakeCase,
                (true, false) => Self::ScreamingSnakeCase,
                (true, true) => Self::Mixed,
            };
        }
        let first_upper = core.starts_with(|c: char| c.is_uppercase());
        match (first_upper, has_upper, has_lower) {
            (true, _, false) if core.chars().filter(|c| c.is_alphabetic()).count() > 1 => {
                Self::ScreamingSnakeCase
            }
            (true, _, _) => Self::PascalCase,
            (false, true, _) => Self::CamelCase,
            (false, false, _) => Self::Lowercase,
        }
    }

    /// Whether an identifier detected as `self` conforms to `expected`.
    ///
    /// A single lowercase word is valid camelCase, snake_case and kebab-case.
    pub fn conforms_to(self, expected: Self) -> bool {
        if self == expected {
            return true;
        }
        self == Self::Lowercase
            && matches!(
                expected,
                Self::CamelCase | Self::SnakeCase | Self::KebabCase
            )
    }

    /// Whether this convention is distinctive enough to be learned from.
    pub fn is_learnable(self) -> bool {
        !matches!(self, Self::Lowercase | Self::Mixed)
    }

    /// Mechanically rewrite `ident` into this convention, keeping any
    /// leading/trailing underscores.
    pub fn convert(self, ident: &str) -> String {
        let leading = ident.len() - ident.trim_start_matches('_').len();
        let trailing = ident.len() - ident.trim_end_matches('_').len();
        if leading == ident.len() {
            return ident.to_string();
        }
        let core = &ident[leading..ident.len() - trailing];
        let words = split_words(core);
        if words.is_empty() {
            return ident.to_string();
        }

        let body = match self {
            Self::CamelCase => {
                let mut out = words[0].clone();
                for w in &words[1..] {
                    out.push_str(&capitalize(w));
                }
                out
            }
            Self::PascalCase => words.iter().map(|w| capitalize(w)).collect(),
            Self::SnakeCase => words.join("_"),
            Self::ScreamingSnakeCase => words.join("_").to_uppercase(),
            Self::KebabCase => words.join("-"),
            Self::Lowercase => words.concat(),
            Self::Mixed => core.to_string(),
        };
        format!("{}{body}{}", &ident[..leading], &ident[ident.len() - trailing..])
    }
}

impl std::fmt::Display for NamingConvention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split an identifier into lowercase words on `_`, `-`, case transitions
/// and acronym boundaries (`HTTPServer` → `http`, `server`).
pub fn split_words(ident: &str) -> Vec<String> {
    let mut words = Vec::new();
    for segment in ident.split(['_', '-']).filter(|s| !s.is_empty()) {
        let chars: Vec<char> = segment.chars().collect();
        let mut current = String::new();
        for (i, &c) in chars.iter().enumerate() {
            let boundary = i > 0 && c.is_uppercase() && {
                let prev = chars[i - 1];
                let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
                prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower)
            };
            if boundary && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            current.extend(c.to_lowercase());
        }
        if !current.is_empty() {
            words.push(current);
        }
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Similarity of two pattern payload keys in `[0, 1]`; identical keys score 1.0.
pub fn payload_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let ratio = similar::TextDiff::from_chars(a, b).ratio();
    f64::from(ratio).clamp(0.0, 1.0)
}

/// Mean pairwise similarity across payload keys. A single payload is
/// trivially in full agreement.
#[allow(clippy::cast_precision_loss)]
pub fn consensus(payloads: &[&str]) -> f64 {
    if payloads.len() < 2 {
        return 1.0;
    }
    let mut total = 0.0;
    let mut pairs = 0u64;
    for (i, a) in payloads.iter().enumerate() {
        for b in &payloads[i + 1..] {
            total += payload_similarity(a, b);
            pairs += 1;
        }
    }
    (total / pairs as f64).clamp(0.0, 1.0)
}
