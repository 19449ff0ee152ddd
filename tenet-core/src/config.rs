use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::Severity;

/// Directory inside a project that holds Tenet state.
pub const TENET_DIR: &str = ".tenet";
/// Per-project configuration file name.
pub const CONFIG_FILE: &str = "config.toml";
/// Per-project pattern store file name.
pub const STORE_FILE: &str = "tenet.db";

/// Top-level Tenet configuration, matching `.tenet/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenetConfig {
    #[serde(default)]
    pub tenet: TenetSection,
    #[serde(default)]
    pub patterns: PatternsSection,
    #[serde(default)]
    pub detection: DetectionSection,
    #[serde(default)]
    pub learning: LearningSection,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub aggregation: AggregationSection,
    #[serde(default)]
    pub scan: ScanSection,
}

impl TenetConfig {
    /// Load `.tenet/config.toml` under `project_root`, or defaults when absent.
    pub fn load(project_root: &Path) -> Result<Self, ConfigError> {
        let path = config_path(project_root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::NotFound(format!("{}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML (used by `tenet init`).
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let rate = self.patterns.learning_rate;
        if !(rate > 0.0 && rate <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "patterns.learning_rate must be in (0, 1], got {rate}"
            )));
        }
        if self.patterns.frequency_threshold == 0 {
            return Err(ConfigError::Invalid(
                "patterns.frequency_threshold must be at least 1".into(),
            ));
        }
        if self.engine.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "engine.failure_threshold must be at least 1".into(),
            ));
        }
        if self.aggregation.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "aggregation.max_concurrency must be at least 1".into(),
            ));
        }
        if self.learning.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "learning.timeout_secs must be at least 1".into(),
            ));
        }
        // A live run must never look abandoned to the next one.
        if self.learning.stale_after_secs <= self.learning.timeout_secs {
            return Err(ConfigError::Invalid(format!(
                "learning.stale_after_secs ({}) must exceed learning.timeout_secs ({})",
                self.learning.stale_after_secs, self.learning.timeout_secs
            )));
        }
        Ok(())
    }
}

/// Path of `.tenet/config.toml` for a project.
pub fn config_path(project_root: &Path) -> PathBuf {
    project_root.join(TENET_DIR).join(CONFIG_FILE)
}

/// Path of the pattern store database for a project.
pub fn store_path(project_root: &Path) -> PathBuf {
    project_root.join(TENET_DIR).join(STORE_FILE)
}

/// Location of the process-wide registry database.
///
/// `$TENET_HOME/registry.db`, else `$HOME/.tenet/registry.db`.
pub fn default_registry_path() -> Option<PathBuf> {
    if let Some(home) = std::env::var_os("TENET_HOME") {
        return Some(PathBuf::from(home).join("registry.db"));
    }
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(TENET_DIR).join("registry.db"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenetSection {
    pub version: String,
}

impl Default for TenetSection {
    fn default() -> Self {
        Self {
            version: "0.2.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternsSection {
    /// Patterns observed fewer times than this never produce violations.
    pub frequency_threshold: u64,
    /// EWMA weight of each new observation in a pattern's confidence.
    pub learning_rate: f64,
    /// Example snippets retained per pattern.
    pub max_examples: usize,
}

impl Default for PatternsSection {
    fn default() -> Self {
        Self {
            frequency_threshold: 5,
            learning_rate: 0.1,
            max_examples: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(clippy::struct_field_names)]
pub struct DetectionSection {
    pub severity_threshold: Severity,
    pub include_warnings: bool,
    pub include_suggestions: bool,
}

impl Default for DetectionSection {
    fn default() -> Self {
        Self {
            severity_threshold: Severity::Low,
            include_warnings: true,
            include_suggestions: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningSection {
    /// Overall budget for one learning run.
    pub timeout_secs: u64,
    /// A `processing` delta older than this is treated as abandoned.
    pub stale_after_secs: u64,
}

impl LearningSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LearningSection {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            stale_after_secs: 900,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSection {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a half-open trial.
    pub recovery_secs: u64,
    pub call_timeout_ms: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_secs: 30,
            call_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationSection {
    pub max_concurrency: usize,
    pub fetch_timeout_ms: u64,
}

impl Default for AggregationSection {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            fetch_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSection {
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            include_patterns: vec![
                "**/*.ts".into(),
                "**/*.tsx".into(),
                "**/*.js".into(),
                "**/*.jsx".into(),
                "**/*.py".into(),
                "**/*.rs".into(),
                "**/*.go".into(),
            ],
            exclude_patterns: vec![
                "**/node_modules/**".into(),
                "**/vendor/**".into(),
                "**/target/**".into(),
                "**/.git/**".into(),
                "**/dist/**".into(),
                "**/.tenet/**".into(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = TenetConfig::from_toml("").unwrap();
        assert_eq!(config.patterns.frequency_threshold, 5);
        assert_eq!(config.detection.severity_threshold, Severity::Low);
        assert_eq!(config.engine.failure_threshold, 5);
        assert_eq!(config.aggregation.max_concurrency, 4);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = TenetConfig::from_toml(
            "[patterns]\nfrequency_threshold = 10\nlearning_rate = 0.2\nmax_examples = 1\n\n[detection]\nseverity_threshold = \"medium\"\ninclude_warnings = true\ninclude_suggestions = false\n",
        )
        .unwrap();
        assert_eq!(config.patterns.frequency_threshold, 10);
        assert_eq!(config.detection.severity_threshold, Severity::Medium);
        assert!(!config.detection.include_suggestions);
        assert_eq!(config.learning.timeout_secs, 300);
    }

    #[test]
    fn invalid_learning_rate_is_rejected() {
        let err = TenetConfig::from_toml(
            "[patterns]\nfrequency_threshold = 5\nlearning_rate = 1.5\nmax_examples = 3\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn stale_window_must_outlast_run_budget() {
        for stale in [0, 120, 300] {
            let err = TenetConfig::from_toml(&format!(
                "[learning]\ntimeout_secs = 300\nstale_after_secs = {stale}\n"
            ))
            .unwrap_err();
            assert!(matches!(&err, ConfigError::Invalid(m) if m.contains("stale_after_secs")));
        }
        let config =
            TenetConfig::from_toml("[learning]\ntimeout_secs = 300\nstale_after_secs = 301\n")
                .unwrap();
        assert_eq!(config.learning.stale_after_secs, 301);
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = TenetConfig::from_toml("[patterns\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn default_config_roundtrips_through_toml() {
        let text = TenetConfig::default().to_toml().unwrap();
        let back = TenetConfig::from_toml(&text).unwrap();
        assert_eq!(back.scan.include_patterns.len(), 7);
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = TenetConfig::load(dir.path()).unwrap();
        assert_eq!(config.learning.stale_after_secs, 900);
    }
}
