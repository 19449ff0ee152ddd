// Pattern extraction: one file in, concepts and candidate observations out.

use tracing::{debug, instrument};

use crate::config::EngineSection;
use crate::engine::ResilientEngine;
use crate::error::InputError;
use crate::types::{Concept, Language, PatternObservation};

/// Everything extracted from one file.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub file_path: String,
    pub language: Language,
    pub concepts: Vec<Concept>,
    pub observations: Vec<PatternObservation>,
    /// Reduced-fidelity result from the fallback path.
    pub degraded: bool,
}

/// Thin adapter between raw file contents and the analysis engine.
#[derive(Debug)]
pub struct PatternExtractor {
    engine: ResilientEngine,
}

impl PatternExtractor {
    pub fn new(engine: ResilientEngine) -> Self {
        Self { engine }
    }

    pub fn lexical(config: &EngineSection) -> Self {
        Self::new(ResilientEngine::lexical(config))
    }

    pub fn engine(&self) -> &ResilientEngine {
        &self.engine
    }

    /// Extract one file. Unsupported extensions and non-UTF-8 contents are
    /// input errors; engine failures come back as a degraded extraction.
    #[instrument(skip_all, name = "extract", fields(file = %file_path))]
    pub async fn extract(
        &self,
        file_path: &str,
        contents: &[u8],
    ) -> crate::error::Result<Extraction> {
        let language = Language::from_path(file_path).ok_or_else(|| InputError::Malformed {
            path: file_path.to_string(),
            message: "unsupported language".into(),
        })?;
        let content = std::str::from_utf8(contents).map_err(|e| InputError::Malformed {
            path: file_path.to_string(),
            message: format!("not UTF-8: {e}"),
        })?;

        let output = self.engine.analyze(file_path, content, language).await;

        // Engines answer for the file they were given
        let observations: Vec<PatternObservation> = output
            .observations
            .into_iter()
            .filter(|o| o.file_path == file_path && o.language == language)
            .collect();
        let concepts: Vec<Concept> = output
            .concepts
            .into_iter()
            .filter(|c| c.file_path == file_path)
            .collect();

        debug!(
            concepts = concepts.len(),
            observations = observations.len(),
            degraded = output.degraded,
            "Extracted file"
        );
        Ok(Extraction {
            file_path: file_path.to_string(),
            language,
            concepts,
            observations,
            degraded: output.degraded,
        })
    }
}
