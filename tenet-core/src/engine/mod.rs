//! Analysis engine boundary.
//!
//! An [`AnalysisEngine`] turns one file into concepts and candidate pattern
//! observations. [`ResilientEngine`] wraps any engine with a per-call timeout
//! and a [`CircuitBreaker`], falling back to the lexical naming scan when the
//! engine fails or the circuit is open.

pub mod breaker;
pub mod lexical;
pub mod resilient;

pub use breaker::{CircuitBreaker, CircuitState};
pub use lexical::LexicalEngine;
pub use resilient::{EngineOutput, ResilientEngine};

use crate::types::{Concept, Language, PatternObservation};

/// Per-file source analysis. Implementations must be idempotent for
/// identical input.
#[async_trait::async_trait]
pub trait AnalysisEngine: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Named declarations in the file.
    async fn extract_concepts(
        &self,
        file_path: &str,
        content: &str,
        language: Language,
    ) -> crate::error::Result<Vec<Concept>>;

    /// Candidate observations for every pattern subject the engine knows.
    async fn extract_candidate_patterns(
        &self,
        file_path: &str,
        content: &str,
        language: Language,
    ) -> crate::error::Result<Vec<PatternObservation>>;
}
