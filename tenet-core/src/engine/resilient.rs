use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::EngineSection;
use crate::error::{ExtractError, TenetError};
use crate::types::{Concept, Language, PatternObservation};

use super::{AnalysisEngine, CircuitBreaker, CircuitState, LexicalEngine};

/// What one resilient engine call produced.
#[derive(Debug, Clone, Default)]
pub struct EngineOutput {
    pub concepts: Vec<Concept>,
    pub observations: Vec<PatternObservation>,
    /// Produced by the naming-only fallback rather than the engine.
    pub degraded: bool,
}

/// Timeout + circuit breaker around an [`AnalysisEngine`].
///
/// Engine failures never surface as errors: the call is answered by the
/// lexical naming scan and the output is flagged `degraded`.
pub struct ResilientEngine {
    primary: Arc<dyn AnalysisEngine>,
    breaker: CircuitBreaker,
    call_timeout: Duration,
}

impl std::fmt::Debug for ResilientEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientEngine")
            .field("primary", &self.primary.name())
            .field("breaker", &self.breaker)
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl ResilientEngine {
    pub fn new(primary: Arc<dyn AnalysisEngine>, config: &EngineSection) -> Self {
        Self {
            primary,
            breaker: CircuitBreaker::new(
                config.failure_threshold,
                Duration::from_secs(config.recovery_secs),
            ),
            call_timeout: Duration::from_millis(config.call_timeout_ms),
        }
    }

    /// The built-in lexical engine as primary.
    pub fn lexical(config: &EngineSection) -> Self {
        Self::new(Arc::new(LexicalEngine), config)
    }

    pub fn with_breaker(
        primary: Arc<dyn AnalysisEngine>,
        breaker: CircuitBreaker,
        call_timeout: Duration,
    ) -> Self {
        Self {
            primary,
            breaker,
            call_timeout,
        }
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub async fn analyze(&self, file_path: &str, content: &str, language: Language) -> EngineOutput {
        if let Err(e) = self.breaker.acquire() {
            debug!(file = %file_path, error = %e, "Engine call short-circuited");
            return Self::fallback(file_path, content, language);
        }

        match self.call_primary(file_path, content, language).await {
            Ok((concepts, observations)) => {
                self.breaker.record_success();
                EngineOutput {
                    concepts,
                    observations,
                    degraded: false,
                }
            }
            Err(e) => {
                self.breaker.record_failure();
                warn!(
                    file = %file_path,
                    engine = self.primary.name(),
                    error = %e,
                    "Engine failed, using degraded extraction"
                );
                Self::fallback(file_path, content, language)
            }
        }
    }

    async fn call_primary(
        &self,
        file_path: &str,
        content: &str,
        language: Language,
    ) -> crate::error::Result<(Vec<Concept>, Vec<PatternObservation>)> {
        let work = async {
            let concepts = self
                .primary
                .extract_concepts(file_path, content, language)
                .await?;
            let observations = self
                .primary
                .extract_candidate_patterns(file_path, content, language)
                .await?;
            Ok::<_, TenetError>((concepts, observations))
        };
        let timeout_ms = u64::try_from(self.call_timeout.as_millis()).unwrap_or(u64::MAX);
        tokio::time::timeout(self.call_timeout, work)
            .await
            .map_err(|_| ExtractError::Timeout(timeout_ms))?
    }

    fn fallback(file_path: &str, content: &str, language: Language) -> EngineOutput {
        EngineOutput {
            concepts: LexicalEngine::concepts(file_path, content, language),
            observations: LexicalEngine::naming_observations(file_path, content, language),
            degraded: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::types::PatternCategory;

    struct FlakyEngine {
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl AnalysisEngine for FlakyEngine {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn extract_concepts(
            &self,
            file_path: &str,
            _content: &str,
            _language: Language,
        ) -> crate::error::Result<Vec<Concept>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ExtractError::Engine {
                    path: file_path.to_string(),
                    message: "engine crashed".into(),
                }
                .into());
            }
            Ok(Vec::new())
        }

        async fn extract_candidate_patterns(
            &self,
            _file_path: &str,
            _content: &str,
            _language: Language,
        ) -> crate::error::Result<Vec<PatternObservation>> {
            Ok(Vec::new())
        }
    }

    struct StuckEngine;

    #[async_trait::async_trait]
    impl AnalysisEngine for StuckEngine {
        fn name(&self) -> &'static str {
            "stuck"
        }

        async fn extract_concepts(
            &self,
            _file_path: &str,
            _content: &str,
            _language: Language,
        ) -> crate::error::Result<Vec<Concept>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }

        async fn extract_candidate_patterns(
            &self,
            _file_path: &str,
            _content: &str,
            _language: Language,
        ) -> crate::error::Result<Vec<PatternObservation>> {
            Ok(Vec::new())
        }
    }

    const SOURCE: &str = "const userName = 1;\ntry { a() } catch (e) { logger.error(e) }\n";

    #[tokio::test]
    async fn healthy_engine_is_not_degraded() {
        let engine = ResilientEngine::lexical(&EngineSection::default());
        let out = engine.analyze("src/a.ts", SOURCE, Language::TypeScript).await;
        assert!(!out.degraded);
        assert!(
            out.observations
                .iter()
                .any(|o| o.category() == PatternCategory::Implementation)
        );
    }

    #[tokio::test]
    async fn failures_degrade_and_trip_the_circuit() {
        let flaky = Arc::new(FlakyEngine {
            calls: AtomicU32::new(0),
            fail: true,
        });
        let engine = ResilientEngine::with_breaker(
            flaky.clone(),
            CircuitBreaker::new(2, Duration::from_secs(60)),
            Duration::from_secs(5),
        );

        for _ in 0..4 {
            let out = engine.analyze("src/a.ts", SOURCE, Language::TypeScript).await;
            assert!(out.degraded);
            assert!(!out.observations.is_empty());
            assert!(
                out.observations
                    .iter()
                    .all(|o| o.category() == PatternCategory::Naming)
            );
        }
        assert_eq!(engine.circuit_state(), CircuitState::Open);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2, "open circuit fails fast");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_engine_times_out_into_fallback() {
        let engine = ResilientEngine::with_breaker(
            Arc::new(StuckEngine),
            CircuitBreaker::new(5, Duration::from_secs(60)),
            Duration::from_millis(100),
        );
        let out = engine.analyze("src/a.ts", SOURCE, Language::TypeScript).await;
        assert!(out.degraded);
        assert_eq!(engine.circuit_state(), CircuitState::Closed);
    }
}
