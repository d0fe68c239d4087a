//! Synthesis sessions.
//!
//! A session owns the providers, the validated configuration, the
//! generalization cache and the usage counters. The cache lives exactly as
//! long as the session unless [`SynthesisSession::clear_cache`] is called,
//! so independent sessions never share generalizations.

use std::sync::Arc;

use crate::config::SynthesisConfig;
use crate::error::SynthesisError;
use crate::extraction::{ExtractionReport, SignalExtractor, UnclassifiedPolicy};
use crate::generalizer::GeneralizationCache;
use crate::providers::{EmbeddingProvider, LlmProvider};
use crate::reflection::{ReflectiveLoop, SynthesisResult};
use crate::types::{Signal, SourceDocument, UsageMetrics, UsageTracker};

/// Entry point for running synthesis.
#[derive(Debug)]
pub struct SynthesisSession {
    llm: Arc<dyn LlmProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: SynthesisConfig,
    cache: GeneralizationCache,
    usage: UsageTracker,
    unclassified_policy: UnclassifiedPolicy,
}

impl SynthesisSession {
    /// Create a session after validating `config`.
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: SynthesisConfig,
    ) -> Result<Self, SynthesisError> {
        config.validate()?;
        Ok(Self {
            cache: GeneralizationCache::new(config.cache_capacity),
            llm,
            embedder,
            config,
            usage: UsageTracker::new(),
            unclassified_policy: UnclassifiedPolicy::default(),
        })
    }

    /// Policy for statements the dimension classifier cannot place.
    pub fn with_unclassified_policy(mut self, policy: UnclassifiedPolicy) -> Self {
        self.unclassified_policy = policy;
        self
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Run the reflective loop over already-extracted signals.
    pub async fn run(&self, signals: &[Arc<Signal>]) -> Result<SynthesisResult, SynthesisError> {
        ReflectiveLoop::new(
            self.llm.as_ref(),
            self.embedder.as_ref(),
            &self.cache,
            &self.config,
            &self.usage,
        )
        .run(signals)
        .await
    }

    /// Extract signals from raw documents.
    pub async fn extract(&self, sources: &[SourceDocument]) -> ExtractionReport {
        SignalExtractor::new(&self.config)
            .with_classifier(self.llm.as_ref())
            .with_policy(self.unclassified_policy)
            .extract(sources)
            .await
    }

    /// Extract, then run.
    pub async fn synthesize(
        &self,
        sources: &[SourceDocument],
    ) -> Result<SynthesisResult, SynthesisError> {
        let report = self.extract(sources).await;
        self.run(&report.signals).await
    }

    /// Drop every cached generalization.
    pub fn clear_cache(&self) {
        log::debug!("Clearing {} cached generalizations", self.cache.len());
        self.cache.clear();
    }

    pub fn cached_generalizations(&self) -> usize {
        self.cache.len()
    }

    pub fn usage(&self) -> UsageMetrics {
        self.usage.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::{KeywordEmbedder, ScriptedLlm};
    use crate::types::{Dimension, SourceType};

    fn session(config: SynthesisConfig) -> Result<SynthesisSession, SynthesisError> {
        SynthesisSession::new(
            Arc::new(ScriptedLlm::echo()),
            Arc::new(KeywordEmbedder::new(vec![
                vec!["truth", "honest"],
                vec!["short", "brief"],
            ])),
            config,
        )
    }

    fn documents() -> Vec<SourceDocument> {
        vec![
            SourceDocument::new(
                "memory/2024-05.md",
                SourceType::Memory,
                "- Tell the truth even when awkward\n\
                 - Keep answers short\n\
                 - State the truth plainly",
            )
            .with_dimension_hint(Dimension::HonestyFramework),
            SourceDocument::new(
                "interviews/alex.md",
                SourceType::Interview,
                "Stay honest about uncertainty\n\
                 Brief replies respect attention\n\
                 Prefer short paragraphs",
            )
            .with_dimension_hint(Dimension::VoicePresence),
        ]
    }

    #[test]
    fn test_rejects_invalid_config() {
        let err = session(SynthesisConfig {
            max_iterations: 0,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, SynthesisError::Config(_)));
    }

    #[tokio::test]
    async fn test_synthesize_end_to_end() {
        let session = session(SynthesisConfig::default()).unwrap();
        let result = session.synthesize(&documents()).await.unwrap();
        assert_eq!(result.principle_count, 2);
        assert_eq!(result.axioms.len(), 2);
        assert!(result.axioms.iter().all(|a| a.n_count == 3));
        for axiom in &result.axioms {
            assert!(axiom
                .provenance
                .signals
                .iter()
                .any(|s| s.source_path == "interviews/alex.md"));
        }
        assert!(!result.cascade.minimum_met);
    }

    #[tokio::test]
    async fn test_restated_memory_line_counts_as_external_evidence() {
        let session = session(SynthesisConfig::default()).unwrap();
        let docs = vec![
            SourceDocument::new(
                "memory/2024-06.md",
                SourceType::Memory,
                "Tell the truth plainly\n\
                 Truth matters more than comfort\n\
                 Say the truth when awkward",
            )
            .with_dimension_hint(Dimension::HonestyFramework),
            SourceDocument::new(
                "interviews/sam.md",
                SourceType::Interview,
                "Tell the truth plainly",
            )
            .with_dimension_hint(Dimension::HonestyFramework),
        ];

        let report = session.extract(&docs).await;
        assert_eq!(report.signals.len(), 4);
        assert_eq!(report.duplicates, 0);

        let result = session.run(&report.signals).await.unwrap();
        assert!(result.rejections.is_empty());
        assert_eq!(result.axioms.len(), 1);
        assert_eq!(result.axioms[0].n_count, 4);
    }

    #[tokio::test]
    async fn test_cache_is_session_scoped_and_clearable() {
        let first = session(SynthesisConfig::default()).unwrap();
        first.synthesize(&documents()).await.unwrap();
        assert_eq!(first.cached_generalizations(), 6);

        let second = session(SynthesisConfig::default()).unwrap();
        assert_eq!(second.cached_generalizations(), 0);

        first.synthesize(&documents()).await.unwrap();
        assert!(first.usage().cache_hits >= 6);

        first.clear_cache();
        assert_eq!(first.cached_generalizations(), 0);
    }
}
