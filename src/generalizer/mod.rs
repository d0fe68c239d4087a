//! Signal generalization.
//!
//! Rewrites each signal into a canonical, pronoun-free imperative via the
//! LLM, validates the rewrite, retries once with feedback, and falls back to
//! the original text when the LLM cannot produce a valid answer. The chosen
//! text is then embedded. Output is one [`GeneralizationOutcome`] per input,
//! in input order.

pub mod cache;
pub mod prompt;
pub mod validation;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};

use crate::config::SynthesisConfig;
use crate::providers::{call_with_retry, EmbeddingProvider, LlmProvider};
use crate::types::{
    GeneralizationOutcome, GeneralizationProvenance, GeneralizedSignal, Signal, UsageTracker,
};

pub use cache::{CachedGeneralization, GeneralizationCache};

/// Result of the rewrite step before embedding.
#[derive(Debug, Clone, PartialEq)]
enum Rewrite {
    Accepted { text: String, attempts: u32 },
    Rejected { reason: String, attempts: u32 },
}

/// Generalizes batches of signals.
///
/// Borrows the session's providers, cache and usage counters for the
/// duration of a batch.
pub struct SignalGeneralizer<'a> {
    llm: &'a dyn LlmProvider,
    embedder: &'a dyn EmbeddingProvider,
    cache: &'a GeneralizationCache,
    config: &'a SynthesisConfig,
    usage: &'a UsageTracker,
}

impl<'a> SignalGeneralizer<'a> {
    pub fn new(
        llm: &'a dyn LlmProvider,
        embedder: &'a dyn EmbeddingProvider,
        cache: &'a GeneralizationCache,
        config: &'a SynthesisConfig,
        usage: &'a UsageTracker,
    ) -> Self {
        Self {
            llm,
            embedder,
            cache,
            config,
            usage,
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.llm_timeout_secs)
    }

    /// Generalize a batch with bounded concurrency.
    ///
    /// Results come back in input order regardless of completion order.
    /// A failure on one signal never affects another.
    pub async fn generalize_batch(&self, signals: &[Arc<Signal>]) -> Vec<GeneralizationOutcome> {
        let outcomes: Vec<GeneralizationOutcome> = stream::iter(signals.iter().cloned())
            .map(|signal| self.generalize_one(signal))
            .buffered(self.config.generalization_concurrency)
            .collect()
            .await;

        let fallbacks = outcomes.iter().filter(|o| o.is_fallback()).count();
        let failed = outcomes.iter().filter(|o| o.is_failed()).count();
        log::info!(
            "Generalized {} signals ({} fallback, {} failed)",
            outcomes.len(),
            fallbacks,
            failed
        );
        outcomes
    }

    /// Generalize and embed one signal.
    pub async fn generalize_one(&self, signal: Arc<Signal>) -> GeneralizationOutcome {
        let key = GeneralizationCache::key(&signal, &self.config.prompt_version);
        if let Some(hit) = self.cache.get(&key) {
            self.usage.record_cache(true);
            log::debug!("Generalization cache hit for signal {}", signal.id());
            return GeneralizationOutcome::Generalized(GeneralizedSignal {
                signal,
                text: hit.text,
                embedding: hit.embedding,
                provenance: hit.provenance,
            });
        }
        self.usage.record_cache(false);

        let (text, attempts, fallback_reason) = match self.rewrite(&signal).await {
            Rewrite::Accepted { text, attempts } => (text, attempts, None),
            Rewrite::Rejected { reason, attempts } => {
                log::warn!(
                    "Generalization failed for signal {}: {}; using original text",
                    signal.id(),
                    reason
                );
                self.usage.record_fallback();
                (signal.text().to_string(), attempts, Some(reason))
            }
        };

        self.usage.record_embedding_request();
        let embedding = match call_with_retry(self.timeout(), self.config.provider_retries, || {
            self.embedder.embed(&text)
        })
        .await
        {
            Ok(embedding) => embedding,
            Err(e) => {
                self.usage.record_failure();
                log::warn!("Embedding failed for signal {}: {}", signal.id(), e);
                return GeneralizationOutcome::Failed {
                    signal_id: signal.id().clone(),
                    signal,
                    reason: format!("embedding failed: {}", e),
                };
            }
        };

        let used_fallback = fallback_reason.is_some();
        let provenance = GeneralizationProvenance {
            model: self.llm.model().to_string(),
            prompt_version: self.config.prompt_version.clone(),
            generated_at: Utc::now(),
            confidence: if used_fallback { 0.0 } else { 1.0 / attempts.max(1) as f32 },
            attempts,
            used_fallback,
        };
        let record = GeneralizedSignal {
            signal,
            text,
            embedding,
            provenance,
        };

        match fallback_reason {
            Some(reason) => GeneralizationOutcome::Fallback { record, reason },
            None => {
                self.cache.insert(
                    key,
                    CachedGeneralization {
                        text: record.text.clone(),
                        embedding: record.embedding.clone(),
                        provenance: record.provenance.clone(),
                    },
                );
                GeneralizationOutcome::Generalized(record)
            }
        }
    }

    /// Ask the LLM for a rewrite, retrying with feedback on validation
    /// failure. Provider errors end the attempt immediately.
    async fn rewrite(&self, signal: &Signal) -> Rewrite {
        let base_prompt = prompt::build_generalization_prompt(signal, &self.config.prompt_version);
        let mut current = base_prompt.clone();
        let max_attempts = 1 + self.config.max_generalization_retries;
        let mut last_problem = String::new();

        for attempt in 1..=max_attempts {
            self.usage.record_llm_request();
            let raw = match call_with_retry(self.timeout(), self.config.provider_retries, || {
                self.llm.generate(&current)
            })
            .await
            {
                Ok(raw) => raw,
                Err(e) => {
                    self.usage.record_failure();
                    return Rewrite::Rejected {
                        reason: format!("LLM error: {}", e),
                        attempts: attempt,
                    };
                }
            };

            let cleaned = prompt::clean_response(&raw);
            let max_len = self.config.max_generalized_length;
            match validation::validate_generalization(&cleaned, max_len) {
                Ok(()) => {
                    return Rewrite::Accepted {
                        text: cleaned,
                        attempts: attempt,
                    }
                }
                Err(violation) => {
                    log::debug!(
                        "Rejected generalization for signal {} (attempt {}): {}",
                        signal.id(),
                        attempt,
                        violation
                    );
                    last_problem = violation.to_string();
                    current = prompt::build_retry_prompt(&base_prompt, &cleaned, &last_problem);
                }
            }
        }

        Rewrite::Rejected {
            reason: format!("validation failed: {}", last_problem),
            attempts: max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::{
        data_section, KeywordEmbedder, ScriptedLlm, UnreachableEmbedder,
    };
    use crate::types::{SignalSource, SourceType};

    fn signals(texts: &[&str]) -> Vec<Arc<Signal>> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                Arc::new(Signal::new(
                    format!("s{}", i),
                    *t,
                    SignalSource::new("memory.md", SourceType::Memory),
                ))
            })
            .collect()
    }

    fn embedder() -> KeywordEmbedder {
        KeywordEmbedder::new(vec![vec!["honest", "truth"], vec!["brief", "short"]])
    }

    /// Strips a leading "I " and capitalizes, the way a well-behaved model would.
    fn rewriting_llm() -> ScriptedLlm {
        ScriptedLlm::new(|prompt| {
            let data = data_section(prompt).unwrap_or_default();
            let stripped = data.strip_prefix("I ").unwrap_or(data);
            let mut chars = stripped.chars();
            Ok(match chars.next() {
                Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            })
        })
    }

    #[tokio::test]
    async fn test_batch_preserves_order_and_cardinality() {
        let llm = rewriting_llm();
        let emb = embedder();
        let cache = GeneralizationCache::new(16);
        let config = SynthesisConfig {
            generalization_concurrency: 3,
            ..Default::default()
        };
        let usage = UsageTracker::new();
        let g = SignalGeneralizer::new(&llm, &emb, &cache, &config, &usage);

        let input = signals(&[
            "I value truth",
            "I keep replies short",
            "I tell hard truths",
            "Other",
        ]);
        let out = g.generalize_batch(&input).await;
        assert_eq!(out.len(), 4);
        for (o, s) in out.iter().zip(input.iter()) {
            assert_eq!(o.signal_id(), s.id());
        }
        assert_eq!(out[0].record().unwrap().text, "Value truth");
        assert!(!out[0].record().unwrap().used_fallback());
    }

    #[tokio::test]
    async fn test_retry_with_feedback_then_accept() {
        let llm = ScriptedLlm::new(|prompt| {
            if prompt.contains("previous answer was rejected") {
                Ok("Tell the truth".to_string())
            } else {
                Ok("You should tell the truth".to_string())
            }
        });
        let emb = embedder();
        let cache = GeneralizationCache::new(16);
        let config = SynthesisConfig::default();
        let usage = UsageTracker::new();
        let g = SignalGeneralizer::new(&llm, &emb, &cache, &config, &usage);

        let out = g.generalize_one(signals(&["I tell the truth"])[0].clone()).await;
        let record = out.record().unwrap();
        assert_eq!(record.text, "Tell the truth");
        assert_eq!(record.provenance.attempts, 2);
        assert!(!record.used_fallback());
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn test_persistent_pronoun_falls_back_to_original() {
        let llm = ScriptedLlm::new(|_| Ok("You must be honest".to_string()));
        let emb = embedder();
        let cache = GeneralizationCache::new(16);
        let config = SynthesisConfig::default();
        let usage = UsageTracker::new();
        let g = SignalGeneralizer::new(&llm, &emb, &cache, &config, &usage);

        let out = g.generalize_one(signals(&["I am honest"])[0].clone()).await;
        assert!(out.is_fallback());
        let record = out.record().unwrap();
        assert!(record.used_fallback());
        assert_eq!(record.text, "I am honest");
        assert_eq!(record.provenance.confidence, 0.0);
        assert_eq!(llm.calls(), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_llm_unavailable_falls_back_for_every_signal() {
        let llm = ScriptedLlm::unreachable();
        let emb = embedder();
        let cache = GeneralizationCache::new(16);
        let config = SynthesisConfig::default();
        let usage = UsageTracker::new();
        let g = SignalGeneralizer::new(&llm, &emb, &cache, &config, &usage);

        let input = signals(&["I value truth", "I keep replies short", "Other thing"]);
        let out = g.generalize_batch(&input).await;
        assert_eq!(out.len(), input.len());
        assert!(out.iter().all(|o| o.is_fallback()));
        assert!(out.iter().all(|o| o.record().unwrap().used_fallback()));
        assert_eq!(usage.snapshot().fallbacks, 3);
    }

    #[tokio::test]
    async fn test_embedding_failure_marks_only_that_signal() {
        let llm = ScriptedLlm::echo();
        let emb = embedder().failing_on("poison");
        let cache = GeneralizationCache::new(16);
        let config = SynthesisConfig::default();
        let usage = UsageTracker::new();
        let g = SignalGeneralizer::new(&llm, &emb, &cache, &config, &usage);

        let out = g
            .generalize_batch(&signals(&["Value truth", "Avoid poison pills", "Keep it short"]))
            .await;
        assert!(out[0].record().is_some());
        assert!(out[1].is_failed());
        assert!(out[2].record().is_some());
    }

    #[tokio::test]
    async fn test_unreachable_embedder_fails_every_signal() {
        let llm = ScriptedLlm::echo();
        let emb = UnreachableEmbedder;
        let cache = GeneralizationCache::new(16);
        let config = SynthesisConfig::default();
        let usage = UsageTracker::new();
        let g = SignalGeneralizer::new(&llm, &emb, &cache, &config, &usage);

        let out = g.generalize_batch(&signals(&["Value truth", "Keep it short"])).await;
        assert!(out.iter().all(|o| o.is_failed()));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_llm() {
        let llm = rewriting_llm();
        let emb = embedder();
        let cache = GeneralizationCache::new(16);
        let config = SynthesisConfig::default();
        let usage = UsageTracker::new();
        let g = SignalGeneralizer::new(&llm, &emb, &cache, &config, &usage);

        let s = signals(&["I value truth"]);
        g.generalize_one(s[0].clone()).await;
        g.generalize_one(s[0].clone()).await;
        assert_eq!(llm.calls(), 1);
        assert_eq!(emb.calls(), 1);
        assert_eq!(usage.snapshot().cache_hits, 1);
    }

    #[tokio::test]
    async fn test_changed_content_same_id_misses_cache() {
        let llm = rewriting_llm();
        let emb = embedder();
        let cache = GeneralizationCache::new(16);
        let config = SynthesisConfig::default();
        let usage = UsageTracker::new();
        let g = SignalGeneralizer::new(&llm, &emb, &cache, &config, &usage);

        let source = SignalSource::new("memory.md", SourceType::Memory);
        let before = Arc::new(Signal::new("same", "I value truth", source.clone()));
        let after = Arc::new(Signal::new("same", "I keep it short", source));

        let first = g.generalize_one(before).await;
        let second = g.generalize_one(after).await;
        assert_eq!(first.record().unwrap().text, "Value truth");
        assert_eq!(second.record().unwrap().text, "Keep it short");
        assert_eq!(llm.calls(), 2);
    }
}
