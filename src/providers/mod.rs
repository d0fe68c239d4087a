//! Provider abstractions for LLM and embedding backends.
//!
//! The pipeline only ever talks to [`LlmProvider`] and [`EmbeddingProvider`]
//! trait objects. Concrete backends live in submodules.

pub mod openai;
#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

pub use openai::OpenAiCompatibleProvider;

// ---------------------------------------------------------------------------
// Classification result
// ---------------------------------------------------------------------------

/// Outcome of asking an LLM to pick one of a fixed set of categories.
///
/// A response that names no listed category is `Unmatched`; callers decide
/// per call site what that means. Confidence is only present when the model
/// reported one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Classification {
    Matched {
        category: String,
        confidence: Option<f32>,
    },
    Unmatched,
}

impl Classification {
    pub fn category(&self) -> Option<&str> {
        match self {
            Self::Matched { category, .. } => Some(category),
            Self::Unmatched => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Provider traits
// ---------------------------------------------------------------------------

/// Text-to-vector provider.
///
/// Implementations must be deterministic for identical input within a
/// session and return unit or near-unit vectors. Failures are errors, never
/// zero vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + fmt::Debug {
    /// Model identifier.
    fn model(&self) -> &str;

    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

/// Text-generation provider.
#[async_trait]
pub trait LlmProvider: Send + Sync + fmt::Debug {
    /// Model identifier.
    fn model(&self) -> &str;

    /// Generate a completion for a single-turn prompt.
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Classify `prompt` into one of `categories`.
    ///
    /// The default implementation asks for a JSON answer through
    /// [`generate`](Self::generate) and parses it with
    /// [`parse_classification`].
    async fn classify(
        &self,
        prompt: &str,
        categories: &[&str],
    ) -> Result<Classification, ProviderError> {
        let full = build_classification_prompt(prompt, categories);
        let raw = self.generate(&full).await?;
        Ok(parse_classification(&raw, categories))
    }
}

// ---------------------------------------------------------------------------
// Classification helpers
// ---------------------------------------------------------------------------

/// Build the prompt used by the default `classify` implementation.
pub fn build_classification_prompt(prompt: &str, categories: &[&str]) -> String {
    format!(
        "{}\n\nChoose exactly one category from this list: {}.\n\
         If none applies, answer with category null.\n\
         Respond ONLY with JSON: {{\"category\": \"<category or null>\", \"confidence\": <0.0-1.0>}}",
        prompt,
        categories.join(", ")
    )
}

#[derive(Deserialize)]
struct RawClassification {
    category: Option<String>,
    confidence: Option<f32>,
}

fn canonical_category<'a>(candidate: &str, categories: &[&'a str]) -> Option<&'a str> {
    let norm = candidate
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c == '`')
        .to_lowercase();
    categories
        .iter()
        .copied()
        .find(|c| c.to_lowercase() == norm)
}

/// Parse an LLM classification answer.
///
/// Accepts the JSON shape requested by [`build_classification_prompt`]
/// (possibly wrapped in prose or a code fence) or a bare category name.
/// Anything else, including a JSON category outside the list, is
/// [`Classification::Unmatched`].
pub fn parse_classification(raw: &str, categories: &[&str]) -> Classification {
    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if start < end {
            if let Ok(parsed) = serde_json::from_str::<RawClassification>(&raw[start..=end]) {
                return match parsed
                    .category
                    .as_deref()
                    .and_then(|c| canonical_category(c, categories))
                {
                    Some(category) => Classification::Matched {
                        category: category.to_string(),
                        confidence: parsed.confidence.map(|c| c.clamp(0.0, 1.0)),
                    },
                    None => Classification::Unmatched,
                };
            }
        }
    }
    match canonical_category(raw, categories) {
        Some(category) => Classification::Matched {
            category: category.to_string(),
            confidence: None,
        },
        None => Classification::Unmatched,
    }
}

// ---------------------------------------------------------------------------
// Timeout and retry
// ---------------------------------------------------------------------------

/// Run a provider call under a timeout with a bounded number of retries.
///
/// Non-retryable errors return immediately. Retries back off 100ms, 200ms,
/// 400ms, ...
pub async fn call_with_retry<T, F, Fut>(
    timeout: Duration,
    retries: u32,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut last_error = ProviderError::Unavailable("no attempt made".to_string());

    for attempt in 0..=retries {
        if attempt > 0 {
            let wait = Duration::from_millis(100 * 2u64.pow(attempt - 1));
            log::debug!("Provider retry {} after {:?}: {}", attempt, wait, last_error);
            tokio::time::sleep(wait).await;
        }
        match tokio::time::timeout(timeout, operation()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) if !e.is_retryable() => return Err(e),
            Ok(Err(e)) => last_error = e,
            Err(_) => {
                last_error = ProviderError::Timeout {
                    seconds: timeout.as_secs(),
                }
            }
        }
    }

    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const CATEGORIES: &[&str] = &["identity-core", "honesty-framework", "voice-presence"];

    #[test]
    fn test_parse_json_classification() {
        let result = parse_classification(
            "Sure:\n```json\n{\"category\": \"Honesty-Framework\", \"confidence\": 0.82}\n```",
            CATEGORIES,
        );
        assert_eq!(
            result,
            Classification::Matched {
                category: "honesty-framework".to_string(),
                confidence: Some(0.82),
            }
        );
    }

    #[test]
    fn test_parse_null_category_is_unmatched() {
        let result = parse_classification("{\"category\": null, \"confidence\": 0.1}", CATEGORIES);
        assert_eq!(result, Classification::Unmatched);
    }

    #[test]
    fn test_parse_unknown_category_is_unmatched() {
        let result =
            parse_classification("{\"category\": \"humor\", \"confidence\": 0.9}", CATEGORIES);
        assert_eq!(result, Classification::Unmatched);
        assert_eq!(result.category(), None);
    }

    #[test]
    fn test_parse_bare_category_has_no_confidence() {
        let result = parse_classification("voice-presence.", CATEGORIES);
        assert_eq!(
            result,
            Classification::Matched {
                category: "voice-presence".to_string(),
                confidence: None,
            }
        );
    }

    #[test]
    fn test_parse_prose_is_unmatched() {
        assert_eq!(
            parse_classification("It is hard to say, maybe identity?", CATEGORIES),
            Classification::Unmatched
        );
    }

    #[tokio::test]
    async fn test_retry_stops_on_non_retryable() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = call_with_retry(Duration::from_secs(1), 3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::Malformed("bad".into())) }
        })
        .await;
        assert!(matches!(result, Err(ProviderError::Malformed(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_error() {
        let calls = AtomicU32::new(0);
        let result = call_with_retry(Duration::from_secs(1), 2, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(ProviderError::Http("503".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let result: Result<(), _> = call_with_retry(Duration::from_millis(10), 0, || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(ProviderError::Timeout { .. })));
    }
}
