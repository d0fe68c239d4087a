//! Deterministic providers for unit tests.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{EmbeddingProvider, LlmProvider};
use crate::error::ProviderError;
use crate::generalizer::prompt::{DATA_CLOSE, DATA_OPEN};

// ---------------------------------------------------------------------------
// Embedders
// ---------------------------------------------------------------------------

/// Embeds text onto one axis per keyword group, plus a catch-all axis.
///
/// Texts sharing a keyword group get identical vectors; texts from
/// different groups are orthogonal.
#[derive(Debug, Default)]
pub(crate) struct KeywordEmbedder {
    groups: Vec<Vec<&'static str>>,
    fail_on: Vec<&'static str>,
    zero_on: Vec<&'static str>,
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub(crate) fn new(groups: Vec<Vec<&'static str>>) -> Self {
        Self {
            groups,
            ..Default::default()
        }
    }

    /// Fail for any text containing `needle`.
    pub(crate) fn failing_on(mut self, needle: &'static str) -> Self {
        self.fail_on.push(needle);
        self
    }

    /// Return an all-zero vector for any text containing `needle`.
    pub(crate) fn zero_on(mut self, needle: &'static str) -> Self {
        self.zero_on.push(needle);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn vector_for(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut v = vec![0.0; self.groups.len() + 1];
        for (i, group) in self.groups.iter().enumerate() {
            if group.iter().any(|k| lower.contains(k)) {
                v[i] = 1.0;
            }
        }
        if v.iter().all(|x| *x == 0.0) {
            v[self.groups.len()] = 1.0;
        }
        crate::vector::normalize(&v).unwrap_or(v)
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model(&self) -> &str {
        "keyword-embedder"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lower = text.to_lowercase();
        if self.fail_on.iter().any(|n| lower.contains(n)) {
            return Err(ProviderError::Malformed(format!("cannot embed '{}'", text)));
        }
        if self.zero_on.iter().any(|n| lower.contains(n)) {
            return Ok(vec![0.0; self.groups.len() + 1]);
        }
        Ok(self.vector_for(text))
    }
}

/// Embedder that is never reachable.
#[derive(Debug, Default)]
pub(crate) struct UnreachableEmbedder;

#[async_trait]
impl EmbeddingProvider for UnreachableEmbedder {
    fn model(&self) -> &str {
        "unreachable"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Err(ProviderError::Unavailable("connection refused".to_string()))
    }
}

// ---------------------------------------------------------------------------
// LLMs
// ---------------------------------------------------------------------------

type Responder = Box<dyn Fn(&str) -> Result<String, ProviderError> + Send + Sync>;

/// LLM whose answers come from a closure over the prompt.
pub(crate) struct ScriptedLlm {
    responder: Responder,
    calls: AtomicUsize,
}

impl fmt::Debug for ScriptedLlm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedLlm")
            .field("calls", &self.calls())
            .finish()
    }
}

impl ScriptedLlm {
    pub(crate) fn new<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<String, ProviderError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
        }
    }

    /// Answers every prompt with the statement found between the data
    /// delimiters, unchanged.
    pub(crate) fn echo() -> Self {
        Self::new(|prompt| Ok(data_section(prompt).unwrap_or_default().to_string()))
    }

    /// Always unreachable.
    pub(crate) fn unreachable() -> Self {
        Self::new(|_| Err(ProviderError::Unavailable("connection refused".to_string())))
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.responder)(prompt)
    }
}

/// The first delimited data block of a prompt.
pub(crate) fn data_section(prompt: &str) -> Option<&str> {
    let start = prompt.find(DATA_OPEN)? + DATA_OPEN.len();
    let end = prompt[start..].find(DATA_CLOSE)? + start;
    Some(prompt[start..end].trim())
}
