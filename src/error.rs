//! Error types for the synthesis pipeline.
//!
//! Per-signal and per-axiom problems are not errors at the run level; they
//! surface as tagged outcomes and report entries. The enums here cover the
//! conditions a caller has to branch on.

use thiserror::Error;

/// Errors returned by LLM and embedding providers.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The call did not finish within the configured timeout.
    #[error("Provider call timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Transport or HTTP-level failure.
    #[error("Provider HTTP error: {0}")]
    Http(String),

    /// The provider answered but the payload could not be used.
    #[error("Malformed provider response: {0}")]
    Malformed(String),

    /// The provider is not reachable or not configured.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// Provider configuration is incomplete (missing key, bad URL).
    #[error("Provider configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    /// Whether retrying the same call can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Http(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout { seconds: 0 }
        } else if e.is_connect() {
            Self::Unavailable(e.to_string())
        } else {
            Self::Http(e.to_string())
        }
    }
}

/// Errors raised by the principle store for a single ingestion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// The embedding has zero magnitude and cannot be normalized.
    #[error("Zero-magnitude embedding for signal {signal_id}")]
    ZeroMagnitude { signal_id: String },

    /// The embedding length differs from the store's established dimension.
    #[error(
        "Embedding dimension mismatch for signal {signal_id}: expected {expected}, got {actual}"
    )]
    DimensionMismatch {
        signal_id: String,
        expected: usize,
        actual: usize,
    },

    /// The embedding contains no components.
    #[error("Empty embedding for signal {signal_id}")]
    EmptyEmbedding { signal_id: String },

    /// The embedding contains NaN or infinite components.
    #[error("Non-finite embedding component for signal {signal_id}")]
    NonFinite { signal_id: String },
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A value is out of range or inconsistent with another value.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Run-aborting errors.
///
/// Only conditions that make any output meaningless end up here: total
/// provider unavailability and invalid configuration.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// No provider call succeeded at all; nothing could be clustered.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The synthesis configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
