//! Synthesis configuration.
//!
//! Every field has a default so a YAML file only needs to name what it
//! changes. Values can additionally be overridden from `NEON_SOUL_*`
//! environment variables.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::AxiomTier;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "NEON_SOUL_";

/// One level of the promotion cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeTier {
    /// Minimum N-count a principle needs at this level.
    pub min_n_count: usize,
    /// Label given to axioms whose N-count first satisfies this level.
    pub tier: AxiomTier,
}

fn default_cascade() -> Vec<CascadeTier> {
    vec![
        CascadeTier { min_n_count: 3, tier: AxiomTier::Core },
        CascadeTier { min_n_count: 2, tier: AxiomTier::Domain },
        CascadeTier { min_n_count: 1, tier: AxiomTier::Emerging },
    ]
}

/// Policy values for one synthesis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Similarity a signal needs to reinforce an existing principle.
    pub similarity_threshold: f32,
    /// Amount the threshold tightens per refinement iteration.
    pub threshold_step: f32,
    /// Upper bound for the tightened threshold.
    pub threshold_ceiling: f32,
    /// Axiom count below which the cascade loosens the N-count floor.
    pub min_viable_axioms: usize,
    /// Cascade levels, strictest first.
    pub cascade_tiers: Vec<CascadeTier>,
    /// Cognitive-load cap on the final axiom set.
    pub max_axioms: usize,
    /// Hard cap on refinement iterations.
    pub max_iterations: usize,
    /// Cosine similarity between successive axiom-set embeddings that
    /// counts as converged.
    pub convergence_threshold: f32,
    /// Corrective retries after a rejected generalization.
    pub max_generalization_retries: u32,
    /// Per-call timeout for LLM and embedding requests.
    pub llm_timeout_secs: u64,
    /// Retries for a provider call that timed out or failed transiently.
    pub provider_retries: u32,
    /// Parallel generalization requests.
    pub generalization_concurrency: usize,
    /// Parallel notation requests.
    pub notation_concurrency: usize,
    /// Maximum length (in characters) of a generalized statement.
    pub max_generalized_length: usize,
    /// Maximum entries held by the generalization cache.
    pub cache_capacity: usize,
    /// Version tag of the generalization prompt, part of the cache key.
    pub prompt_version: String,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            threshold_step: 0.02,
            threshold_ceiling: 0.95,
            min_viable_axioms: 3,
            cascade_tiers: default_cascade(),
            max_axioms: 25,
            max_iterations: 5,
            convergence_threshold: 0.98,
            max_generalization_retries: 1,
            llm_timeout_secs: 30,
            provider_retries: 1,
            generalization_concurrency: 8,
            notation_concurrency: 4,
            max_generalized_length: 150,
            cache_capacity: 4096,
            prompt_version: "v1".to_string(),
        }
    }
}

impl SynthesisConfig {
    /// Load from a YAML file, then validate.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_yaml_str(&raw)?;
        Ok(config)
    }

    /// Parse from a YAML string, then validate.
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `NEON_SOUL_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(std::env::vars())
    }

    /// Apply overrides from `(KEY, value)` pairs. Keys without the
    /// [`ENV_PREFIX`] or naming an unknown field are ignored.
    pub fn with_overrides<I, K, V>(mut self, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(field) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref();
            match field {
                "SIMILARITY_THRESHOLD" => self.similarity_threshold = parse(field, value)?,
                "THRESHOLD_STEP" => self.threshold_step = parse(field, value)?,
                "THRESHOLD_CEILING" => self.threshold_ceiling = parse(field, value)?,
                "MIN_VIABLE_AXIOMS" => self.min_viable_axioms = parse(field, value)?,
                "MAX_AXIOMS" => self.max_axioms = parse(field, value)?,
                "MAX_ITERATIONS" => self.max_iterations = parse(field, value)?,
                "CONVERGENCE_THRESHOLD" => self.convergence_threshold = parse(field, value)?,
                "MAX_GENERALIZATION_RETRIES" => {
                    self.max_generalization_retries = parse(field, value)?
                }
                "LLM_TIMEOUT_SECS" => self.llm_timeout_secs = parse(field, value)?,
                "PROVIDER_RETRIES" => self.provider_retries = parse(field, value)?,
                "GENERALIZATION_CONCURRENCY" => {
                    self.generalization_concurrency = parse(field, value)?
                }
                "NOTATION_CONCURRENCY" => self.notation_concurrency = parse(field, value)?,
                "MAX_GENERALIZED_LENGTH" => self.max_generalized_length = parse(field, value)?,
                "CACHE_CAPACITY" => self.cache_capacity = parse(field, value)?,
                "PROMPT_VERSION" => self.prompt_version = value.to_string(),
                _ => log::debug!("Ignoring unknown override {}{}", ENV_PREFIX, field),
            }
        }
        self.validate()?;
        Ok(self)
    }

    /// Check ranges and cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("similarity_threshold", self.similarity_threshold),
            ("threshold_ceiling", self.threshold_ceiling),
            ("convergence_threshold", self.convergence_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(invalid(format!("{} must be in (0, 1], got {}", name, value)));
            }
        }
        if self.threshold_step < 0.0 {
            return Err(invalid("threshold_step must not be negative".to_string()));
        }
        if self.threshold_ceiling < self.similarity_threshold {
            return Err(invalid(format!(
                "threshold_ceiling {} is below similarity_threshold {}",
                self.threshold_ceiling, self.similarity_threshold
            )));
        }
        if self.cascade_tiers.is_empty() {
            return Err(invalid("cascade_tiers must not be empty".to_string()));
        }
        if self.cascade_tiers.iter().any(|t| t.min_n_count == 0) {
            return Err(invalid("cascade floors must be at least 1".to_string()));
        }
        if self
            .cascade_tiers
            .windows(2)
            .any(|w| w[1].min_n_count >= w[0].min_n_count)
        {
            return Err(invalid(
                "cascade_tiers must be ordered strictly from strictest to loosest".to_string(),
            ));
        }
        if self.max_axioms < self.min_viable_axioms {
            return Err(invalid(format!(
                "max_axioms {} is below min_viable_axioms {}",
                self.max_axioms, self.min_viable_axioms
            )));
        }
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations must be at least 1".to_string()));
        }
        if self.generalization_concurrency == 0 || self.notation_concurrency == 0 {
            return Err(invalid("concurrency limits must be at least 1".to_string()));
        }
        if self.max_generalized_length == 0 {
            return Err(invalid("max_generalized_length must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Threshold in effect for a 1-based refinement iteration.
    pub fn threshold_for_iteration(&self, iteration: usize) -> f32 {
        let steps = iteration.saturating_sub(1) as f32;
        (self.similarity_threshold + self.threshold_step * steps).min(self.threshold_ceiling)
    }

    /// Tier label for an N-count: the strictest cascade level it satisfies.
    pub fn tier_for(&self, n_count: usize) -> AxiomTier {
        self.cascade_tiers
            .iter()
            .find(|t| n_count >= t.min_n_count)
            .or_else(|| self.cascade_tiers.last())
            .map(|t| t.tier)
            .unwrap_or(AxiomTier::Emerging)
    }
}

fn parse<T: FromStr>(field: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(format!("{}{}: cannot parse '{}'", ENV_PREFIX, field, value)))
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid(message)
}
