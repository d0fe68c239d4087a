//! # neon-soul
//!
//! Reflective signal clustering and axiom promotion.
//!
//! Raw text becomes signals, signals are generalized by an LLM and embedded,
//! embeddings are clustered online into principles, and principles with
//! enough diverse evidence are promoted to a capped set of tiered axioms.
//! Refinement repeats the promotion over the static principle set until the
//! axiom set stops moving.
//!
//! ```text
//! SourceDocument -> Signal -> GeneralizedSignal -> Principle -> Axiom
//!     extraction    generalizer   principle_store   compressor
//!                   \_______________ reflection ______________/
//! ```

pub mod compressor;
pub mod config;
pub mod error;
pub mod extraction;
pub mod generalizer;
pub mod principle_store;
pub mod providers;
pub mod reflection;
pub mod session;
pub mod types;
pub mod vector;

pub use config::SynthesisConfig;
pub use error::{ConfigError, ProviderError, StoreError, SynthesisError};
pub use extraction::{SignalExtractor, UnclassifiedPolicy};
pub use principle_store::PrincipleStore;
pub use providers::{Classification, EmbeddingProvider, LlmProvider, OpenAiCompatibleProvider};
pub use reflection::{ReflectiveLoop, SynthesisResult};
pub use session::SynthesisSession;
pub use types::{Axiom, AxiomTier, Principle, Signal, SourceDocument, SourceType};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
