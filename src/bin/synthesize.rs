//! neon-soul synthesis binary.
//!
//! Reads a JSON array of source documents, runs one synthesis session
//! against an OpenAI-compatible endpoint, and prints the result as JSON.
//!
//! # Environment Variables
//!
//! - `OPENAI_API_KEY`: API key for the provider
//! - `OPENAI_BASE_URL`: Provider base URL (default: OpenAI)
//! - `NEON_SOUL_CHAT_MODEL` / `NEON_SOUL_EMBEDDING_MODEL`: Model names
//! - `NEON_SOUL_*`: Overrides for any synthesis setting
//! - `RUST_LOG`: Tracing filter (default: "info")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin synthesize -- sources.json [config.yaml]
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use neon_soul::{OpenAiCompatibleProvider, SourceDocument, SynthesisConfig, SynthesisSession};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only the result.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,neon_soul=debug".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(input) = args.next() else {
        bail!("usage: synthesize <sources.json> [config.yaml]");
    };

    let config = match args.next() {
        Some(path) => SynthesisConfig::from_yaml_file(&path)
            .with_context(|| format!("loading config {}", path))?,
        None => SynthesisConfig::default(),
    }
    .with_env_overrides()?;

    let raw = std::fs::read_to_string(&input).with_context(|| format!("reading {}", input))?;
    let sources: Vec<SourceDocument> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", input))?;
    tracing::info!("Loaded {} source documents from {}", sources.len(), input);

    let provider = Arc::new(OpenAiCompatibleProvider::from_env(Duration::from_secs(
        config.llm_timeout_secs,
    ))?);
    let session = SynthesisSession::new(provider.clone(), provider, config)?;
    let result = session.synthesize(&sources).await?;

    tracing::info!(
        "{} axioms, converged={}, {} excluded signals",
        result.axioms.len(),
        result.converged,
        result.excluded.len()
    );
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
