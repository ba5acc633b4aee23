//! Command-line and environment configuration.
//!
//! Every setting can come from a flag or its environment variable; `.env` is
//! loaded before parsing, so it counts as environment too.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use medfind_core::embedding::{
    DisabledProvider, EmbeddingProvider, OpenAiEmbeddingProvider, ProviderResult,
    DEFAULT_EMBEDDING_ENDPOINT, DEFAULT_EMBEDDING_MODEL,
};
use medfind_core::resolver::ResolverConfig;

/// Medfind - find a medicine in nearby pharmacies, or the closest alternatives
#[derive(Parser, Debug)]
#[command(name = "medfind")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "MEDFIND_LOG_JSON")]
    pub log_json: bool,

    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to listen on
        #[arg(long, env = "MEDFIND_BIND", default_value = "127.0.0.1:3000")]
        bind: SocketAddr,
    },

    /// Compute embeddings for catalog names that aren't cached yet
    WarmCache {
        /// Stop after this many new embeddings
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Load pharmacies and their stock from a JSON file
    Seed {
        /// JSON array of pharmacies with an `inventory` list each
        file: PathBuf,
    },
}

/// Settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// SQLite database holding pharmacies and stock
    #[arg(long, global = true, env = "MEDFIND_DB", default_value = "medfind.db")]
    pub db: PathBuf,

    /// Medicine catalog CSV
    #[arg(
        long,
        global = true,
        env = "MEDFIND_DATASET",
        default_value = "data/medicine_dataset.csv"
    )]
    pub dataset: PathBuf,

    /// Embedding cache file
    #[arg(
        long,
        global = true,
        env = "MEDFIND_EMBEDDING_CACHE",
        default_value = "data/embeddings_cache.json"
    )]
    pub embedding_cache: PathBuf,

    /// API key for the embedding provider; semantic search is off without it
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Embedding model name
    #[arg(
        long,
        global = true,
        env = "MEDFIND_EMBEDDING_MODEL",
        default_value = DEFAULT_EMBEDDING_MODEL
    )]
    pub embedding_model: String,

    /// Base URL of an OpenAI-compatible embeddings API
    #[arg(
        long,
        global = true,
        env = "MEDFIND_EMBEDDING_ENDPOINT",
        default_value = DEFAULT_EMBEDDING_ENDPOINT
    )]
    pub embedding_endpoint: String,

    /// Seconds to wait for one embedding call
    #[arg(
        long,
        global = true,
        env = "MEDFIND_PROVIDER_TIMEOUT_SECS",
        default_value_t = 15
    )]
    pub provider_timeout_secs: u64,

    /// Inventory search radius in meters
    #[arg(long, global = true, env = "MEDFIND_RADIUS_M", default_value_t = 50_000.0)]
    pub radius_m: f64,

    /// Maximum fuzzy distance (0 = exact only, 1 = anything)
    #[arg(
        long,
        global = true,
        env = "MEDFIND_FUZZY_THRESHOLD",
        default_value_t = 0.3
    )]
    pub fuzzy_threshold: f64,
}

impl Settings {
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            radius_m: self.radius_m,
            fuzzy_threshold: self.fuzzy_threshold,
            ..ResolverConfig::default()
        }
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    /// The configured embedding provider, or a disabled one without an API key.
    pub fn embedding_provider(&self) -> ProviderResult<Arc<dyn EmbeddingProvider>> {
        match self.openai_api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(Arc::new(OpenAiEmbeddingProvider::new(
                key.to_string(),
                self.embedding_model.clone(),
                Some(self.embedding_endpoint.clone()),
                self.provider_timeout(),
            )?)),
            _ => Ok(Arc::new(DisabledProvider)),
        }
    }
}
