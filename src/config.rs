use clap::Parser;
use std::time::Duration;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "chat-gateway")]
#[command(about = "Streaming chat gateway for a hosted LLM inference API")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // Upstream inference endpoint
    #[arg(short, long, default_value = "https://api.together.xyz/inference")]
    pub upstream_url: String,

    // Model identifier sent to the upstream API
    #[arg(short, long, default_value = "mistralai/Mixtral-8x7B-Instruct-v0.1")]
    pub model: String,

    // Cache TTL in seconds
    #[arg(long, default_value_t = 3600)]
    pub cache_ttl: u64,

    // Max entries in the training-context cache
    #[arg(long, default_value_t = 1000)]
    pub train_cache_size: usize,

    // Max entries in the generation cache
    #[arg(long, default_value_t = 100)]
    pub gen_cache_size: usize,

    // Rate limit max requests per window
    #[arg(long, default_value_t = 30)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, default_value_t = 60)]
    pub rate_window: u64,

    // Background sweep interval in seconds
    #[arg(long, default_value_t = 300)]
    pub sweep_interval: u64,

    // Timeout for the context-training call, in seconds
    #[arg(long, default_value_t = 10)]
    pub train_timeout: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("TOGETHER_API_KEY environment variable is not set")]
    MissingApiKey,
}

// Resolved runtime configuration: CLI args plus the bearer credential
#[derive(Debug, Clone)]
pub struct Config {
    pub upstream_url: String,
    pub model: String,
    pub api_key: String,
    pub train_timeout: Duration,
}

impl Config {
    // missing credential is fatal at startup, not per-request
    pub fn from_env(args: &Args) -> Result<Self, ConfigError> {
        let api_key = std::env::var("TOGETHER_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        Ok(Self {
            upstream_url: args.upstream_url.clone(),
            model: args.model.clone(),
            api_key,
            train_timeout: Duration::from_secs(args.train_timeout),
        })
    }
}
