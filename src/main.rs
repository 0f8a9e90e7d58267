use axum::{
    Router,
    routing::{get, post},
};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing_subscriber::EnvFilter;

mod cache;
mod config;
mod error;
mod extract;
mod handlers;
mod metrics;
mod models;
mod rate_limit;
mod state;
mod stream;
mod trainer;

use cache::TtlCache;
use config::{Args, Config};
use rate_limit::RateLimiter;
use state::AppState;

// periodically drop expired cache entries and stale rate-limit windows so
// memory stays bounded independent of access pattern
async fn sweeper(state: Arc<AppState>, every: Duration) {
    let mut ticker = interval(every);
    loop {
        ticker.tick().await;
        let trained = state.train_cache.sweep();
        let generated = state.gen_cache.sweep();
        let windows = state.rate_limiter.sweep();
        metrics::TRAIN_CACHE_SIZE.set(state.train_cache.len() as f64);
        metrics::GEN_CACHE_SIZE.set(state.gen_cache.len() as f64);
        tracing::debug!(trained, generated, windows, "sweep complete");
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = match Config::from_env(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "configuration error");
            std::process::exit(1);
        }
    };

    let ttl = Duration::from_secs(args.cache_ttl);
    let state = Arc::new(AppState {
        client: reqwest::Client::new(),
        config,
        train_cache: TtlCache::new(args.train_cache_size, ttl),
        gen_cache: TtlCache::new(args.gen_cache_size, ttl),
        rate_limiter: RateLimiter::new(args.rate_limit, Duration::from_secs(args.rate_window)),
    });

    tokio::spawn(sweeper(
        Arc::clone(&state),
        Duration::from_secs(args.sweep_interval),
    ));

    let app = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/api/chat", post(handlers::chat_handler))
        .route("/api/train", post(handlers::train_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();

    tracing::info!("Gateway running on http://localhost:{}", args.port);
    tracing::info!("Forwarding to upstream at {}", args.upstream_url);
    tracing::info!("Cache TTL: {} seconds", args.cache_ttl);
    tracing::info!(
        "Rate limit: {} requests per {} seconds",
        args.rate_limit,
        args.rate_window
    );
    axum::serve(listener, app).await.unwrap();
}
