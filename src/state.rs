use crate::cache::TtlCache;
use crate::config::Config;
use crate::rate_limit::RateLimiter;

// app's shared state; caches and the limiter are constructed by main and
// injected here rather than living in globals
pub struct AppState {
    pub client: reqwest::Client,
    pub config: Config,
    // trained-context summaries, keyed by the joined fragment sequence
    pub train_cache: TtlCache,
    // completed generations, keyed by a hash of model + prompt + context
    pub gen_cache: TtlCache,
    pub rate_limiter: RateLimiter,
}
