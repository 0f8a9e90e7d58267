use lazy_static::lazy_static;
use prometheus::{
    Counter, Gauge, Histogram, register_counter, register_gauge, register_histogram,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("chat_requests_total", "Total number of chat requests").unwrap();
    pub static ref CACHE_HITS: Counter =
        register_counter!("chat_cache_hits_total", "Total cache hits").unwrap();
    pub static ref CACHE_MISSES: Counter =
        register_counter!("chat_cache_misses_total", "Total cache misses").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "chat_request_latency_seconds",
        "Request latency in seconds"
    )
    .unwrap();
    pub static ref TRAIN_CACHE_SIZE: Gauge = register_gauge!(
        "chat_train_cache_size",
        "Current number of items in the trained-context cache"
    )
    .unwrap();
    pub static ref GEN_CACHE_SIZE: Gauge = register_gauge!(
        "chat_gen_cache_size",
        "Current number of items in the generation cache"
    )
    .unwrap();
    pub static ref STREAM_PARSE_ERRORS: Counter = register_counter!(
        "chat_stream_parse_errors_total",
        "Malformed stream frames swallowed during generation"
    )
    .unwrap();
}
