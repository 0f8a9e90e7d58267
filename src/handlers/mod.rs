mod chat;
mod health;
mod metrics;
mod train;

pub use chat::chat_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use train::train_handler;
