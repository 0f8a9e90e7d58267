use serde::{Deserialize, Serialize};
use serde_json::Value;

// One turn of browser-held conversation history
#[derive(Deserialize, Serialize, Clone)]
pub struct ChatMessage {
    pub text: String,
    // "user" or "ai"; echoed back by the client, not interpreted here
    #[serde(rename = "type")]
    pub kind: String,
}

// POST /api/chat body
#[derive(Deserialize, Clone)]
pub struct ChatRequest {
    pub prompt: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

// POST /api/train body. Elements may be any JSON value; the trainer coerces
// them to strings.
#[derive(Deserialize)]
pub struct TrainRequest {
    pub array: Vec<Value>,
}

#[derive(Serialize)]
pub struct TrainResponse {
    pub result: String,
}

// Upstream completion request format (Together-style /inference)
#[derive(Serialize, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub repetition_penalty: f32,
    pub stop: Vec<String>,
    pub stream: bool,
}
