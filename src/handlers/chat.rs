use crate::cache::generation_key;
use crate::error::ApiError;
use crate::metrics::{CACHE_HITS, CACHE_MISSES, GEN_CACHE_SIZE, REQUEST_LATENCY, REQUEST_TOTAL};
use crate::models::ChatRequest;
use crate::state::AppState;
use crate::{stream, trainer};
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use serde_json::{Value, json};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;

fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

// POST /api/chat: rate limit, summarize history into a trained context, then
// relay the generation stream to the browser as SSE events
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    REQUEST_TOTAL.inc();
    state.rate_limiter.check(&client_key(&headers))?;

    if payload.prompt.trim().is_empty() {
        return Err(ApiError::InvalidInput("Prompt is required".to_string()));
    }

    let start_time = Instant::now();
    let prompt = payload.prompt;

    // seed item + prior history + the new prompt, in conversation order
    let mut items = vec![Value::String("hello".to_string())];
    items.extend(
        payload
            .messages
            .iter()
            .map(|m| Value::String(m.text.clone())),
    );
    items.push(Value::String(prompt.clone()));

    // dropping the future on timeout aborts the upstream call; nothing is
    // cached for a timed-out training attempt
    let trained = match tokio::time::timeout(
        state.config.train_timeout,
        trainer::train(&state.client, &state.config, &state.train_cache, &items),
    )
    .await
    {
        Ok(result) => result?,
        Err(_) => return Err(ApiError::Timeout),
    };

    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let task_state = Arc::clone(&state);

    tokio::spawn(async move {
        let key = generation_key(&task_state.config.model, &prompt, &trained);

        if let Some(cached) = task_state.gen_cache.get(&key) {
            CACHE_HITS.inc();
            let _ = tx.send(json!({"done": true, "result": cached}).to_string());
            REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
            return;
        }
        CACHE_MISSES.inc();

        let token_tx = tx.clone();
        let result = stream::generate(
            &task_state.client,
            &task_state.config,
            &prompt,
            &trained,
            |s: &str| {
                // send failure just means the client went away
                let _ = token_tx.send(json!({"token": s}).to_string());
            },
        )
        .await;

        match result {
            Ok(full) => {
                task_state.gen_cache.put(&key, &full);
                GEN_CACHE_SIZE.set(task_state.gen_cache.len() as f64);
                let _ = tx.send(json!({"done": true, "result": full}).to_string());
            }
            Err(err) => {
                tracing::warn!(error = %err, "generation failed");
                let _ = tx.send(json!({"error": err.to_string()}).to_string());
            }
        }
        REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
    });

    let events =
        UnboundedReceiverStream::new(rx).map(|data| Ok(Event::default().data(data)));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
