use crate::cache::TtlCache;
use crate::config::Config;
use crate::error::ApiError;
use crate::extract::extract_text;
use crate::metrics::{CACHE_HITS, CACHE_MISSES, TRAIN_CACHE_SIZE};
use crate::models::CompletionRequest;
use crate::stream::upstream_error;
use serde_json::Value;

// Conversation order is meaningful, so the cache key keeps the original
// ordering (joined, not sorted)
const KEY_DELIMITER: &str = "|";

// coerce each element to a string, trim, and drop empties
fn validate_items(items: &[Value]) -> Result<Vec<String>, ApiError> {
    if items.is_empty() {
        return Err(ApiError::InvalidInput(
            "Input array cannot be empty".to_string(),
        ));
    }

    let validated: Vec<String> = items
        .iter()
        .map(|item| match item {
            Value::String(s) => s.trim().to_string(),
            other => other.to_string().trim().to_string(),
        })
        .filter(|item| !item.is_empty())
        .collect();

    if validated.is_empty() {
        return Err(ApiError::InvalidInput(
            "No valid items in input array".to_string(),
        ));
    }
    Ok(validated)
}

fn training_prompt(items: &[String]) -> String {
    format!(
        "You are a context analyzer. Extract and structure key information from input \
         into a concise format. Focus on: 1) Main topics 2) Key entities 3) Important \
         relationships 4) Temporal information. Format as a structured JSON-like object \
         for efficient parsing.\n\nInput:\n{}\n\nResponse:",
        items.join("\n")
    )
}

// Summarize prior conversation fragments into a compact trained context.
// Cache-first: an identical ordered sequence never hits the upstream twice
// inside the TTL.
pub async fn train(
    client: &reqwest::Client,
    config: &Config,
    cache: &TtlCache,
    items: &[Value],
) -> Result<String, ApiError> {
    let validated = validate_items(items)?;
    let cache_key = validated.join(KEY_DELIMITER);

    if let Some(cached) = cache.get(&cache_key) {
        CACHE_HITS.inc();
        tracing::debug!("training cache hit");
        return Ok(cached);
    }
    CACHE_MISSES.inc();

    let body = CompletionRequest {
        model: config.model.clone(),
        prompt: training_prompt(&validated),
        max_tokens: 256,
        temperature: 0.2,
        top_p: 0.1,
        top_k: 40,
        repetition_penalty: 1.1,
        stop: vec!["}".to_string()],
        stream: false,
    };

    let response = client
        .post(&config.upstream_url)
        .bearer_auth(&config.api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    if !response.status().is_success() {
        return Err(upstream_error(response).await);
    }

    let data: Value = response
        .json()
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    let result = extract_text(&data).ok_or_else(|| {
        ApiError::Upstream("Invalid response format from API - no text content found".to_string())
    })?;

    cache.put(&cache_key, &result);
    TRAIN_CACHE_SIZE.set(cache.len() as f64);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::time::Duration;

    fn test_config(server: &MockServer) -> Config {
        Config {
            upstream_url: server.url("/inference"),
            model: "test-model".to_string(),
            api_key: "test-key".to_string(),
            train_timeout: Duration::from_secs(10),
        }
    }

    fn test_cache() -> TtlCache {
        TtlCache::new(100, Duration::from_secs(3600))
    }

    #[test]
    fn empty_array_is_invalid_input() {
        match validate_items(&[]) {
            Err(ApiError::InvalidInput(message)) => {
                assert_eq!(message, "Input array cannot be empty");
            }
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn whitespace_only_items_are_invalid_input() {
        let items = vec![json!("   "), json!("")];
        match validate_items(&items) {
            Err(ApiError::InvalidInput(message)) => {
                assert_eq!(message, "No valid items in input array");
            }
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn non_string_items_are_coerced() {
        let items = vec![json!(" hello "), json!(42), json!(true)];
        let validated = validate_items(&items).unwrap();
        assert_eq!(validated, vec!["hello", "42", "true"]);
    }

    #[tokio::test]
    async fn repeated_call_hits_cache_and_skips_upstream() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/inference");
                then.status(200)
                    .json_body(json!({"choices": [{"text": "summary"}]}));
            })
            .await;

        let client = reqwest::Client::new();
        let config = test_config(&server);
        let cache = test_cache();
        let items = vec![json!("hello"), json!("how are you"), json!("fine")];

        let first = train(&client, &config, &cache, &items).await.unwrap();
        let second = train(&client, &config, &cache, &items).await.unwrap();

        assert_eq!(first, "summary");
        assert_eq!(second, first);
        mock.assert_hits_async(1).await;
        // training stores update the train-cache gauge, not the gen one
        assert!(TRAIN_CACHE_SIZE.get() >= 1.0);
    }

    #[tokio::test]
    async fn reordered_items_are_a_different_key() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/inference");
                then.status(200)
                    .json_body(json!({"choices": [{"text": "summary"}]}));
            })
            .await;

        let client = reqwest::Client::new();
        let config = test_config(&server);
        let cache = test_cache();

        train(&client, &config, &cache, &[json!("a"), json!("b")])
            .await
            .unwrap();
        train(&client, &config, &cache, &[json!("b"), json!("a")])
            .await
            .unwrap();

        mock.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn upstream_error_message_is_preserved() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/inference");
                then.status(429)
                    .json_body(json!({"error": {"message": "quota exceeded"}}));
            })
            .await;

        let client = reqwest::Client::new();
        let config = test_config(&server);
        let cache = test_cache();

        let err = train(&client, &config, &cache, &[json!("hi")])
            .await
            .unwrap_err();
        match err {
            ApiError::Upstream(message) => assert_eq!(message, "quota exceeded"),
            other => panic!("expected Upstream, got {other:?}"),
        }
        assert!(cache.is_empty(), "failures must not be cached");
    }

    #[tokio::test]
    async fn unrecognized_response_shape_is_an_upstream_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/inference");
                then.status(200).json_body(json!({"usage": {"tokens": 5}}));
            })
            .await;

        let client = reqwest::Client::new();
        let config = test_config(&server);
        let cache = test_cache();

        let err = train(&client, &config, &cache, &[json!("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));
    }
}
