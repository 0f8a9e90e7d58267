use crate::error::ApiError;
use crate::models::{TrainRequest, TrainResponse};
use crate::state::AppState;
use crate::trainer;
use axum::Json;
use axum::extract::State;
use std::sync::Arc;

// non-streaming sibling endpoint: summarize an ordered fragment array
pub async fn train_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TrainRequest>,
) -> Result<Json<TrainResponse>, ApiError> {
    let result = trainer::train(
        &state.client,
        &state.config,
        &state.train_cache,
        &payload.array,
    )
    .await?;
    Ok(Json(TrainResponse { result }))
}
