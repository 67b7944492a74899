//! Utterance endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Deserialize;

use super::{ApiError, ApiState};
use crate::Error;
use crate::dispatch::{DispatchRecord, DispatchResult};

#[derive(Deserialize)]
pub struct UtteranceRequest {
    pub text: String,
}

/// Queue an utterance behind any pending speech input and wait for its result
async fn post_utterance(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<UtteranceRequest>,
) -> Result<Json<DispatchResult>, ApiError> {
    if req.text.trim().is_empty() {
        return Err(Error::InvalidInput("utterance must not be empty".to_string()).into());
    }

    Ok(Json(state.queue.submit(req.text).await?))
}

async fn last_dispatch(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<DispatchRecord>, ApiError> {
    state
        .dispatcher
        .last_result()
        .map(Json)
        .ok_or(ApiError::NotFound("no utterance dispatched yet"))
}

/// Build the dispatch router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/utterances", post(post_utterance))
        .route("/api/dispatch/last", get(last_dispatch))
        .with_state(state)
}
