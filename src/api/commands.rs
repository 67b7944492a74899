//! Vocabulary endpoints

use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiState};
use crate::commands::{Vocabulary, VocabularyRow};

#[derive(Serialize)]
pub struct CommandListResponse {
    /// Bumped on every vocabulary change
    pub version: u64,
    pub commands: Vec<VocabularyRow>,
}

impl From<&Vocabulary> for CommandListResponse {
    fn from(vocabulary: &Vocabulary) -> Self {
        Self {
            version: vocabulary.version(),
            commands: vocabulary.list_all().collect(),
        }
    }
}

#[derive(Deserialize)]
pub struct AddOverrideRequest {
    pub trigger: String,
    pub payload: String,
}

/// List built-in commands followed by overrides
async fn list_commands(State(state): State<Arc<ApiState>>) -> Json<CommandListResponse> {
    let vocabulary = state.vocabulary.read().await;
    Json(CommandListResponse::from(&*vocabulary))
}

/// Add or replace an override
async fn add_override(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<AddOverrideRequest>,
) -> Result<(StatusCode, Json<CommandListResponse>), ApiError> {
    let mut vocabulary = state.vocabulary.write().await;
    vocabulary.add_override(&req.trigger, &req.payload)?;
    tracing::info!(trigger = %req.trigger.trim(), "override saved");

    Ok((StatusCode::CREATED, Json(CommandListResponse::from(&*vocabulary))))
}

/// Build the commands router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(list_commands).post(add_override))
        .with_state(state)
}
