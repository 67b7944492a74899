//! Session endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Serialize;

use super::{ApiError, ApiState};
use crate::Error;
use crate::session::{DisconnectOutcome, SessionState};

#[derive(Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub state: SessionState,
    /// Human-readable status line
    pub summary: String,
}

impl From<SessionState> for SessionResponse {
    fn from(state: SessionState) -> Self {
        Self {
            summary: state.to_string(),
            state,
        }
    }
}

#[derive(Serialize)]
pub struct DisconnectResponse {
    pub outcome: DisconnectOutcome,
    pub message: String,
    pub session: SessionResponse,
}

async fn get_session(State(state): State<Arc<ApiState>>) -> Json<SessionResponse> {
    Json(state.session.status().into())
}

/// Connect to the peripheral
///
/// The attempt runs in its own task so a dropped request cannot cancel it.
async fn connect(State(state): State<Arc<ApiState>>) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.session.clone();
    let connected = tokio::spawn(async move { session.connect().await })
        .await
        .map_err(|e| Error::Transport(format!("connect task failed: {e}")))??;

    Ok(Json(connected.into()))
}

async fn disconnect(State(state): State<Arc<ApiState>>) -> Json<DisconnectResponse> {
    let outcome = state.session.disconnect().await;
    Json(DisconnectResponse {
        outcome,
        message: outcome.to_string(),
        session: state.session.status().into(),
    })
}

/// Build the session router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(get_session))
        .route("/connect", post(connect))
        .route("/disconnect", post(disconnect))
        .with_state(state)
}
