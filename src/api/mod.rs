//! HTTP API server for beacon remote

pub mod commands;
pub mod dispatch;
pub mod health;
pub mod session;

use std::sync::Arc;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::commands::SharedVocabulary;
use crate::dispatch::{DispatchQueue, Dispatcher};
use crate::session::SessionManager;
use crate::{Error, Result};

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub vocabulary: SharedVocabulary,
    pub session: Arc<SessionManager>,
    pub dispatcher: Arc<Dispatcher>,
    /// Utterances posted over HTTP join the same queue as speech input
    pub queue: DispatchQueue,
}

impl ApiState {
    /// Build state around a dispatcher and its queue
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>, queue: DispatchQueue) -> Self {
        Self {
            vocabulary: dispatcher.vocabulary().clone(),
            session: dispatcher.session().clone(),
            dispatcher,
            queue,
        }
    }
}

/// API errors
#[derive(Debug)]
pub enum ApiError {
    /// An error from the remote itself
    Remote(Error),
    /// Nothing to return yet
    NotFound(&'static str),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Remote(err)
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.to_string()),
            Self::Remote(err) => {
                let (status, code) = match &err {
                    Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
                    Error::AlreadyInProgress => (StatusCode::CONFLICT, "already_in_progress"),
                    Error::NotConnected => (StatusCode::CONFLICT, "not_connected"),
                    Error::Transport(_) | Error::LinkLost(_) => {
                        (StatusCode::BAD_GATEWAY, "transport_error")
                    }
                    Error::DispatchStopped => (StatusCode::SERVICE_UNAVAILABLE, "shutting_down"),
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
                };
                (status, code, err.to_string())
            }
        };

        (status, Json(ErrorResponse { error: ErrorDetail { code, message } })).into_response()
    }
}

/// Build the full router with CORS and request tracing
pub fn router(state: Arc<ApiState>) -> Router {
    let router = Router::new()
        .nest("/api/commands", commands::router(state.clone()))
        .nest("/api/session", session::router(state.clone()))
        .merge(dispatch::router(state))
        .merge(health::router());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router.layer(cors).layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Create a server for the given state
    #[must_use]
    pub const fn new(state: Arc<ApiState>, port: u16) -> Self {
        Self { state, port }
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, router(self.state))
            .await
            .map_err(|e| Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn status_of(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn maps_errors_to_status_codes() {
        let (status, json) = status_of(Error::AlreadyInProgress.into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"]["code"], "already_in_progress");

        let (status, _) = status_of(Error::Transport("gone".to_string()).into()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let (status, _) = status_of(Error::InvalidInput("blank".to_string()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = status_of(Error::DispatchStopped.into()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"]["code"], "shutting_down");

        let (status, json) = status_of(ApiError::NotFound("nothing yet")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["message"], "nothing yet");
    }
}
