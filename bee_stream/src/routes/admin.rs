use super::health::HealthStatus;
use crate::server::SharedState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use bee_inference::LoadError;
use serde_json::json;
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum ReloadError {
    #[error("A model reload is already in progress")]
    InProgress,
    #[error("Model reload failed: {0}")]
    Load(#[from] LoadError),
    #[error("Reload task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for ReloadError {
    fn into_response(self) -> Response {
        let details = match &self {
            ReloadError::InProgress => {
                tracing::warn!("{}", self);
                return (
                    StatusCode::CONFLICT,
                    Json(json!({ "error": "A model reload is already in progress." })),
                )
                    .into_response();
            }
            ReloadError::Load(e) => e.to_string(),
            ReloadError::Task(e) => e.to_string(),
        };
        tracing::error!("{}", self);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to reload model.", "details": details })),
        )
            .into_response()
    }
}

/// Swaps in a freshly loaded model. Sessions already running keep predicting
/// on whichever version their in-flight call picked up.
#[instrument(skip(state))]
pub async fn reload_model(
    State(state): State<SharedState>,
) -> Result<Json<HealthStatus>, ReloadError> {
    let _reloading = state
        .reload_lock
        .try_lock()
        .map_err(|_| ReloadError::InProgress)?;

    let classifier = state.classifier.clone();
    tokio::task::spawn_blocking(move || classifier.load()).await??;

    tracing::info!("Model reloaded");
    Ok(Json(HealthStatus::from_state(&state)))
}
