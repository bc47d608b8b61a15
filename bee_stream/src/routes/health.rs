use crate::server::SharedState;
use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct HealthStatus {
    pub status: String,
    pub model_loaded: bool,
}

impl HealthStatus {
    pub fn from_state(state: &SharedState) -> Self {
        Self {
            status: "ok".into(),
            model_loaded: state.classifier.is_ready(),
        }
    }
}

pub async fn healthcheck(State(state): State<SharedState>) -> Json<HealthStatus> {
    Json(HealthStatus::from_state(&state))
}
