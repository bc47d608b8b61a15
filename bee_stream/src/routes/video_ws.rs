use crate::{server::SharedState, session::Session};
use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
};
use tracing::instrument;

#[instrument(skip_all)]
pub async fn video_ws(ws: WebSocketUpgrade, State(state): State<SharedState>) -> Response {
    let session_id = state.next_session_id();

    ws.max_message_size(state.session_config.max_frame_bytes)
        .on_upgrade(move |socket| async move {
            let session = match Session::new(
                session_id,
                socket,
                state.classifier.clone(),
                state.preprocessor.clone(),
                state.session_config.clone(),
                state.metrics.clone(),
            ) {
                Ok(session) => session,
                Err(e) => {
                    tracing::error!("Failed to create session {}: {}", session_id, e);
                    return;
                }
            };

            let report = session.run().await;
            tracing::info!(
                session_id,
                frames = report.frames_received,
                decode_failures = report.decode_failures,
                preprocess_failures = report.preprocess_failures,
                batches_predicted = report.batches_predicted,
                batches_failed = report.batches_failed,
                discarded = report.pending_discarded,
                "WebSocket connection processing finished"
            );
        })
}
