use crate::{
    batch::{AccumulatorError, BatchAccumulator},
    config::SessionConfig,
    messages::{self, ServerMessage},
    telemetry::Metrics,
    transport::{Inbound, Transport, TransportError},
};
use bee_inference::{
    encode_scores, validate_scores, Classifier, FrameDecoder, Preprocess, PredictionError, Tensor,
};
use bytes::Bytes;
use std::{sync::Arc, time::Instant};
use thiserror::Error;
use tokio::time::timeout;
use tracing::instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    Connecting,
    ReadinessCheck,
    Streaming,
    Closed,
}

/// Failures that end a session. Per-frame and per-batch failures are handled
/// inside the streaming loop and never surface here.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Model unavailable")]
    ModelUnavailable,
    #[error("Transport failed: {0}")]
    Transport(#[from] TransportError),
    #[error("No frame received within {0:?}")]
    IdleTimeout(std::time::Duration),
    #[error("Prediction exceeded {0:?}")]
    PredictionTimeout(std::time::Duration),
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl From<AccumulatorError> for SessionError {
    fn from(err: AccumulatorError) -> Self {
        SessionError::Unexpected(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub frames_received: usize,
    pub decode_failures: usize,
    pub preprocess_failures: usize,
    pub batches_predicted: usize,
    pub batches_failed: usize,
    pub pending_discarded: usize,
    pub final_state: SessionState,
}

pub struct Session<T: Transport> {
    id: u64,
    state: SessionState,
    transport: T,
    classifier: Arc<dyn Classifier>,
    decoder: FrameDecoder,
    preprocessor: Arc<dyn Preprocess>,
    pending: BatchAccumulator,
    config: SessionConfig,
    metrics: Arc<Metrics>,
    report: SessionReport,
}

impl<T: Transport> Session<T> {
    pub fn new(
        id: u64,
        transport: T,
        classifier: Arc<dyn Classifier>,
        preprocessor: Arc<dyn Preprocess>,
        config: SessionConfig,
        metrics: Arc<Metrics>,
    ) -> Result<Self, AccumulatorError> {
        let pending = BatchAccumulator::new(config.batch_capacity)?;
        Ok(Self {
            id,
            state: SessionState::Connecting,
            transport,
            classifier,
            decoder: FrameDecoder::new(config.max_image_dimension, config.max_decoded_bytes),
            preprocessor,
            pending,
            config,
            metrics,
            report: SessionReport {
                frames_received: 0,
                decode_failures: 0,
                preprocess_failures: 0,
                batches_predicted: 0,
                batches_failed: 0,
                pending_discarded: 0,
                final_state: SessionState::Connecting,
            },
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    fn advance(&mut self, next: SessionState) {
        if next <= self.state {
            tracing::warn!(
                "Ignoring session transition {:?} -> {:?}",
                self.state,
                next
            );
            return;
        }
        tracing::debug!("Session {} {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }

    /// Drives the connection until the client disconnects or a session-level
    /// failure occurs. The session is always `Closed` afterwards.
    #[instrument(skip(self), fields(session_id = self.id))]
    pub async fn run(mut self) -> SessionReport {
        self.metrics.session_opened();
        tracing::info!("Client connected");

        let outcome = self.drive().await;
        match &outcome {
            Ok(()) => tracing::info!("Client disconnected"),
            Err(SessionError::Transport(e)) => {
                tracing::warn!("Transport failure, tearing down session: {}", e)
            }
            Err(e) => {
                tracing::warn!("Closing session: {}", e);
                self.notify_failure(e).await;
            }
        }

        self.teardown().await;
        self.metrics.session_closed();
        self.report.final_state = self.state;
        self.report
    }

    async fn drive(&mut self) -> Result<(), SessionError> {
        self.advance(SessionState::ReadinessCheck);
        if !self.classifier.is_ready() {
            return Err(SessionError::ModelUnavailable);
        }

        self.advance(SessionState::Streaming);
        let idle_timeout = self.config.idle_timeout();

        loop {
            let inbound = match timeout(idle_timeout, self.transport.recv()).await {
                Err(_) => return Err(SessionError::IdleTimeout(idle_timeout)),
                Ok(None) => return Ok(()),
                Ok(Some(result)) => result?,
            };

            match inbound {
                Inbound::Frame(data) => self.handle_frame(data).await?,
                Inbound::Text(_) => {
                    return Err(SessionError::Unexpected(
                        "expected binary image frames, received a text message".to_string(),
                    ))
                }
            }
        }
    }

    async fn handle_frame(&mut self, data: Bytes) -> Result<(), SessionError> {
        self.report.frames_received += 1;
        self.metrics.record_frame();

        let image = match self.decoder.decode(&data) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!("Frame decode error: {}", e);
                self.report.decode_failures += 1;
                self.metrics.record_rejected_frame("decode");
                self.transport
                    .send(&ServerMessage::error(messages::INVALID_FRAME))
                    .await?;
                return Ok(());
            }
        };

        match self.preprocessor.preprocess(&image) {
            Ok(tensor) => self.pending.append(tensor)?,
            Err(e) => {
                tracing::warn!("A frame could not be processed, skipping: {}", e);
                self.report.preprocess_failures += 1;
                self.metrics.record_rejected_frame("preprocess");
                return Ok(());
            }
        }

        if self.pending.is_full() {
            let batch = self.pending.flush();
            self.predict_batch(batch).await?;
        }

        Ok(())
    }

    async fn predict_batch(&mut self, batch: Vec<Tensor>) -> Result<(), SessionError> {
        let batch_size = batch.len();
        tracing::info!("Predicting on a batch of {} frames", batch_size);

        let predict_timeout = self.config.predict_timeout();
        let started = Instant::now();
        let result = timeout(predict_timeout, self.classifier.predict(batch)).await;
        self.metrics
            .record_prediction_duration(started.elapsed().as_millis() as u64);

        let scores = match result {
            Ok(scores) => scores,
            Err(_) => {
                self.report.batches_failed += 1;
                self.metrics.record_batch("timed_out");
                return Err(SessionError::PredictionTimeout(predict_timeout));
            }
        };

        match checked(scores, batch_size) {
            Ok(scores) => {
                self.report.batches_predicted += 1;
                self.metrics.record_batch("predicted");
                let message = ServerMessage::predictions(encode_scores(&scores), batch_size);
                self.transport.send(&message).await?;
            }
            Err(e) => {
                tracing::error!("Error during model predictions: {}", e);
                self.report.batches_failed += 1;
                self.metrics.record_batch("failed");
                let message =
                    ServerMessage::error_with_details(messages::PREDICTION_FAILED, &e);
                self.transport.send(&message).await?;
            }
        }

        Ok(())
    }

    async fn notify_failure(&mut self, err: &SessionError) {
        let message = match err {
            SessionError::ModelUnavailable => ServerMessage::error(messages::MODEL_NOT_LOADED),
            SessionError::IdleTimeout(_) => ServerMessage::error(messages::IDLE_TIMEOUT),
            SessionError::PredictionTimeout(_) => {
                ServerMessage::error_with_details(messages::PREDICTION_TIMED_OUT, err)
            }
            SessionError::Unexpected(details) => {
                ServerMessage::error_with_details(messages::UNEXPECTED, details)
            }
            SessionError::Transport(_) => return,
        };

        if let Err(send_err) = self.transport.send(&message).await {
            tracing::error!("Could not send error to client: {}", send_err);
        }
    }

    async fn teardown(&mut self) {
        let discarded = self.pending.discard();
        if discarded > 0 {
            tracing::info!("{} frames pending in batch were discarded", discarded);
        }
        self.report.pending_discarded = discarded;

        if let Err(e) = self.transport.close().await {
            tracing::debug!("Close after teardown failed: {}", e);
        }
        self.advance(SessionState::Closed);
    }
}

/// Accepts a classifier result only if it holds one probability per frame.
fn checked(
    scores: Result<Vec<f32>, PredictionError>,
    batch_size: usize,
) -> Result<Vec<f32>, PredictionError> {
    let scores = scores?;
    validate_scores(&scores, batch_size)?;
    Ok(scores)
}
