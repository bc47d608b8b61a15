use bee_inference::PredictionPayload;
use serde::Serialize;

pub const INVALID_FRAME: &str = "Invalid frame received, could not decode";
pub const MODEL_NOT_LOADED: &str = "Model not loaded on server. Cannot process video.";
pub const PREDICTION_FAILED: &str = "Failed to get predictions from model.";
pub const PREDICTION_TIMED_OUT: &str = "Prediction timed out.";
pub const IDLE_TIMEOUT: &str = "No frame received before the idle timeout, closing.";
pub const UNEXPECTED: &str = "An unexpected server error occurred.";

/// Messages sent from the server to a streaming client, serialized as JSON
/// text frames.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Predictions {
        predictions: Vec<PredictionPayload>,
        batch_size: usize,
    },
    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
}

impl ServerMessage {
    pub fn predictions(predictions: Vec<PredictionPayload>, batch_size: usize) -> Self {
        ServerMessage::Predictions {
            predictions,
            batch_size,
        }
    }

    pub fn error(error: &str) -> Self {
        ServerMessage::Error {
            error: error.to_string(),
            details: None,
        }
    }

    pub fn error_with_details(error: &str, details: impl ToString) -> Self {
        ServerMessage::Error {
            error: error.to_string(),
            details: Some(details.to_string()),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bee_inference::encode_scores;
    use serde_json::json;

    #[test]
    fn test_error_without_details() {
        let value = serde_json::to_value(ServerMessage::error(INVALID_FRAME)).unwrap();
        assert_eq!(value, json!({ "error": "Invalid frame received, could not decode" }));
    }

    #[test]
    fn test_error_with_details() {
        let message = ServerMessage::error_with_details(PREDICTION_FAILED, "boom");
        let value = serde_json::to_value(message).unwrap();

        assert_eq!(
            value,
            json!({ "error": "Failed to get predictions from model.", "details": "boom" })
        );
    }

    #[test]
    fn test_predictions_shape() {
        let message = ServerMessage::predictions(encode_scores(&[0.9, 0.2]), 2);
        let value: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();

        assert_eq!(value["batch_size"], 2);
        assert_eq!(
            value["predictions"][0],
            json!({ "label": "Non-Bee", "confidence": "90.00%", "raw_score_non_bee": "0.9000" })
        );
        assert_eq!(value["predictions"][1]["label"], "Bee");
        assert_eq!(value["predictions"][1]["confidence"], "80.00%");
    }
}
