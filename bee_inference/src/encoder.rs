use serde::Serialize;

/// Scores at or above this value are read as the negative ("Non-Bee") class.
pub const DECISION_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Label {
    #[serde(rename = "Bee")]
    Bee,
    #[serde(rename = "Non-Bee")]
    NonBee,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Bee => "Bee",
            Label::NonBee => "Non-Bee",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionResult {
    pub label: Label,
    /// Percentage in `[50, 100]`.
    pub confidence: f32,
    /// Probability of the non-bee class, in `[0, 1]`.
    pub raw_score: f32,
}

impl PredictionResult {
    /// `raw_score` must already be a probability; classifiers reject anything
    /// else through `validate_scores`.
    pub fn from_score(raw_score: f32) -> Self {
        debug_assert!((0.0..=1.0).contains(&raw_score));

        if raw_score >= DECISION_THRESHOLD {
            Self {
                label: Label::NonBee,
                confidence: raw_score * 100.,
                raw_score,
            }
        } else {
            Self {
                label: Label::Bee,
                confidence: (1. - raw_score) * 100.,
                raw_score,
            }
        }
    }

    pub fn to_payload(&self) -> PredictionPayload {
        PredictionPayload {
            label: self.label,
            confidence: format!("{:.2}%", self.confidence),
            raw_score_non_bee: format!("{:.4}", self.raw_score),
        }
    }
}

/// Wire form of a single prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionPayload {
    pub label: Label,
    pub confidence: String,
    pub raw_score_non_bee: String,
}

pub fn encode_scores(scores: &[f32]) -> Vec<PredictionPayload> {
    scores
        .iter()
        .map(|&score| PredictionResult::from_score(score).to_payload())
        .collect()
}
