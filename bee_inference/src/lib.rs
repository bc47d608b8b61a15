mod ort_service;

pub mod classifier;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod preprocess;

pub use classifier::{validate_scores, Classifier, LoadError, PredictionError};
pub use config::{ModelConfig, TargetShape, Validatable};
pub use decoder::{DecodedImage, FrameDecodeError, FrameDecoder, DEFAULT_MAX_DECODED_BYTES};
pub use encoder::{encode_scores, Label, PredictionPayload, PredictionResult};
pub use ort_service::OrtClassifier;
pub use preprocess::{Preprocess, PreprocessError, Preprocessor, Tensor};
