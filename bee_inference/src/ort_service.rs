use crate::{
    classifier::{stack_batch, validate_scores, Classifier, LoadError, PredictionError},
    config::{ModelConfig, Validatable},
    preprocess::Tensor,
};
use async_trait::async_trait;
use ndarray::{Array4, Axis};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use parking_lot::{Mutex, RwLock};
use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

/// A fixed set of ONNX sessions for one loaded model version.
struct SessionPool {
    sessions: Vec<Mutex<Session>>,
    counter: AtomicUsize,
    output_name: String,
}

impl SessionPool {
    fn build(model_config: &ModelConfig) -> Result<Self, LoadError> {
        let sessions = (0..model_config.num_instances)
            .map(|_| build_session(&model_config.get_path()).map(Mutex::new))
            .collect::<Result<Vec<_>, ort::Error>>()
            .map_err(|e| LoadError::Runtime(e.to_string()))?;

        Ok(Self {
            sessions,
            counter: AtomicUsize::new(0),
            output_name: model_config.output_name.clone(),
        })
    }

    fn run_inference(&self, input: &Array4<f32>) -> Result<Vec<f32>, PredictionError> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let mut session = self.sessions[index].lock();

        tracing::debug!("Handling batch of {} with session {}", input.len_of(Axis(0)), index);

        let tensor_ref = TensorRef::from_array_view(input.view())
            .map_err(|e| PredictionError::Runtime(format!("failed to build tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| PredictionError::Runtime(format!("inference failed: {}", e)))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            PredictionError::Runtime(format!("model has no output named {}", self.output_name))
        })?;

        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| PredictionError::Runtime(format!("failed to extract tensor: {}", e)))?;

        Ok(data.to_vec())
    }
}

fn build_session(path: &Path) -> Result<Session, ort::Error> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .commit_from_file(path)?;
    Ok(session)
}

/// ONNX Runtime backed classifier. Reloading builds a complete new pool before
/// swapping it in, so in-flight predictions finish on the version they started
/// with.
pub struct OrtClassifier {
    config: ModelConfig,
    pool: RwLock<Option<Arc<SessionPool>>>,
}

impl OrtClassifier {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            pool: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn current(&self) -> Option<Arc<SessionPool>> {
        self.pool.read().clone()
    }
}

#[async_trait]
impl Classifier for OrtClassifier {
    fn load(&self) -> Result<(), LoadError> {
        let path = self.config.get_path();
        tracing::info!("Loading model from {:?}", path);

        if !path.exists() {
            return Err(LoadError::ModelNotFound(path));
        }
        self.config.validate().map_err(LoadError::InvalidConfig)?;

        let pool = SessionPool::build(&self.config)?;
        *self.pool.write() = Some(Arc::new(pool));

        tracing::info!(
            "Created {} ONNX sessions for {:?}",
            self.config.num_instances,
            path
        );
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.pool.read().is_some()
    }

    async fn predict(&self, batch: Vec<Tensor>) -> Result<Vec<f32>, PredictionError> {
        let pool = self.current().ok_or(PredictionError::NotLoaded)?;
        let input = stack_batch(&batch)?;
        let expected = batch.len();
        drop(batch);

        let scores = tokio::task::spawn_blocking(move || pool.run_inference(&input))
            .await
            .map_err(|e| PredictionError::Runtime(format!("inference task failed: {}", e)))??;

        validate_scores(&scores, expected)?;
        Ok(scores)
    }
}
