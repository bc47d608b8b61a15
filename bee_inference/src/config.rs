use serde::Deserialize;
use std::path::PathBuf;

pub trait Validatable {
    fn get_path(&self) -> PathBuf;

    fn validate(&self) -> Result<(), String>;
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub onnx_file: String,
    pub model_dir: PathBuf,
    pub output_name: String,
    #[serde(default = "default_model_instances")]
    pub num_instances: usize,
    #[serde(default = "default_input_size")]
    pub input_height: u32,
    #[serde(default = "default_input_size")]
    pub input_width: u32,
}

fn default_model_instances() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}

fn default_input_size() -> u32 {
    224
}

impl ModelConfig {
    pub fn target_shape(&self) -> TargetShape {
        TargetShape {
            height: self.input_height,
            width: self.input_width,
        }
    }
}

impl Validatable for ModelConfig {
    fn get_path(&self) -> PathBuf {
        self.model_dir.join(&self.onnx_file)
    }

    fn validate(&self) -> Result<(), String> {
        if self.num_instances == 0 {
            return Err("num_instances must be at least 1".to_string());
        }
        if self.input_height == 0 || self.input_width == 0 {
            return Err(format!(
                "Invalid input shape {}x{}",
                self.input_height, self.input_width
            ));
        }
        if !self.get_path().exists() {
            return Err(format!("Model file not found: {:?}", self.get_path()));
        }
        Ok(())
    }
}

/// Spatial size the classifier was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetShape {
    pub height: u32,
    pub width: u32,
}

impl Default for TargetShape {
    fn default() -> Self {
        Self {
            height: default_input_size(),
            width: default_input_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let raw = serde_json::json!({
            "onnx_file": "bee.onnx",
            "model_dir": "./models",
            "output_name": "dense_1",
        });
        let config: ModelConfig = serde_json::from_value(raw).unwrap();

        assert_eq!(config.target_shape(), TargetShape::default());
        assert!(config.num_instances >= 1);
        assert_eq!(config.get_path(), PathBuf::from("./models/bee.onnx"));
    }

    #[test]
    fn test_validate_missing_model() {
        let config = ModelConfig {
            onnx_file: "missing.onnx".to_string(),
            model_dir: PathBuf::from("./does_not_exist"),
            output_name: "dense_1".to_string(),
            num_instances: 1,
            input_height: 224,
            input_width: 224,
        };

        let err = config.validate().unwrap_err();
        assert!(err.contains("Model file not found"));
    }

    #[test]
    fn test_validate_zero_instances() {
        let config = ModelConfig {
            onnx_file: "missing.onnx".to_string(),
            model_dir: PathBuf::from("./does_not_exist"),
            output_name: "dense_1".to_string(),
            num_instances: 0,
            input_height: 224,
            input_width: 224,
        };

        assert!(config.validate().is_err());
    }
}
