use std::env;
use std::path::PathBuf;

/// Process configuration, read once at startup. Everything has a default so
/// the binary runs with no environment set.
#[derive(Debug, Clone)]
pub struct Config {
    pub model_path: PathBuf,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Self {
        let model_path = env::var("DETECTOR_MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("model.onnx"));
        let bind_addr =
            env::var("DETECTOR_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

        Config {
            model_path,
            bind_addr,
        }
    }
}
