use std::path::Path;
use std::sync::Arc;

use ndarray::Array4;
use tract_onnx::prelude::*;

use crate::error::DetectorError;

/// Class identifiers in the checkpoint's id2label order: index 0 is the
/// AI-generated class, index 1 the human-authored class.
pub const LABELS: [&str; 2] = ["ai", "hum"];

/// Input edge length the model's preprocessing config expects.
pub const IMAGE_SIZE: usize = 224;

pub fn labels() -> Vec<String> {
    LABELS.iter().map(|s| s.to_string()).collect()
}

/// Scoring seam: maps a preprocessed NCHW tensor to raw logits, one per
/// label. Implemented by the ONNX plan in production and by stubs in tests.
pub trait Scorer: Send + Sync {
    fn score(&self, input: &Array4<f32>) -> Result<Vec<f32>, DetectorError>;
}

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Model Host: the pretrained detector loaded once at startup. `run` takes
/// `&self`, so concurrent requests share the plan without locking.
pub struct OnnxDetector {
    plan: OnnxPlan,
}

impl OnnxDetector {
    pub fn load(path: &Path) -> Result<Self, DetectorError> {
        log::info!("using device: CPU");
        log::info!("loading model from: {}", path.display());

        let plan = onnx()
            .model_for_path(path)
            .map_err(|e| DetectorError::ModelLoad(format!("read {}: {}", path.display(), e)))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, IMAGE_SIZE, IMAGE_SIZE)),
            )
            .map_err(|e| DetectorError::ModelLoad(format!("input fact: {}", e)))?
            .into_optimized()
            .map_err(|e| DetectorError::ModelLoad(format!("optimize: {}", e)))?
            .into_runnable()
            .map_err(|e| DetectorError::ModelLoad(format!("make runnable: {}", e)))?;

        log::info!("model loaded successfully");
        Ok(OnnxDetector { plan })
    }
}

impl Scorer for OnnxDetector {
    fn score(&self, input: &Array4<f32>) -> Result<Vec<f32>, DetectorError> {
        let data: Vec<f32> = input.iter().copied().collect();
        let tensor = tract_ndarray::Array4::from_shape_vec(input.dim(), data)
            .map_err(|e| DetectorError::Scoring(e.to_string()))?
            .into_tensor();

        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| DetectorError::Scoring(e.to_string()))?;

        let logits = outputs[0]
            .to_array_view::<f32>()
            .map_err(|e| DetectorError::Scoring(e.to_string()))?;
        Ok(logits.iter().copied().collect())
    }
}

/// Process-wide immutable context handed to the request handler via
/// `web::Data`. Built once in `main`, shared read-only by all workers.
pub struct AppState {
    pub scorer: Arc<dyn Scorer>,
    pub labels: Vec<String>,
}

impl AppState {
    pub fn new(scorer: Arc<dyn Scorer>) -> Self {
        AppState {
            scorer,
            labels: labels(),
        }
    }
}
