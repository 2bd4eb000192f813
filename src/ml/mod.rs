pub mod dataset;
pub mod inference;
pub mod ml_model;

pub use dataset::{GlyphBatch, GlyphBatcher};
pub use inference::{BurnClassifier, InferenceEngine};
pub use ml_model::{GlyphClassifier, ModelConfig};

use std::path::Path;
use std::sync::Arc;

use crate::canvas::InputRange;
use crate::classifier::Classifier;
use crate::model::AppConfig;

/// 設定に従って分類器を読み込む
pub fn load_classifier(config: &AppConfig) -> anyhow::Result<(Arc<dyn Classifier>, InputRange)> {
    let (engine, inference_config) =
        InferenceEngine::load(Path::new(&config.model.model_path), &config.device_type)?;
    Ok((Arc::new(engine), inference_config.input_range))
}
