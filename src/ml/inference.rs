//! モデル推論機能

use anyhow::{Context, Result};
use burn::{
    backend::Wgpu,
    module::Module,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{activation::softmax, backend::Backend, Tensor},
};
use burn_ndarray::{NdArray, NdArrayDevice};
use burn_wgpu::WgpuDevice;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use crate::canvas::GlyphTensor;
use crate::classifier::Classifier;
use crate::label::NUM_CLASSES;
use crate::ml::{GlyphClassifier, ModelConfig};
use crate::model::{load_model_with_metadata, DeviceType, InferenceConfig};

/// 特定のバックエンドに載せた分類モデル
pub struct BurnClassifier<B: Backend> {
    model: Mutex<GlyphClassifier<B>>,
    device: B::Device,
}

impl<B: Backend> BurnClassifier<B> {
    /// アーカイブの重みを復元する
    fn from_weights(model_binary: Vec<u8>, config: &InferenceConfig, device: B::Device) -> Result<Self> {
        let model = ModelConfig::new(NUM_CLASSES)
            .with_image_size(config.input_size as usize)
            .init::<B>(&device)?;

        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let record = recorder
            .load(model_binary, &device)
            .map_err(|e| anyhow::anyhow!("モデル重みの読み込みエラー: {:?}", e))?;

        Ok(Self {
            model: Mutex::new(model.load_record(record)),
            device,
        })
    }

    fn predict_scores(&self, input: &GlyphTensor) -> Result<Vec<f32>> {
        let (width, height) = input.dimensions();
        let tensor = Tensor::<B, 1>::from_floats(input.as_slice(), &self.device)
            .reshape([1, 1, height as usize, width as usize]);

        let model = self.model.lock().unwrap_or_else(PoisonError::into_inner);
        let probabilities = softmax(model.forward(tensor), 1);

        probabilities
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("推論結果の取得エラー: {:?}", e))
    }
}

/// 推論エンジン
pub enum InferenceEngine {
    Wgpu(BurnClassifier<Wgpu>),
    NdArray(BurnClassifier<NdArray<f32>>),
}

impl InferenceEngine {
    /// モデルを読み込んで推論エンジンを初期化
    ///
    /// メタデータのラベル順・入力形状がこのクレートと一致しない場合はエラー。
    pub fn load<P: AsRef<Path>>(model_path: P, device_type: &DeviceType) -> Result<(Self, InferenceConfig)> {
        let model_path = model_path.as_ref();
        let (metadata, model_binary) = load_model_with_metadata(model_path)
            .with_context(|| format!("Failed to load classifier: {}", model_path.display()))?;
        let config = InferenceConfig::from_metadata(&metadata)
            .with_context(|| format!("Model {} is incompatible", model_path.display()))?;

        let engine = match device_type {
            DeviceType::Wgpu => InferenceEngine::Wgpu(BurnClassifier::from_weights(
                model_binary,
                &config,
                WgpuDevice::default(),
            )?),
            DeviceType::Cpu => InferenceEngine::NdArray(BurnClassifier::from_weights(
                model_binary,
                &config,
                NdArrayDevice::Cpu,
            )?),
        };

        log::info!(
            "[Inference] モデルを読み込みました: {} ({}, 学習日時 {})",
            model_path.display(),
            device_type,
            config.trained_at
        );
        Ok((engine, config))
    }
}

impl Classifier for InferenceEngine {
    fn predict(&self, input: &GlyphTensor) -> Result<Vec<f32>> {
        match self {
            InferenceEngine::Wgpu(classifier) => classifier.predict_scores(input),
            InferenceEngine::NdArray(classifier) => classifier.predict_scores(input),
        }
    }
}
