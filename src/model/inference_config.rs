//! モデルメタデータから推論設定を組み立てる
//!
//! 読み込んだアーカイブがこのクレートの入力形状・ラベル順と一致するかをここで検証する。
//! 一致しないモデルで推論すると、全予測が別の文字にずれるため起動時に拒否する。

use anyhow::Result;

use crate::canvas::InputRange;
use crate::label::{Label, NUM_CLASSES};
use crate::model::model_metadata::ModelMetadata;
use crate::types::GRID_SIZE;

/// 推論に必要な情報
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceConfig {
    pub input_size: u32,
    pub input_range: InputRange,
    pub trained_at: String,
}

impl InferenceConfig {
    /// メタデータを検証してInferenceConfigを作成
    pub fn from_metadata(metadata: &ModelMetadata) -> Result<Self> {
        if metadata.class_labels.len() != NUM_CLASSES {
            anyhow::bail!(
                "Model has {} classes (expected {})",
                metadata.class_labels.len(),
                NUM_CLASSES
            );
        }
        for (index, (actual, expected)) in metadata.class_labels.iter().zip(Label::all()).enumerate() {
            if actual.as_str() != expected.to_string() {
                anyhow::bail!(
                    "Model class {} is labelled {:?} (expected {:?})",
                    index,
                    actual,
                    expected.to_string()
                );
            }
        }
        if metadata.input_size != GRID_SIZE {
            anyhow::bail!(
                "Model input size is {} (expected {})",
                metadata.input_size,
                GRID_SIZE
            );
        }
        if metadata.input_channels != 1 {
            anyhow::bail!(
                "Model expects {} input channels (expected 1)",
                metadata.input_channels
            );
        }

        Ok(Self {
            input_size: metadata.input_size,
            input_range: metadata.input_range,
            trained_at: metadata.trained_at.clone(),
        })
    }

    /// クラスインデックスからラベルを取得
    pub fn class_index_to_label(&self, index: usize) -> Option<Label> {
        Label::from_index(index)
    }
}
