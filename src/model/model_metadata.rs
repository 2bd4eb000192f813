//! モデルメタデータの定義
//!
//! 分類器アーカイブ (tar.gz) 内の `metadata.json` に保存される。
//! 推論側はここに記録されたラベル順・入力形状・入力値の範囲に従う。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::canvas::InputRange;
use crate::label::Label;
use crate::types::GRID_SIZE;

/// モデルメタデータ
///
/// tar.gz形式で保存される情報：
/// - metadata.json: このメタデータ（JSON形式）
/// - model.bin: モデルの重み（バイナリ）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// クラス番号順のラベル（"0"〜"9", "A"〜"Z"）
    pub class_labels: Vec<String>,

    /// モデル入力サイズ（正方形、通常28）
    pub input_size: u32,

    /// 入力チャンネル数（グレースケールなので1）
    pub input_channels: u32,

    /// 学習時の入力値の範囲。古いアーカイブには無いので既定値は [0, 1]
    #[serde(default)]
    pub input_range: InputRange,

    /// モデルの学習時刻（ISO8601形式）
    pub trained_at: String,

    #[serde(default)]
    pub description: Option<String>,
}

impl ModelMetadata {
    /// 36文字のアルファベット順ラベルでメタデータを作成
    pub fn for_alphabet(input_range: InputRange) -> Self {
        Self {
            class_labels: Label::all().map(|l| l.to_string()).collect(),
            input_size: GRID_SIZE,
            input_channels: 1,
            input_range,
            trained_at: chrono::Local::now().to_rfc3339(),
            description: None,
        }
    }

    /// メタデータをJSON文字列に変換
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize metadata to JSON")
    }

    /// JSON文字列からメタデータを生成
    pub fn from_json_string(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize metadata from JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alphabet_metadata() {
        let metadata = ModelMetadata::for_alphabet(InputRange::Byte);
        assert_eq!(metadata.class_labels.len(), 36);
        assert_eq!(metadata.class_labels[0], "0");
        assert_eq!(metadata.class_labels[10], "A");
        assert_eq!(metadata.input_size, 28);

        let json = metadata.to_json_string().unwrap();
        assert!(json.contains("\"input_range\": \"byte\""));
        assert_eq!(ModelMetadata::from_json_string(&json).unwrap(), metadata);
    }

    #[test]
    fn test_missing_input_range_defaults_to_unit() {
        let json = r#"{
            "class_labels": ["0"],
            "input_size": 28,
            "input_channels": 1,
            "trained_at": "2024-01-01T00:00:00+09:00"
        }"#;
        let metadata = ModelMetadata::from_json_string(json).unwrap();
        assert_eq!(metadata.input_range, InputRange::Unit);
        assert!(metadata.description.is_none());
    }
}
