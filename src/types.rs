use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::FeedbackError;
use crate::label::Label;

/// 分類器の入力グリッドの一辺（ピクセル）
pub const GRID_SIZE: u32 = 28;

/// 1サンプルあたりのピクセル数 (28x28)
pub const PIXEL_COUNT: usize = (GRID_SIZE * GRID_SIZE) as usize;

/// ラベル付き学習サンプル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pixels: Vec<u8>, // 行優先で平坦化した28x28グレースケール
    label: Label,
}

impl Sample {
    pub fn new(pixels: Vec<u8>, label: Label) -> Result<Self, FeedbackError> {
        if pixels.len() != PIXEL_COUNT {
            return Err(FeedbackError::InvalidSample {
                expected: PIXEL_COUNT,
                actual: pixels.len(),
            });
        }
        Ok(Self { pixels, label })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn label(&self) -> Label {
        self.label
    }

    /// CSVの `class` 列に書き込む値
    pub fn class_index(&self) -> usize {
        self.label.index()
    }
}

/// 追記専用のフィードバックデータセット
///
/// 挿入順がそのまま履歴になる。削除・並べ替え・書き換えのAPIは持たない。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedbackDataset {
    samples: Vec<Sample>,
}

impl FeedbackDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_samples(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub(crate) fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }
}

/// セッションの段階
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStage {
    Drawing,          // 描画中（初期状態）
    AwaitingFeedback, // 予測表示後、ユーザーの判定待ち
}

impl fmt::Display for SessionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStage::Drawing => write!(f, "drawing"),
            SessionStage::AwaitingFeedback => write!(f, "awaiting_feedback"),
        }
    }
}

/// フィードバック1件ごとの監査レコード（外部での再生・デバッグ用、読み戻さない）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: String, // ISO-8601
    pub label: String,
    pub pixels: Vec<u8>,
    pub label_index: usize,
}

impl AuditRecord {
    pub fn new(sample: &Sample, at: DateTime<Local>) -> Self {
        Self {
            timestamp: at.to_rfc3339(),
            label: sample.label().to_string(),
            pixels: sample.pixels().to_vec(),
            label_index: sample.class_index(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_requires_784_pixels() {
        let label = Label::from_index(3).unwrap();
        assert!(Sample::new(vec![0; PIXEL_COUNT], label).is_ok());

        let err = Sample::new(vec![0; 783], label).unwrap_err();
        assert!(matches!(
            err,
            FeedbackError::InvalidSample { expected: 784, actual: 783 }
        ));
    }

    #[test]
    fn test_audit_record_fields() {
        let label = Label::parse("K").unwrap();
        let sample = Sample::new(vec![9; PIXEL_COUNT], label).unwrap();
        let record = AuditRecord::new(&sample, Local::now());

        assert_eq!(record.label, "K");
        assert_eq!(record.label_index, 20);
        assert_eq!(record.pixels.len(), PIXEL_COUNT);
        assert!(DateTime::parse_from_rfc3339(&record.timestamp).is_ok());
    }

    #[test]
    fn test_session_stage_display() {
        assert_eq!(format!("{}", SessionStage::Drawing), "drawing");
        assert_eq!(format!("{}", SessionStage::AwaitingFeedback), "awaiting_feedback");
    }
}
