//! フィードバックパイプラインのエラー分類
//!
//! ユーザーに見える失敗は4種類に分類される:
//! - `Input`: 空のキャンバス、不正なラベル、現在の段階で許可されない操作など。状態は変化しない
//! - `Inference`: 分類器の呼び出し失敗、出力形式の異常。そのPredictのみ失敗する
//! - `Persistence`: データセット／監査レコードの書き込み失敗
//! - `Sync`: リモート同期の失敗。常に非致命的で、ローカル保存は有効なまま

use std::path::PathBuf;
use thiserror::Error;

use crate::feedback::SyncError;
use crate::label::Label;
use crate::types::SessionStage;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// エラーの大分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Inference,
    Persistence,
    Sync,
}

#[derive(Error, Debug)]
pub enum FeedbackError {
    #[error("the canvas is empty")]
    BlankCanvas,

    #[error("canvas generation {actual} is stale (current generation is {expected})")]
    StaleCanvas { expected: u64, actual: u64 },

    #[error("invalid label {input:?}: expected a single character 0-9 or A-Z")]
    InvalidLabel { input: String },

    #[error("invalid bitmap: {message}")]
    InvalidBitmap { message: String },

    #[error("invalid sample: expected {expected} pixels, got {actual}")]
    InvalidSample { expected: usize, actual: usize },

    #[error("{action} is not allowed while the session is {stage}")]
    IllegalAction {
        action: &'static str,
        stage: SessionStage,
    },

    #[error("feedback for this glyph was already submitted as {label}")]
    AlreadySubmitted { label: Label },

    #[error("classifier input must be {expected}x{expected}, got {width}x{height}")]
    InvalidTensor {
        expected: u32,
        width: u32,
        height: u32,
    },

    #[error("classifier invocation failed")]
    ClassifierFailed(#[source] BoxError),

    #[error("classifier produced a malformed output: {message}")]
    MalformedOutput { message: String },

    #[error("failed to write dataset {}", .path.display())]
    DatasetWrite {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("failed to write audit record in {}", .dir.display())]
    AuditWrite {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl FeedbackError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FeedbackError::BlankCanvas
            | FeedbackError::StaleCanvas { .. }
            | FeedbackError::InvalidLabel { .. }
            | FeedbackError::InvalidBitmap { .. }
            | FeedbackError::InvalidSample { .. }
            | FeedbackError::IllegalAction { .. }
            | FeedbackError::AlreadySubmitted { .. } => ErrorKind::Input,
            FeedbackError::InvalidTensor { .. }
            | FeedbackError::ClassifierFailed(_)
            | FeedbackError::MalformedOutput { .. } => ErrorKind::Inference,
            FeedbackError::DatasetWrite { .. } | FeedbackError::AuditWrite { .. } => {
                ErrorKind::Persistence
            }
            FeedbackError::Sync(_) => ErrorKind::Sync,
        }
    }

    /// 原因を含めた1行の説明
    pub fn detailed(&self) -> String {
        let mut text = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            text.push_str(": ");
            text.push_str(&cause.to_string());
            source = cause.source();
        }
        text
    }

    /// 画面に表示する文言
    pub fn user_message(&self) -> String {
        match self {
            FeedbackError::BlankCanvas => {
                "The canvas is empty. Please draw something before predicting.".to_string()
            }
            FeedbackError::InvalidLabel { .. } => {
                "Please enter a valid single character (0-9 or A-Z).".to_string()
            }
            FeedbackError::AlreadySubmitted { label } => format!(
                "Feedback for this glyph was already recorded as {}. Start over to draw a new one.",
                label
            ),
            FeedbackError::StaleCanvas { .. } => {
                "The canvas was reset. Please draw the glyph again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(FeedbackError::BlankCanvas.kind(), ErrorKind::Input);
        assert_eq!(
            FeedbackError::InvalidLabel { input: "$".into() }.kind(),
            ErrorKind::Input
        );
        assert_eq!(
            FeedbackError::MalformedOutput { message: "x".into() }.kind(),
            ErrorKind::Inference
        );
        assert_eq!(
            FeedbackError::AuditWrite {
                dir: PathBuf::from("log"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            }
            .kind(),
            ErrorKind::Persistence
        );
        assert_eq!(
            FeedbackError::from(SyncError::new("offline")).kind(),
            ErrorKind::Sync
        );
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            FeedbackError::BlankCanvas.user_message(),
            "The canvas is empty. Please draw something before predicting."
        );
        assert_eq!(
            FeedbackError::InvalidLabel { input: "AB".into() }.user_message(),
            "Please enter a valid single character (0-9 or A-Z)."
        );
    }
}
