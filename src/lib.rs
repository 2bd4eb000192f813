//! 手書き文字の推論とフィードバック収集
//!
//! キャンバスのRGBA画像を28x28に正規化して分類し、誤った予測にはユーザーの訂正ラベルを付けて
//! 追記専用のデータセットに保存する。保存後はリモートへの同期を1回だけ試みる。

#![recursion_limit = "256"]

pub mod canvas;
pub mod classifier;
pub mod csv_loader;
pub mod error;
pub mod feedback;
pub mod label;
pub mod model;
pub mod session;
pub mod types;

#[cfg(feature = "ml")]
pub mod ml;

#[cfg(test)]
mod test_support;

pub use canvas::CanvasSnapshot;
pub use classifier::{Classifier, InferenceAdapter};
pub use error::{ErrorKind, FeedbackError};
pub use feedback::{FeedbackStore, SubmitOutcome, SyncStatus};
pub use label::Label;
pub use session::{FeedbackSession, SessionAction, SessionResponse};

use std::sync::Arc;

/// プロセス全体で共有する状態
///
/// 分類器は読み込み後は読み取り専用、データセットはストア内のロックで保護される。
/// セッションごとの状態はここに置かず `FeedbackSession` が持つ。
pub struct AppState {
    inference: InferenceAdapter,
    store: Arc<FeedbackStore>,
}

impl AppState {
    pub fn new(inference: InferenceAdapter, store: Arc<FeedbackStore>) -> Self {
        Self { inference, store }
    }

    /// 設定から分類器とデータセットを読み込む。分類器の読み込み失敗は致命的
    #[cfg(feature = "ml")]
    pub fn from_config(config: &model::AppConfig) -> anyhow::Result<Self> {
        use anyhow::Context;

        let (classifier, input_range) =
            ml::load_classifier(config).context("Failed to load the classifier")?;
        let store = FeedbackStore::from_config(config).context("Failed to open the feedback store")?;
        Ok(Self::new(
            InferenceAdapter::new(classifier, input_range),
            Arc::new(store),
        ))
    }

    pub fn inference(&self) -> &InferenceAdapter {
        &self.inference
    }

    pub fn store(&self) -> &FeedbackStore {
        &self.store
    }

    pub fn new_session(&self) -> FeedbackSession {
        FeedbackSession::new()
    }
}
