//! 1ユーザー分のフィードバックセッション
//!
//! 描画 → 予測 → 確認/訂正 → やり直し の有限状態機械。
//! 予測待ちの段階だけが画像と予測ラベルを持つため、予測の無い状態での訂正は表現できない。
//!
//! | 段階 | 許可される操作 |
//! |------|----------------|
//! | `Drawing` | Predict, StartOver |
//! | `AwaitingFeedback` | ConfirmCorrect, SubmitCorrection, StartOver |
//!
//! 許可されない操作はエラーを返し、状態は変化しない。

use image::GrayImage;

use crate::canvas::{downsample_to_grid, to_grayscale, CanvasSnapshot};
use crate::classifier::InferenceAdapter;
use crate::error::{ErrorKind, FeedbackError};
use crate::feedback::{FeedbackStore, SubmitOutcome};
use crate::label::Label;
use crate::types::SessionStage;
use crate::AppState;

/// 予測済みでユーザーの判定を待っている内容
#[derive(Debug, Clone)]
struct PendingPrediction {
    /// 予測時に取得したフル解像度のグレースケール画像
    bitmap: GrayImage,
    predicted: Label,
    /// この画像について既に送信した訂正ラベル
    submitted: Option<Label>,
}

#[derive(Debug, Clone)]
enum Stage {
    Drawing,
    AwaitingFeedback(PendingPrediction),
}

/// セッション状態（永続化しない）
#[derive(Debug, Clone)]
pub struct FeedbackSession {
    stage: Stage,
    canvas_generation: u64,
}

impl Default for FeedbackSession {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedbackSession {
    pub fn new() -> Self {
        Self {
            stage: Stage::Drawing,
            canvas_generation: 0,
        }
    }

    pub fn stage(&self) -> SessionStage {
        match self.stage {
            Stage::Drawing => SessionStage::Drawing,
            Stage::AwaitingFeedback(_) => SessionStage::AwaitingFeedback,
        }
    }

    pub fn predicted_label(&self) -> Option<Label> {
        match &self.stage {
            Stage::AwaitingFeedback(pending) => Some(pending.predicted),
            Stage::Drawing => None,
        }
    }

    pub fn raw_bitmap(&self) -> Option<&GrayImage> {
        match &self.stage {
            Stage::AwaitingFeedback(pending) => Some(&pending.bitmap),
            Stage::Drawing => None,
        }
    }

    /// 描画面を作り直すための世代番号。やり直すたびに増える
    pub fn canvas_generation(&self) -> u64 {
        self.canvas_generation
    }

    fn illegal(&self, action: &'static str) -> FeedbackError {
        FeedbackError::IllegalAction {
            action,
            stage: self.stage(),
        }
    }

    /// キャンバスを分類する（描画中のみ）
    ///
    /// 空のキャンバスでは分類器を呼ばずに `BlankCanvas` を返す。失敗時は状態を変えない。
    pub fn predict(
        &mut self,
        snapshot: &CanvasSnapshot,
        adapter: &InferenceAdapter,
    ) -> Result<Label, FeedbackError> {
        if !matches!(self.stage, Stage::Drawing) {
            return Err(self.illegal("predict"));
        }
        if snapshot.generation != self.canvas_generation {
            return Err(FeedbackError::StaleCanvas {
                expected: self.canvas_generation,
                actual: snapshot.generation,
            });
        }
        let rgba = match &snapshot.bitmap {
            Some(rgba) if !snapshot.is_blank() => rgba,
            _ => return Err(FeedbackError::BlankCanvas),
        };

        let bitmap = to_grayscale(rgba);
        let grid = downsample_to_grid(&bitmap)?;
        let predicted = adapter.classify(&grid)?;
        log::info!(
            "[Session] 予測: {} (キャンバス {}x{}, 世代 {})",
            predicted,
            bitmap.width(),
            bitmap.height(),
            self.canvas_generation
        );

        self.stage = Stage::AwaitingFeedback(PendingPrediction {
            bitmap,
            predicted,
            submitted: None,
        });
        Ok(predicted)
    }

    /// 予測が正しかったことを確認する
    pub fn confirm_correct(&self) -> Result<Label, FeedbackError> {
        match &self.stage {
            Stage::AwaitingFeedback(pending) => {
                log::info!("[Session] 予測 {} が正しいと確認されました", pending.predicted);
                Ok(pending.predicted)
            }
            Stage::Drawing => Err(self.illegal("confirm_correct")),
        }
    }

    /// 訂正ラベルを送信してデータセットに追加する
    ///
    /// 1枚の画像につき受け付ける訂正は1回だけ。段階は変化しない。
    pub fn submit_correction(
        &mut self,
        input: &str,
        store: &FeedbackStore,
    ) -> Result<SubmitOutcome, FeedbackError> {
        let stage = self.stage();
        let Stage::AwaitingFeedback(pending) = &mut self.stage else {
            return Err(FeedbackError::IllegalAction {
                action: "submit_correction",
                stage,
            });
        };

        let label = Label::parse(input)?;
        if let Some(previous) = pending.submitted {
            return Err(FeedbackError::AlreadySubmitted { label: previous });
        }

        let outcome = store.submit(&pending.bitmap, label)?;
        pending.submitted = Some(label);
        log::info!(
            "[Session] 訂正 {} -> {} (保存{})",
            pending.predicted,
            label,
            if outcome.success() { "成功" } else { "失敗" }
        );
        Ok(outcome)
    }

    /// 画像と予測を破棄して描画に戻る。新しい世代番号を返す
    pub fn start_over(&mut self) -> u64 {
        self.stage = Stage::Drawing;
        self.canvas_generation += 1;
        log::debug!("[Session] やり直し (世代 {})", self.canvas_generation);
        self.canvas_generation
    }

    /// ユーザー操作を1つ処理する
    pub fn handle(&mut self, action: SessionAction, state: &AppState) -> SessionResponse {
        let result = match action {
            SessionAction::Predict(snapshot) => self
                .predict(&snapshot, state.inference())
                .map(|label| SessionResponse::Prediction { label }),
            SessionAction::ConfirmCorrect => self
                .confirm_correct()
                .map(|label| SessionResponse::Confirmed { label }),
            SessionAction::SubmitCorrection(input) => self
                .submit_correction(&input, state.store())
                .map(SessionResponse::Submitted),
            SessionAction::StartOver => Ok(SessionResponse::Reset {
                canvas_generation: self.start_over(),
            }),
        };

        result.unwrap_or_else(|e| {
            if e.kind() == ErrorKind::Input {
                log::debug!("[Session] 入力エラー: {}", e);
                SessionResponse::Warning(e)
            } else {
                log::error!("[Session] {}", e.detailed());
                SessionResponse::Error(e)
            }
        })
    }
}

/// ユーザー操作
#[derive(Debug, Clone)]
pub enum SessionAction {
    Predict(CanvasSnapshot),
    ConfirmCorrect,
    SubmitCorrection(String),
    StartOver,
}

/// 操作の結果として画面に出すもの
#[derive(Debug)]
pub enum SessionResponse {
    Prediction { label: Label },
    Confirmed { label: Label },
    Submitted(SubmitOutcome),
    Reset { canvas_generation: u64 },
    /// 入力の誤り。状態は変化していない
    Warning(FeedbackError),
    Error(FeedbackError),
}

impl SessionResponse {
    pub fn message(&self) -> String {
        match self {
            SessionResponse::Prediction { label } => format!("Predicted Character: {}", label),
            SessionResponse::Confirmed { .. } => "Great! The prediction was correct.".to_string(),
            SessionResponse::Submitted(outcome) => outcome.message(),
            SessionResponse::Reset { .. } => "Canvas cleared. Draw a new character.".to_string(),
            SessionResponse::Warning(e) | SessionResponse::Error(e) => e.user_message(),
        }
    }
}
