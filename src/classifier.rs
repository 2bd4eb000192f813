//! 推論アダプタ
//!
//! 凍結済みの分類器を `classify(grid) -> Label` の1呼び出しに包む。
//! リトライはしない。分類器の失敗や不正な出力は既定ラベルで誤魔化さずにエラーとして返す。

use image::GrayImage;
use std::sync::Arc;

use crate::canvas::{GlyphTensor, InputRange};
use crate::error::FeedbackError;
use crate::label::{Label, NUM_CLASSES};
use crate::types::GRID_SIZE;

/// 凍結済み分類器の契約
///
/// 入力は1チャンネル28x28のテンソル1枚、出力は36クラス分の確率ベクトル。
/// 読み込み後は読み取り専用で、複数セッションから共有される。
pub trait Classifier: Send + Sync {
    fn predict(&self, input: &GlyphTensor) -> anyhow::Result<Vec<f32>>;
}

/// 最大値のインデックス（同値の場合は先頭）
pub fn argmax(values: &[f32]) -> Result<usize, FeedbackError> {
    if values.len() != NUM_CLASSES {
        return Err(FeedbackError::MalformedOutput {
            message: format!("expected {} scores, got {}", NUM_CLASSES, values.len()),
        });
    }
    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(FeedbackError::MalformedOutput {
            message: format!("score {} is not finite ({})", index, values[index]),
        });
    }

    let mut best = 0;
    for (i, &value) in values.iter().enumerate().skip(1) {
        if value > values[best] {
            best = i;
        }
    }
    Ok(best)
}

pub struct InferenceAdapter {
    classifier: Arc<dyn Classifier>,
    input_range: InputRange,
}

impl InferenceAdapter {
    pub fn new(classifier: Arc<dyn Classifier>, input_range: InputRange) -> Self {
        Self {
            classifier,
            input_range,
        }
    }

    /// 28x28グリッドを分類してラベルを返す
    pub fn classify(&self, grid: &GrayImage) -> Result<Label, FeedbackError> {
        let (width, height) = grid.dimensions();
        if width != GRID_SIZE || height != GRID_SIZE {
            return Err(FeedbackError::InvalidTensor {
                expected: GRID_SIZE,
                width,
                height,
            });
        }

        let tensor = GlyphTensor::from_grid(grid, self.input_range);
        let scores = self
            .classifier
            .predict(&tensor)
            .map_err(|e| FeedbackError::ClassifierFailed(e.into()))?;

        let index = argmax(&scores)?;
        let label = Label::from_index(index).ok_or_else(|| FeedbackError::MalformedOutput {
            message: format!("class index {} is out of range", index),
        })?;

        log::debug!("[Inference] 予測: {} (index {}, score {:.4})", label, index, scores[index]);
        Ok(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_support::{FailingClassifier, FixedClassifier};
    use image::Luma;
    use std::sync::Mutex;

    /// 渡されたテンソルを記録する分類器
    struct RecordingClassifier {
        seen: Mutex<Vec<Vec<f32>>>,
    }

    impl Classifier for RecordingClassifier {
        fn predict(&self, input: &GlyphTensor) -> anyhow::Result<Vec<f32>> {
            self.seen.lock().unwrap().push(input.as_slice().to_vec());
            let mut scores = vec![0.0; NUM_CLASSES];
            scores[0] = 1.0;
            Ok(scores)
        }
    }

    fn grid(value: u8) -> GrayImage {
        GrayImage::from_pixel(GRID_SIZE, GRID_SIZE, Luma([value]))
    }

    #[test]
    fn test_classify_maps_argmax_to_label() {
        let adapter = InferenceAdapter::new(Arc::new(FixedClassifier::new(17)), InputRange::Unit);
        assert_eq!(adapter.classify(&grid(0)).unwrap().symbol(), 'H');

        let adapter = InferenceAdapter::new(Arc::new(FixedClassifier::new(7)), InputRange::Unit);
        assert_eq!(adapter.classify(&grid(0)).unwrap().symbol(), '7');
    }

    #[test]
    fn test_classifier_receives_rescaled_tensor() {
        let classifier = Arc::new(RecordingClassifier {
            seen: Mutex::new(Vec::new()),
        });
        let adapter = InferenceAdapter::new(classifier.clone(), InputRange::Unit);
        adapter.classify(&grid(255)).unwrap();

        let seen = classifier.seen.lock().unwrap();
        assert_eq!(seen.len(), 1, "classifier must be invoked exactly once");
        assert_eq!(seen[0].len(), 784);
        assert!(seen[0].iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_argmax_prefers_first_maximum() {
        let mut scores = vec![0.0; NUM_CLASSES];
        scores[4] = 0.5;
        scores[9] = 0.5;
        assert_eq!(argmax(&scores).unwrap(), 4);
    }

    #[test]
    fn test_malformed_output_is_an_inference_error() {
        let err = argmax(&[0.1, 0.9]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Inference);

        let mut scores = vec![0.0; NUM_CLASSES];
        scores[3] = f32::NAN;
        assert!(matches!(
            argmax(&scores).unwrap_err(),
            FeedbackError::MalformedOutput { .. }
        ));
    }

    #[test]
    fn test_classifier_failure_propagates() {
        let adapter = InferenceAdapter::new(Arc::new(FailingClassifier), InputRange::Unit);
        let err = adapter.classify(&grid(0)).unwrap_err();
        assert!(matches!(err, FeedbackError::ClassifierFailed(_)));
        assert_eq!(err.kind(), ErrorKind::Inference);
    }

    #[test]
    fn test_wrong_grid_size_is_rejected() {
        let adapter = InferenceAdapter::new(Arc::new(FixedClassifier::new(0)), InputRange::Unit);
        let err = adapter.classify(&GrayImage::new(600, 600)).unwrap_err();
        assert!(matches!(
            err,
            FeedbackError::InvalidTensor { expected: 28, width: 600, height: 600 }
        ));
    }
}
