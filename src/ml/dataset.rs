//! 収集したフィードバックをburnの学習パイプラインに渡すためのデータセット

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    tensor::{backend::Backend, Int, Tensor},
};

use crate::canvas::InputRange;
use crate::types::{FeedbackDataset, Sample, GRID_SIZE, PIXEL_COUNT};

impl Dataset<Sample> for FeedbackDataset {
    fn get(&self, index: usize) -> Option<Sample> {
        FeedbackDataset::get(self, index).cloned()
    }

    fn len(&self) -> usize {
        FeedbackDataset::len(self)
    }
}

/// バッチデータ
#[derive(Clone, Debug)]
pub struct GlyphBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub targets: Tensor<B, 1, Int>,
}

/// バッチャー
#[derive(Clone, Debug)]
pub struct GlyphBatcher {
    input_range: InputRange,
}

impl GlyphBatcher {
    pub fn new(input_range: InputRange) -> Self {
        Self { input_range }
    }
}

impl<B: Backend> Batcher<B, Sample, GlyphBatch<B>> for GlyphBatcher {
    fn batch(&self, items: Vec<Sample>, device: &B::Device) -> GlyphBatch<B> {
        let batch_size = items.len();
        let mut all_pixels = Vec::with_capacity(batch_size * PIXEL_COUNT);
        let mut targets_vec = Vec::with_capacity(batch_size);

        for item in &items {
            all_pixels.extend(item.pixels().iter().map(|&p| match self.input_range {
                InputRange::Unit => p as f32 / 255.0,
                InputRange::Byte => p as f32,
            }));
            targets_vec.push(item.class_index() as i64);
        }

        let size = GRID_SIZE as usize;
        let images = Tensor::<B, 1>::from_floats(all_pixels.as_slice(), device)
            .reshape([batch_size, 1, size, size]);
        let targets = Tensor::<B, 1, Int>::from_ints(targets_vec.as_slice(), device);

        GlyphBatch { images, targets }
    }
}
