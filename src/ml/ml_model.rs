//! 手書き文字分類用のCNNモデル
//!
//! 1チャンネル28x28の画像を36クラス ('0'〜'9', 'A'〜'Z') に分類します。

use anyhow::Result;
use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        loss::CrossEntropyLossConfig,
        pool::{MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig, Relu,
    },
    tensor::{backend::Backend, Int, Tensor},
    train::ClassificationOutput,
};

/// モデル設定
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// 分類クラス数
    pub num_classes: usize,
    /// 入力画像サイズ（正方形）
    #[config(default = 28)]
    pub image_size: usize,
}

impl ModelConfig {
    /// モデルを初期化
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<GlyphClassifier<B>> {
        // Conv (3x3, no padding) で -2、Pool (2x2) で半分（切り捨て）
        let after_conv1 = self.image_size.saturating_sub(2);
        let after_pool1 = after_conv1 / 2;
        let after_conv2 = after_pool1.saturating_sub(2);
        let after_pool2 = after_conv2 / 2;
        let feature_map_size = after_pool2.saturating_sub(2);

        if feature_map_size == 0 {
            anyhow::bail!("入力サイズが小さすぎます: {} (最小14x14が必要)", self.image_size);
        }

        // 28x28入力では 128 * 3 * 3 = 1152
        let d = 128 * feature_map_size * feature_map_size;
        let d_half = d / 2;

        log::debug!(
            "[Model] 入力 {}x{} -> Conv3後 128x{}x{} -> FC {} -> {} -> {}",
            self.image_size,
            self.image_size,
            feature_map_size,
            feature_map_size,
            d,
            d_half,
            self.num_classes
        );

        Ok(GlyphClassifier {
            conv1: Conv2dConfig::new([1, 32], [3, 3]).with_stride([1, 1]).init(device),
            pool1: MaxPool2dConfig::new([2, 2]).init(),
            conv2: Conv2dConfig::new([32, 64], [3, 3]).with_stride([1, 1]).init(device),
            pool2: MaxPool2dConfig::new([2, 2]).init(),
            conv3: Conv2dConfig::new([64, 128], [3, 3]).with_stride([1, 1]).init(device),
            fc1: LinearConfig::new(d, d_half).init(device),
            fc2: LinearConfig::new(d_half, self.num_classes).init(device),
            activation: Relu::new(),
        })
    }
}

/// 手書き文字分類用CNNモデル
///
/// # アーキテクチャ
/// - {Conv 3x3 + ReLU + MaxPool 2x2} x 2層
/// - Conv 3x3 + ReLU
/// - Flatten
/// - FC: d -> d/2 + ReLU
/// - FC: d/2 -> num_classes
#[derive(Module, Debug)]
pub struct GlyphClassifier<B: Backend> {
    conv1: Conv2d<B>, // 1 -> 32
    pool1: MaxPool2d,
    conv2: Conv2d<B>, // 32 -> 64
    pool2: MaxPool2d,
    conv3: Conv2d<B>, // 64 -> 128

    fc1: Linear<B>,
    fc2: Linear<B>,

    activation: Relu,
}

impl<B: Backend> GlyphClassifier<B> {
    /// 順伝播
    ///
    /// - `images`: [batch_size, 1, 28, 28]
    /// - 戻り値: クラスごとのロジット [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch_size, _, _, _] = images.dims();

        let x = self.conv1.forward(images);
        let x = self.activation.forward(x);
        let x = self.pool1.forward(x);

        let x = self.conv2.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool2.forward(x);

        let x = self.conv3.forward(x);
        let x = self.activation.forward(x);

        let [_, c, h, w] = x.dims();
        let x = x.reshape([batch_size, c * h * w]);

        let x = self.fc1.forward(x);
        let x = self.activation.forward(x);

        self.fc2.forward(x)
    }

    /// 順伝播と損失計算（外部の学習パイプライン用）
    pub fn forward_classification(
        &self,
        images: Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let output = self.forward(images);
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput::new(loss, output, targets)
    }
}
