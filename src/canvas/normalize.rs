//! キャンバス画像の正規化
//!
//! RGBAビットマップ → グレースケール → 面積平均で28x28に縮小 → 分類器入力。
//! 面積平均は1ピクセル幅の細い線を縮小後も残すために使う（最近傍や双線形では消える）。

use image::{GrayImage, Luma, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::FeedbackError;
use crate::types::GRID_SIZE;

/// 分類器が期待する入力値の範囲
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputRange {
    /// 255で割って [0, 1] にする
    #[default]
    Unit,
    /// 0〜255のまま渡す
    Byte,
}

/// RGBAをグレースケールに変換（ITU-R 601-2、アルファは無視）
pub fn to_grayscale(bitmap: &RgbaImage) -> GrayImage {
    let (width, height) = bitmap.dimensions();
    let mut gray = GrayImage::new(width, height);

    for (src, dst) in bitmap.pixels().zip(gray.pixels_mut()) {
        let [r, g, b, _] = src.0;
        // L = R*299/1000 + G*587/1000 + B*114/1000 の16bit固定小数点版
        let luma = (r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16;
        *dst = Luma([luma as u8]);
    }

    gray
}

/// 出力1画素が覆う入力画素とその重み（重みの合計は1）
fn area_weights(src_len: u32, dst_len: u32) -> Vec<Vec<(u32, f64)>> {
    let scale = src_len as f64 / dst_len as f64;

    (0..dst_len)
        .map(|d| {
            let start = d as f64 * scale;
            let end = start + scale;
            let mut weights = Vec::new();
            let mut s = start.floor() as u32;
            while (s as f64) < end && s < src_len {
                let covered = end.min(s as f64 + 1.0) - start.max(s as f64);
                if covered > 1e-12 {
                    weights.push((s, covered / scale));
                }
                s += 1;
            }
            weights
        })
        .collect()
}

/// 面積平均による縮小
///
/// 各出力画素は、対応する入力領域に含まれる画素の面積加重平均になる。
/// 領域の端で部分的に重なる画素は重なった面積の割合で寄与する。
pub fn resize_area(src: &GrayImage, dst_width: u32, dst_height: u32) -> Result<GrayImage, FeedbackError> {
    let (src_width, src_height) = src.dimensions();
    if src_width == 0 || src_height == 0 {
        return Err(FeedbackError::InvalidBitmap {
            message: format!("bitmap has no pixels ({}x{})", src_width, src_height),
        });
    }
    if dst_width == 0 || dst_height == 0 {
        return Err(FeedbackError::InvalidBitmap {
            message: format!("target size must be non-zero ({}x{})", dst_width, dst_height),
        });
    }

    let x_weights = area_weights(src_width, dst_width);
    let y_weights = area_weights(src_height, dst_height);
    let mut dst = GrayImage::new(dst_width, dst_height);

    for (dy, row_weights) in y_weights.iter().enumerate() {
        for (dx, col_weights) in x_weights.iter().enumerate() {
            let mut acc = 0.0f64;
            for &(sy, wy) in row_weights {
                for &(sx, wx) in col_weights {
                    acc += src.get_pixel(sx, sy).0[0] as f64 * wy * wx;
                }
            }
            let value = acc.round().clamp(0.0, 255.0) as u8;
            dst.put_pixel(dx as u32, dy as u32, Luma([value]));
        }
    }

    Ok(dst)
}

/// 保存済みのグレースケール画像を28x28グリッドに縮小
pub fn downsample_to_grid(gray: &GrayImage) -> Result<GrayImage, FeedbackError> {
    resize_area(gray, GRID_SIZE, GRID_SIZE)
}

/// RGBAキャンバスを28x28のグレースケールグリッドに正規化
pub fn normalize(bitmap: &RgbaImage) -> Result<GrayImage, FeedbackError> {
    downsample_to_grid(&to_grayscale(bitmap))
}

/// 分類器に渡す1チャンネルのテンソル（行優先）
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphTensor {
    values: Vec<f32>,
    width: u32,
    height: u32,
}

impl GlyphTensor {
    pub fn from_grid(grid: &GrayImage, range: InputRange) -> Self {
        let scale = match range {
            InputRange::Unit => 1.0 / 255.0,
            InputRange::Byte => 1.0,
        };
        let values = grid.as_raw().iter().map(|&v| v as f32 * scale).collect();

        Self {
            values,
            width: grid.width(),
            height: grid.height(),
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// (幅, 高さ)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
