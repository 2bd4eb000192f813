//! 描画キャンバスとの境界
//!
//! 描画ウィジェットはRGBAビットマップとキャンバス世代番号を渡してくる。
//! ブラウザのキャンバスは `data:image/png;base64,...` 形式で出力するため、その形式も受け付ける。

pub mod blank;
pub mod normalize;

pub use blank::is_blank;
pub use normalize::{
    downsample_to_grid, normalize, resize_area, to_grayscale, GlyphTensor, InputRange,
};

use anyhow::{Context, Result};
use base64::Engine;
use image::RgbaImage;
use std::path::Path;

/// 描画面から取得したキャンバスの内容
#[derive(Debug, Clone)]
pub struct CanvasSnapshot {
    /// 描画面がまだ何も出力していない場合は None
    pub bitmap: Option<RgbaImage>,
    /// この内容を出力した描画面の世代番号
    pub generation: u64,
}

impl CanvasSnapshot {
    pub fn new(bitmap: RgbaImage, generation: u64) -> Self {
        Self {
            bitmap: Some(bitmap),
            generation,
        }
    }

    pub fn empty(generation: u64) -> Self {
        Self {
            bitmap: None,
            generation,
        }
    }

    pub fn from_image_bytes(bytes: &[u8], generation: u64) -> Result<Self> {
        let bitmap = image::load_from_memory(bytes)
            .context("Failed to decode canvas image")?
            .to_rgba8();
        Ok(Self::new(bitmap, generation))
    }

    pub fn from_file<P: AsRef<Path>>(path: P, generation: u64) -> Result<Self> {
        let path = path.as_ref();
        let bitmap = image::open(path)
            .with_context(|| format!("Failed to open canvas image: {}", path.display()))?
            .to_rgba8();
        Ok(Self::new(bitmap, generation))
    }

    /// `data:image/png;base64,...` 形式のURLからデコード
    pub fn from_data_url(url: &str, generation: u64) -> Result<Self> {
        let (header, payload) = url
            .split_once(',')
            .context("Data URL has no payload separator")?;
        if !header.starts_with("data:image/") || !header.ends_with(";base64") {
            anyhow::bail!("Unsupported data URL header: {}", header);
        }

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .context("Failed to decode base64 canvas payload")?;
        Self::from_image_bytes(&bytes, generation)
    }

    pub fn is_blank(&self) -> bool {
        is_blank(self.bitmap.as_ref())
    }
}
