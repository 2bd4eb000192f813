//! フィードバックデータセットのCSV読み書き
//!
//! 列構成: `pixel1..pixel784` (0〜255) + `class` (0〜35)。ヘッダー行あり。
//! 書き込みは同じディレクトリの一時ファイルに全件を書いてからリネームする。

use crate::label::{Label, NUM_CLASSES};
use crate::types::{FeedbackDataset, Sample, PIXEL_COUNT};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

pub const CLASS_COLUMN: &str = "class";

/// ヘッダー行 (pixel1, ..., pixel784, class)
pub fn dataset_header() -> Vec<String> {
    let mut header: Vec<String> = (1..=PIXEL_COUNT).map(|i| format!("pixel{}", i)).collect();
    header.push(CLASS_COLUMN.to_string());
    header
}

// pandas経由で保存されたファイルは "12.0" のような値を含むことがある
fn parse_pixel(value: &str) -> Result<u8> {
    let value = value.trim();
    if let Ok(v) = value.parse::<u8>() {
        return Ok(v);
    }
    let v: f64 = value
        .parse()
        .with_context(|| format!("Invalid pixel value: {:?}", value))?;
    if !(0.0..=255.0).contains(&v) || v.fract() != 0.0 {
        anyhow::bail!("Pixel value out of range: {}", value);
    }
    Ok(v as u8)
}

fn parse_class(value: &str) -> Result<Label> {
    let value = value.trim();
    let index: usize = match value.parse::<usize>() {
        Ok(i) => i,
        Err(_) => {
            let v: f64 = value
                .parse()
                .with_context(|| format!("Invalid class value: {:?}", value))?;
            if v.fract() != 0.0 || v < 0.0 {
                anyhow::bail!("Invalid class value: {}", value);
            }
            v as usize
        }
    };
    Label::from_index(index)
        .ok_or_else(|| anyhow::anyhow!("Class {} is out of range (0-{})", index, NUM_CLASSES - 1))
}

/// データセットを読み込む。ファイルが無い場合は空のデータセットを返す
pub fn load_dataset(path: &Path) -> Result<FeedbackDataset> {
    if !path.exists() {
        log::info!("[Store] データセットが存在しません。空のデータセットで開始します: {}", path.display());
        return Ok(FeedbackDataset::new());
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Failed to open dataset: {}", path.display()))?;

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Ok(FeedbackDataset::new());
    }
    if headers.len() != PIXEL_COUNT + 1 {
        anyhow::bail!(
            "Dataset {} has {} columns (expected {})",
            path.display(),
            headers.len(),
            PIXEL_COUNT + 1
        );
    }

    let mut samples = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row + 1))?;
        if record.len() != PIXEL_COUNT + 1 {
            anyhow::bail!("Row {} has {} columns (expected {})", row + 1, record.len(), PIXEL_COUNT + 1);
        }

        let pixels = record
            .iter()
            .take(PIXEL_COUNT)
            .map(parse_pixel)
            .collect::<Result<Vec<u8>>>()
            .with_context(|| format!("Invalid pixels in row {}", row + 1))?;

        let label = record
            .get(PIXEL_COUNT)
            .ok_or_else(|| anyhow::anyhow!("Missing class in row {}", row + 1))
            .and_then(parse_class)
            .with_context(|| format!("Invalid class in row {}", row + 1))?;

        samples.push(Sample::new(pixels, label)?);
    }

    Ok(FeedbackDataset::from_samples(samples))
}

/// データセット全体をCSVとして書き出す
pub fn write_dataset<W: Write>(writer: W, dataset: &FeedbackDataset) -> Result<()> {
    let mut csv_writer = WriterBuilder::new().has_headers(false).from_writer(writer);
    csv_writer.write_record(dataset_header())?;

    for sample in dataset.iter() {
        let mut row: Vec<String> = sample.pixels().iter().map(|p| p.to_string()).collect();
        row.push(sample.class_index().to_string());
        csv_writer.write_record(&row)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// データセットファイルを全件書き直す
///
/// 一時ファイルに書き込んでからリネームするため、途中で失敗しても既存ファイルは壊れない。
pub fn save_dataset(path: &Path, dataset: &FeedbackDataset) -> Result<()> {
    let parent_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent_dir)
        .with_context(|| format!("Failed to create directory: {}", parent_dir.display()))?;

    let mut temp_file = NamedTempFile::new_in(parent_dir)
        .with_context(|| format!("Failed to create temporary file in {}", parent_dir.display()))?;
    write_dataset(temp_file.as_file_mut(), dataset)?;
    temp_file.as_file().sync_all()?;

    temp_file
        .persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace dataset: {}", path.display()))?;

    Ok(())
}
