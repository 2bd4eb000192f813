//! 分類器アーカイブの確認・作成ツール
//!
//!   model_info show <model.tar.gz>
//!   model_info pack <weights.bin> <output.tar.gz> [unit|byte]

use anyhow::{Context, Result};
use nexus_ocr_lib::canvas::InputRange;
use nexus_ocr_lib::model::{
    load_metadata, print_metadata_info, save_model_with_metadata, InferenceConfig, ModelMetadata,
};
use std::path::Path;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["show", path] => show(Path::new(path)),
        ["pack", weights, output] => pack(Path::new(weights), Path::new(output), InputRange::Unit),
        ["pack", weights, output, range] => {
            parse_range(range).and_then(|r| pack(Path::new(weights), Path::new(output), r))
        }
        _ => {
            eprintln!("Usage:");
            eprintln!("  model_info show <model.tar.gz>");
            eprintln!("  model_info pack <weights.bin> <output.tar.gz> [unit|byte]");
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        eprintln!("✗ エラー: {:#}", e);
        std::process::exit(1);
    }
}

fn parse_range(value: &str) -> Result<InputRange> {
    match value {
        "unit" => Ok(InputRange::Unit),
        "byte" => Ok(InputRange::Byte),
        other => anyhow::bail!("Unknown input range {:?} (expected unit or byte)", other),
    }
}

fn show(path: &Path) -> Result<()> {
    let metadata = load_metadata(path)?;
    print_metadata_info(&metadata);

    match InferenceConfig::from_metadata(&metadata) {
        Ok(_) => println!("✓ このモデルは推論に使用できます"),
        Err(e) => println!("✗ このモデルは使用できません: {:#}", e),
    }
    Ok(())
}

fn pack(weights: &Path, output: &Path, input_range: InputRange) -> Result<()> {
    let binary = std::fs::read(weights)
        .with_context(|| format!("Failed to read weights: {}", weights.display()))?;
    let metadata = ModelMetadata::for_alphabet(input_range);
    let path = save_model_with_metadata(output, &metadata, &binary)?;
    println!("✓ モデルを保存しました: {}", path.display());
    print_metadata_info(&metadata);
    Ok(())
}
