use image::RgbaImage;

/// 何も描かれていないキャンバスかどうか
///
/// 正規化前の生ビットマップのアルファチャンネルだけを見る。
/// 背景色と線の色はユーザーが変更でき一致することもあるため、色チャンネルは使わない。
pub fn is_blank(bitmap: Option<&RgbaImage>) -> bool {
    match bitmap {
        None => true,
        Some(image) => image.pixels().all(|p| p.0[3] == 0),
    }
}
