//! ラベルアルファベットの定義
//!
//! 推論結果のインデックス→文字変換と、フィードバック時の文字→クラス番号変換は
//! 必ずこのモジュールの `LABEL_ALPHABET` を経由する。
//! 両方向で同じ表を使わないとデータセットが黙って誤ラベル化される。

use std::fmt;
use std::str::FromStr;

use crate::error::FeedbackError;

/// クラス数（数字10 + 英大文字26）
pub const NUM_CLASSES: usize = 36;

/// クラスインデックス順のラベル
pub const LABEL_ALPHABET: [char; NUM_CLASSES] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M',
    'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
];

/// インデックスから文字を取得
pub fn label_for(index: usize) -> Option<char> {
    LABEL_ALPHABET.get(index).copied()
}

/// 文字からインデックスを取得（大文字のみ受け付ける）
pub fn label_to_index(symbol: char) -> Option<usize> {
    LABEL_ALPHABET.iter().position(|&c| c == symbol)
}

/// インデックスから文字を取得（`label_for` の別名）
pub fn index_to_label(index: usize) -> Option<char> {
    label_for(index)
}

/// アルファベットに含まれることが保証されたラベル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(u8);

impl Label {
    pub fn from_index(index: usize) -> Option<Self> {
        if index < NUM_CLASSES {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Self> {
        label_to_index(symbol).map(|index| Self(index as u8))
    }

    /// ユーザー入力をラベルに変換する
    ///
    /// 大文字化した結果がちょうど1文字で、かつアルファベットに含まれる場合のみ有効。
    /// 前後の空白は除去しない。
    pub fn parse(input: &str) -> Result<Self, FeedbackError> {
        let invalid = || FeedbackError::InvalidLabel {
            input: input.to_string(),
        };

        let upper = input.to_uppercase();
        let mut chars = upper.chars();
        match (chars.next(), chars.next()) {
            (Some(symbol), None) => Self::from_symbol(symbol).ok_or_else(invalid),
            _ => Err(invalid()),
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn symbol(self) -> char {
        LABEL_ALPHABET[self.index()]
    }

    /// 全ラベルをインデックス順に列挙
    pub fn all() -> impl Iterator<Item = Label> {
        (0..NUM_CLASSES).map(|index| Label(index as u8))
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Label {
    type Err = FeedbackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
