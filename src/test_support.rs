//! テスト用の偽分類器・偽同期先・キャンバス生成・gitリポジトリ

use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::canvas::GlyphTensor;
use crate::classifier::Classifier;
use crate::feedback::{DatasetSnapshot, SyncError, SyncPort};
use crate::label::NUM_CLASSES;

/// 常に同じクラスを返す分類器
pub struct FixedClassifier {
    index: usize,
    pub calls: AtomicUsize,
}

impl FixedClassifier {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Classifier for FixedClassifier {
    fn predict(&self, _input: &GlyphTensor) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut scores = vec![0.01; NUM_CLASSES];
        scores[self.index] = 0.65;
        Ok(scores)
    }
}

/// 常に失敗する分類器
pub struct FailingClassifier;

impl Classifier for FailingClassifier {
    fn predict(&self, _input: &GlyphTensor) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("model unavailable")
    }
}

/// 呼び出し回数を数える同期先。`fail` が true なら常に失敗する
pub struct FakeSync {
    fail: bool,
    pub calls: AtomicUsize,
}

impl FakeSync {
    pub fn succeeding() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }
}

impl SyncPort for FakeSync {
    fn publish(&self, _snapshot: &DatasetSnapshot) -> Result<(), SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(SyncError::new("remote rejected the push"))
        } else {
            Ok(())
        }
    }
}

impl SyncPort for std::sync::Arc<FakeSync> {
    fn publish(&self, snapshot: &DatasetSnapshot) -> Result<(), SyncError> {
        self.as_ref().publish(snapshot)
    }
}

/// 白背景に黒い縦線を1本引いた600x600キャンバス
pub fn stroke_canvas(x: u32) -> RgbaImage {
    let mut bitmap = RgbaImage::from_pixel(600, 600, Rgba([255, 255, 255, 255]));
    for y in 100..500 {
        for dx in 0..15 {
            bitmap.put_pixel(x + dx, y, Rgba([0, 0, 0, 255]));
        }
    }
    bitmap
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git").arg("-C").arg(dir).args(args).status().unwrap();
    assert!(status.success(), "git {:?} failed", args);
}

/// 作業リポジトリ (`work`) と、そのoriginになるbareリポジトリを作る
pub fn repo_with_remote(root: &Path) -> (PathBuf, PathBuf) {
    let remote = root.join("remote.git");
    let work = root.join("work");
    std::fs::create_dir_all(&remote).unwrap();
    std::fs::create_dir_all(&work).unwrap();
    git(&remote, &["init", "--bare", "-b", "main"]);
    git(&work, &["init", "-b", "main"]);
    git(&work, &["config", "commit.gpgsign", "false"]);
    git(&work, &["remote", "add", "origin", remote.to_str().unwrap()]);
    (work, remote)
}

/// bareリポジトリの main にあるコミット数
pub fn remote_commit_count(remote: &Path) -> usize {
    let output = Command::new("git")
        .arg("--git-dir")
        .arg(remote)
        .args(["rev-list", "--count", "main"])
        .output()
        .unwrap();
    String::from_utf8_lossy(&output.stdout).trim().parse().unwrap()
}
