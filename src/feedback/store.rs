//! フィードバックの永続化
//!
//! 訂正済みサンプル1件の追加処理:
//! 1. 保存済みのフル解像度グレースケール画像を28x28に縮小
//! 2. 行優先で784値に平坦化
//! 3. ラベルをクラス番号に変換
//! 4. メモリ上のデータセットに追加
//! 5. データセット全体をCSVに書き直す
//! 6. 監査レコードを書く（5の成否に関係なく実行）
//! 7. リモート同期を1回だけ試みる（失敗しても4〜6は取り消さない）
//!
//! 4と5はデータセットのロックを保持したまま行うため、同時に来た2件の追加で
//! 後から書く側は必ず先に書いた側の行を含めて書き込む。

use chrono::Local;
use image::GrayImage;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::canvas::downsample_to_grid;
use crate::csv_loader::{load_dataset, save_dataset};
use crate::error::FeedbackError;
use crate::feedback::audit::AuditLog;
use crate::feedback::sync::{DatasetSnapshot, GitSync, SyncError, SyncPort};
use crate::label::Label;
use crate::model::AppConfig;
use crate::types::{AuditRecord, FeedbackDataset, Sample};

/// リモート同期の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Published,
    /// 同期先が設定されていない
    Disabled,
    /// ローカル保存に失敗したため試行しなかった
    Skipped,
    Failed(SyncError),
}

/// 1回の送信結果
#[derive(Debug)]
pub struct SubmitOutcome {
    pub label: Label,
    /// 追加後のデータセット行数
    pub row_count: usize,
    /// データセットファイルの書き込みエラー（成否の判定基準）
    pub persist_error: Option<FeedbackError>,
    pub audit: Result<PathBuf, FeedbackError>,
    pub sync: SyncStatus,
}

impl SubmitOutcome {
    /// ローカルのデータセットに永続化できたか
    pub fn success(&self) -> bool {
        self.persist_error.is_none()
    }

    pub fn message(&self) -> String {
        if let Some(err) = &self.persist_error {
            return format!(
                "Feedback could not be saved ({}). You've entered: {}",
                err.detailed(),
                self.label
            );
        }
        match &self.sync {
            SyncStatus::Published => format!(
                "Thank you for your feedback! You've entered: {} and the changes have been pushed to the repository.",
                self.label
            ),
            SyncStatus::Failed(_) => format!(
                "Feedback saved locally but couldn't push to repository. You've entered: {}",
                self.label
            ),
            SyncStatus::Disabled | SyncStatus::Skipped => {
                format!("Thank you for your feedback! You've entered: {}", self.label)
            }
        }
    }

    /// 成否とは別に表示する警告（監査ログ・同期の失敗）
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if let Err(e) = &self.audit {
            warnings.push(format!("Audit record was not written: {}", e));
        }
        if let SyncStatus::Failed(e) = &self.sync {
            warnings.push(format!("{}. Your feedback is safe locally.", e));
        }
        warnings
    }
}

/// 28x28に縮小してサンプルを作る（手順1〜3）
pub fn build_sample(bitmap: &GrayImage, label: Label) -> Result<Sample, FeedbackError> {
    let grid = downsample_to_grid(bitmap)?;
    Sample::new(grid.into_raw(), label)
}

/// プロセス全体で共有するフィードバックストア
pub struct FeedbackStore {
    dataset_path: PathBuf,
    dataset: Mutex<FeedbackDataset>,
    audit: AuditLog,
    sync: Option<Box<dyn SyncPort>>,
    // gitを同時に走らせないためのロック。データセットのロックとは独立
    sync_lock: Mutex<()>,
}

impl FeedbackStore {
    /// データセットを読み込んでストアを開く（ファイルが無ければ空）
    pub fn open<P, Q>(dataset_path: P, audit_dir: Q, sync: Option<Box<dyn SyncPort>>) -> anyhow::Result<Self>
    where
        P: Into<PathBuf>,
        Q: Into<PathBuf>,
    {
        let dataset_path = dataset_path.into();
        let dataset = load_dataset(&dataset_path)?;
        log::info!(
            "[Store] データセットを読み込みました: {} ({}行)",
            dataset_path.display(),
            dataset.len()
        );

        Ok(Self {
            dataset_path,
            dataset: Mutex::new(dataset),
            audit: AuditLog::new(audit_dir),
            sync,
            sync_lock: Mutex::new(()),
        })
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let sync: Option<Box<dyn SyncPort>> = if config.sync.enabled {
            Some(Box::new(GitSync::new(config.sync.clone())))
        } else {
            None
        };
        Self::open(&config.storage.dataset_path, &config.storage.audit_dir, sync)
    }

    pub fn dataset_path(&self) -> &Path {
        &self.dataset_path
    }

    pub fn audit_dir(&self) -> &Path {
        self.audit.dir()
    }

    pub fn len(&self) -> usize {
        self.lock_dataset().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 現在のデータセットの複製
    pub fn snapshot(&self) -> FeedbackDataset {
        self.lock_dataset().clone()
    }

    fn lock_dataset(&self) -> MutexGuard<'_, FeedbackDataset> {
        self.dataset.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 訂正済みサンプルを1件追加する
    ///
    /// 手順1〜4で失敗した場合は Err を返し、データセットは変化しない。
    /// 手順5以降の失敗は `SubmitOutcome` に記録され、メモリ上の追加は取り消さない。
    pub fn submit(&self, bitmap: &GrayImage, label: Label) -> Result<SubmitOutcome, FeedbackError> {
        let sample = build_sample(bitmap, label)?;

        let (row_count, persist_error) = {
            let mut dataset = self.lock_dataset();
            dataset.push(sample.clone());
            let persist_error = save_dataset(&self.dataset_path, &dataset)
                .err()
                .map(|e| FeedbackError::DatasetWrite {
                    path: self.dataset_path.clone(),
                    source: e.into(),
                });
            (dataset.len(), persist_error)
        };

        match &persist_error {
            None => log::info!("[Store] '{}' を追加しました (全{}行)", label, row_count),
            Some(e) => log::error!("[Store] データセットの保存に失敗しました: {}", e.detailed()),
        }

        let at = Local::now();
        let audit = self.audit.write(&AuditRecord::new(&sample, at), at);
        if let Err(e) = &audit {
            log::warn!("[Store] 監査レコードの書き込みに失敗しました: {}", e);
        }

        let sync = if persist_error.is_some() {
            SyncStatus::Skipped
        } else {
            self.publish(row_count)
        };

        Ok(SubmitOutcome {
            label,
            row_count,
            persist_error,
            audit,
            sync,
        })
    }

    fn publish(&self, row_count: usize) -> SyncStatus {
        let Some(sync) = &self.sync else {
            return SyncStatus::Disabled;
        };

        let _guard = self.sync_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = DatasetSnapshot {
            path: self.dataset_path.clone(),
            row_count,
            taken_at: Local::now(),
        };
        match sync.publish(&snapshot) {
            Ok(()) => {
                log::info!("[Sync] データセットを公開しました ({}行)", row_count);
                SyncStatus::Published
            }
            Err(e) => {
                log::warn!("[Sync] {} (ローカルには保存済み)", e);
                SyncStatus::Failed(e)
            }
        }
    }
}
