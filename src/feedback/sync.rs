//! リモート同期
//!
//! データセットの公開は `SyncPort` の背後に隠す。結果は成功か、理由付きの失敗のみ。
//! マージや競合解決は同期先の責任で、このクレートは関知しない。

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

use crate::model::SyncSettings;

/// 同期の失敗理由
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("remote sync failed: {reason}")]
pub struct SyncError {
    pub reason: String,
}

impl SyncError {
    pub fn new<S: Into<String>>(reason: S) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// 公開対象となるローカルデータセットの状態
#[derive(Debug, Clone)]
pub struct DatasetSnapshot {
    pub path: PathBuf,
    pub row_count: usize,
    pub taken_at: DateTime<Local>,
}

/// 現在のデータセットを公開する窓口
pub trait SyncPort: Send + Sync {
    fn publish(&self, snapshot: &DatasetSnapshot) -> Result<(), SyncError>;
}

/// gitでコミットしてpushする同期先
///
/// 作者情報はグローバル設定を変更せず `-c user.name=...` で都度渡す。
/// 全体を設定のタイムアウトで打ち切り、タイムアウト時は子プロセスを終了させる。
pub struct GitSync {
    settings: SyncSettings,
}

impl GitSync {
    pub fn new(settings: SyncSettings) -> Self {
        Self { settings }
    }

    pub fn commit_message(&self, at: DateTime<Local>) -> String {
        format!(
            "{} - {}",
            self.settings.commit_message_prefix,
            at.format("%Y-%m-%d %H:%M:%S")
        )
    }

    fn identity_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(name) = &self.settings.author_name {
            args.push("-c".to_string());
            args.push(format!("user.name={}", name));
        }
        if let Some(email) = &self.settings.author_email {
            args.push("-c".to_string());
            args.push(format!("user.email={}", email));
        }
        args
    }

    fn push_args(&self) -> Vec<String> {
        let mut args = vec!["push".to_string()];
        if let Some(remote) = &self.settings.remote {
            args.push(remote.clone());
            if let Some(branch) = &self.settings.branch {
                args.push(branch.clone());
            }
        }
        args
    }

    async fn git_output(&self, subcommand: &str, args: &[String]) -> Result<Output, SyncError> {
        Command::new("git")
            .arg("-C")
            .arg(&self.settings.repo_dir)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SyncError::new(format!("failed to run git {}: {}", subcommand, e)))
    }

    async fn run_git(&self, args: &[String]) -> Result<(), SyncError> {
        let subcommand = args
            .iter()
            .find(|a| !a.starts_with('-') && !a.contains('='))
            .cloned()
            .unwrap_or_default();

        let output = self.git_output(&subcommand, args).await?;
        if !output.status.success() {
            return Err(exit_error(&subcommand, &output));
        }

        log::debug!("[Sync] git {} 完了", subcommand);
        Ok(())
    }

    /// インデックスにコミット対象の変更があるか
    ///
    /// 同時に保存された別の送信が先にコミット済みの場合は変更が無い。
    async fn has_staged_changes(&self) -> Result<bool, SyncError> {
        let args = ["diff".to_string(), "--cached".to_string(), "--quiet".to_string()];
        let output = self.git_output("diff", &args).await?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(exit_error("diff", &output)),
        }
    }

    async fn publish_async(&self, snapshot: &DatasetSnapshot) -> Result<(), SyncError> {
        let dataset_path = absolute_path(&snapshot.path);

        self.run_git(&["add".to_string(), dataset_path.to_string_lossy().to_string()])
            .await?;

        if self.has_staged_changes().await? {
            let mut commit_args = self.identity_args();
            commit_args.push("commit".to_string());
            commit_args.push("-m".to_string());
            commit_args.push(self.commit_message(snapshot.taken_at));
            self.run_git(&commit_args).await?;
        } else {
            log::info!(
                "[Sync] {}行目までは既にコミット済みです。pushのみ行います",
                snapshot.row_count
            );
        }

        self.run_git(&self.push_args()).await
    }

    async fn publish_with_timeout(&self, snapshot: &DatasetSnapshot) -> Result<(), SyncError> {
        let timeout = Duration::from_secs(self.settings.timeout_secs);
        match tokio::time::timeout(timeout, self.publish_async(snapshot)).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::new(format!(
                "git publication timed out after {}s",
                self.settings.timeout_secs
            ))),
        }
    }

    fn publish_on_own_runtime(&self, snapshot: &DatasetSnapshot) -> Result<(), SyncError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SyncError::new(format!("failed to start sync runtime: {}", e)))?;
        runtime.block_on(self.publish_with_timeout(snapshot))
    }
}

impl SyncPort for GitSync {
    /// 呼び出し元がtokioランタイム上にいる場合は別スレッドに専用ランタイムを立てて実行する
    fn publish(&self, snapshot: &DatasetSnapshot) -> Result<(), SyncError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return self.publish_on_own_runtime(snapshot);
        }

        std::thread::scope(|scope| {
            scope
                .spawn(|| self.publish_on_own_runtime(snapshot))
                .join()
                .unwrap_or_else(|_| Err(SyncError::new("sync thread panicked")))
        })
    }
}

fn exit_error(subcommand: &str, output: &Output) -> SyncError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let detail = if stderr.trim().is_empty() { stdout } else { stderr };
    SyncError::new(format!(
        "git {} exited with {}: {}",
        subcommand,
        output.status,
        detail.trim()
    ))
}

// `git -C <repo>` で実行するため、相対パスはカレントディレクトリ基準の絶対パスにする
fn absolute_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::test_support::{remote_commit_count, repo_with_remote};
    use std::fs;

    fn settings() -> SyncSettings {
        SyncSettings {
            enabled: true,
            repo_dir: ".".to_string(),
            remote: Some("origin".to_string()),
            branch: Some("main".to_string()),
            author_name: Some("Nexus OCR".to_string()),
            author_email: Some("feedback@example.com".to_string()),
            commit_message_prefix: "Update feedback data".to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_commit_message_format() {
        let sync = GitSync::new(settings());
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(sync.commit_message(at), "Update feedback data - 2024-03-09 14:05:07");
    }

    #[test]
    fn test_identity_and_push_args() {
        let sync = GitSync::new(settings());
        assert_eq!(
            sync.identity_args(),
            vec!["-c", "user.name=Nexus OCR", "-c", "user.email=feedback@example.com"]
        );
        assert_eq!(sync.push_args(), vec!["push", "origin", "main"]);

        let mut bare = settings();
        bare.remote = None;
        bare.author_name = None;
        bare.author_email = None;
        let sync = GitSync::new(bare);
        assert!(sync.identity_args().is_empty());
        assert_eq!(sync.push_args(), vec!["push"]);
    }

    #[test]
    fn test_publish_outside_repository_fails_with_reason() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings();
        s.repo_dir = dir.path().join("not-a-repo").to_string_lossy().to_string();
        let sync = GitSync::new(s);

        let snapshot = DatasetSnapshot {
            path: dir.path().join("feedback.csv"),
            row_count: 1,
            taken_at: Local::now(),
        };
        let err = sync.publish(&snapshot).unwrap_err();
        assert!(!err.reason.is_empty());
    }

    fn sync_for(work: &Path) -> GitSync {
        let mut s = settings();
        s.repo_dir = work.to_string_lossy().to_string();
        GitSync::new(s)
    }

    fn snapshot(path: &Path, row_count: usize) -> DatasetSnapshot {
        DatasetSnapshot {
            path: path.to_path_buf(),
            row_count,
            taken_at: Local::now(),
        }
    }

    #[test]
    fn test_publish_commits_and_pushes() {
        let dir = tempfile::tempdir().unwrap();
        let (work, remote) = repo_with_remote(dir.path());
        let csv = work.join("feedback.csv");
        fs::write(&csv, "pixel1,class\n0,7\n").unwrap();

        sync_for(&work).publish(&snapshot(&csv, 1)).unwrap();
        assert_eq!(remote_commit_count(&remote), 1);

        fs::write(&csv, "pixel1,class\n0,7\n0,8\n").unwrap();
        sync_for(&work).publish(&snapshot(&csv, 2)).unwrap();
        assert_eq!(remote_commit_count(&remote), 2);
    }

    #[test]
    fn test_already_committed_rows_still_publish() {
        let dir = tempfile::tempdir().unwrap();
        let (work, remote) = repo_with_remote(dir.path());
        let csv = work.join("feedback.csv");
        fs::write(&csv, "pixel1,class\n0,7\n0,8\n").unwrap();
        let sync = sync_for(&work);

        // 先に走った公開が2行とも含めてコミットした後の2回目の公開
        sync.publish(&snapshot(&csv, 1)).unwrap();
        sync.publish(&snapshot(&csv, 2)).unwrap();
        assert_eq!(remote_commit_count(&remote), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_hanging_push_is_cut_off_by_timeout() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Instant;

        let dir = tempfile::tempdir().unwrap();
        let (work, _remote) = repo_with_remote(dir.path());
        let hooks = work.join(".git").join("hooks");
        fs::create_dir_all(&hooks).unwrap();
        let hook = hooks.join("pre-push");
        fs::write(&hook, "#!/bin/sh\nsleep 30\n").unwrap();
        fs::set_permissions(&hook, fs::Permissions::from_mode(0o755)).unwrap();

        let csv = work.join("feedback.csv");
        fs::write(&csv, "pixel1,class\n0,7\n").unwrap();
        let mut s = settings();
        s.repo_dir = work.to_string_lossy().to_string();
        s.timeout_secs = 1;

        let started = Instant::now();
        let err = GitSync::new(s).publish(&snapshot(&csv, 1)).unwrap_err();
        assert!(err.reason.contains("timed out"), "{}", err.reason);
        assert!(started.elapsed() < Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_publish_inside_current_thread_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let (work, remote) = repo_with_remote(dir.path());
        let csv = work.join("feedback.csv");
        fs::write(&csv, "pixel1,class\n0,7\n").unwrap();

        sync_for(&work).publish(&snapshot(&csv, 1)).unwrap();
        assert_eq!(remote_commit_count(&remote), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_publish_inside_multi_thread_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings();
        s.repo_dir = dir.path().join("not-a-repo").to_string_lossy().to_string();

        let err = GitSync::new(s)
            .publish(&snapshot(&dir.path().join("feedback.csv"), 1))
            .unwrap_err();
        assert!(!err.reason.is_empty());
    }
}
