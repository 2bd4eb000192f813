//! アプリケーション設定管理モジュール
//!
//! 計算デバイス、モデル、データセットの保存先、リモート同期をJSON形式で保存・読み込みします。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 設定ファイルの場所を上書きする環境変数
pub const CONFIG_ENV_VAR: &str = "NEXUS_OCR_CONFIG";

/// 計算デバイスの種類
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DeviceType {
    /// WGPU (GPU) バックエンド
    Wgpu,
    /// NdArray (CPU) バックエンド
    Cpu,
}

impl Default for DeviceType {
    fn default() -> Self {
        // 28x28の小さなCNNなのでGPU初期化の待ち時間の方が大きい
        DeviceType::Cpu
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Wgpu => write!(f, "WGPU (GPU)"),
            DeviceType::Cpu => write!(f, "CPU (NdArray)"),
        }
    }
}

/// モデル設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// 分類器アーカイブ (tar.gz) のパス
    pub model_path: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_path: "models/glyph_classifier.tar.gz".to_string(),
        }
    }
}

/// フィードバックの保存先
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// 学習用データセット (CSV)
    pub dataset_path: String,
    /// 監査レコードを書くディレクトリ
    pub audit_dir: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            dataset_path: "feedback.csv".to_string(),
            audit_dir: "feedback_log".to_string(),
        }
    }
}

/// gitによるリモート同期の設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    pub enabled: bool,
    /// gitを実行するリポジトリのディレクトリ
    pub repo_dir: String,
    /// 未指定なら上流ブランチへpush
    #[serde(default)]
    pub remote: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub author_email: Option<String>,
    pub commit_message_prefix: String,
    /// add/commit/push 全体のタイムアウト（秒）
    pub timeout_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            repo_dir: ".".to_string(),
            remote: None,
            branch: None,
            author_name: Some("Nexus OCR".to_string()),
            author_email: Some("nexus-ocr@localhost".to_string()),
            commit_message_prefix: "Update feedback data".to_string(),
            timeout_secs: 60,
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// 計算デバイスの種類
    #[serde(default)]
    pub device_type: DeviceType,
    /// モデル設定
    #[serde(default)]
    pub model: ModelSettings,
    /// データセット・監査ログの保存先
    #[serde(default)]
    pub storage: StorageSettings,
    /// リモート同期
    #[serde(default)]
    pub sync: SyncSettings,
}

impl AppConfig {
    /// 設定ファイルのデフォルトパス（環境変数で上書き可能）
    pub fn default_path() -> PathBuf {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => PathBuf::from("config.json"),
        }
    }

    /// 設定を読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// デフォルトパスから設定を読み込む、存在しない場合はデフォルト設定を返す
    pub fn load_or_default() -> Self {
        Self::load_or_default_from(Self::default_path())
    }

    pub fn load_or_default_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if path.exists() {
            match Self::load(path) {
                Ok(config) => {
                    log::info!("[Config] 設定ファイルを読み込みました: {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!(
                        "[Config] 設定ファイルの読み込みに失敗しました ({}): {}",
                        path.display(),
                        e
                    );
                    log::warn!("[Config] デフォルト設定を使用します");
                    Self::default()
                }
            }
        } else {
            log::info!("[Config] 設定ファイルが存在しません。デフォルト設定を使用します");
            Self::default()
        }
    }

    /// 設定を保存する
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// デフォルトパスに設定を保存する
    pub fn save_default(&self) -> anyhow::Result<()> {
        let path = Self::default_path();
        self.save(&path)?;
        log::info!("[Config] 設定ファイルを保存しました: {}", path.display());
        Ok(())
    }

    /// 設定の要約をログに出す
    pub fn log_summary(&self) {
        log::info!("[Config] 計算デバイス: {}", self.device_type);
        log::info!("[Config] モデル: {}", self.model.model_path);
        log::info!(
            "[Config] データセット: {} / 監査ログ: {}",
            self.storage.dataset_path,
            self.storage.audit_dir
        );
        if self.sync.enabled {
            log::info!(
                "[Config] リモート同期: 有効 ({} -> {} {})",
                self.sync.repo_dir,
                self.sync.remote.as_deref().unwrap_or("<upstream>"),
                self.sync.branch.as_deref().unwrap_or("")
            );
        } else {
            log::info!("[Config] リモート同期: 無効");
        }
    }
}
