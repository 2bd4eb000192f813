use chrono::{DateTime, Local};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::FeedbackError;
use crate::types::AuditRecord;

// 同一マイクロ秒に書き込みが重なった場合に試す連番の上限
const MAX_NAME_SUFFIX: u32 = 1000;

/// フィードバック1件ごとに1ファイルを書く監査ログ
///
/// ファイル名はマイクロ秒までのタイムスタンプ。既存ファイルは決して上書きしない。
pub struct AuditLog {
    dir: PathBuf,
}

impl AuditLog {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// レコードを書き込み、作成したファイルのパスを返す
    pub fn write(&self, record: &AuditRecord, at: DateTime<Local>) -> Result<PathBuf, FeedbackError> {
        self.write_inner(record, at).map_err(|source| FeedbackError::AuditWrite {
            dir: self.dir.clone(),
            source,
        })
    }

    fn write_inner(&self, record: &AuditRecord, at: DateTime<Local>) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let stem = format!("feedback_{}", at.format("%Y%m%d_%H%M%S_%6f"));

        for suffix in 0..MAX_NAME_SUFFIX {
            let name = if suffix == 0 {
                format!("{}.json", stem)
            } else {
                format!("{}_{}.json", stem, suffix)
            };
            let path = self.dir.join(name);

            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            };
            serde_json::to_writer_pretty(&mut file, record).map_err(io::Error::from)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
            return Ok(path);
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free audit file name for {}", stem),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::Label;
    use crate::types::{Sample, PIXEL_COUNT};

    fn record() -> AuditRecord {
        let sample = Sample::new(vec![1; PIXEL_COUNT], Label::parse("7").unwrap()).unwrap();
        AuditRecord::new(&sample, Local::now())
    }

    #[test]
    fn test_same_timestamp_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("feedback_log"));
        let at = Local::now();

        let first = log.write(&record(), at).unwrap();
        let second = log.write(&record(), at).unwrap();
        assert_ne!(first, second);
        assert_eq!(fs::read_dir(log.dir()).unwrap().count(), 2);
    }

    #[test]
    fn test_record_contents() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path());
        let path = log.write(&record(), Local::now()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["label"], "7");
        assert_eq!(value["label_index"], 7);
        assert_eq!(value["pixels"].as_array().unwrap().len(), PIXEL_COUNT);
        assert!(value["timestamp"].is_string());

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("feedback_") && name.ends_with(".json"));
    }
}
