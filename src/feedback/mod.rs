//! 訂正済みフィードバックの保存・監査・リモート同期

pub mod audit;
pub mod store;
pub mod sync;

pub use audit::AuditLog;
pub use store::{build_sample, FeedbackStore, SubmitOutcome, SyncStatus};
pub use sync::{DatasetSnapshot, GitSync, SyncError, SyncPort};
