//! App - アプリケーション層
//!
//! ports を組み合わせて RetryQueue を組み立て、バックグラウンドで動かす。
//!
//! # 主要コンポーネント
//! - **RetryQueueBuilder**: 構築とワイヤリング
//! - **DrainWorker**: drain トリガー（signal / 再接続）と shutdown
//! - **QueueStatus**: ステータスのスナップショット

pub mod builder;
pub mod drain_worker;
pub mod status;

pub use self::builder::{BuildError, RetryQueueBuilder};
pub use self::drain_worker::DrainWorker;
pub use self::status::QueueStatus;
