//! vedavoice-core
//!
//! Persistent retry queue for outgoing API requests.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, request, events, decision）
//! - **ports**: 抽象化レイヤー（Clock, IdGenerator, DurableKeyValueStore, NetworkStatusProvider, HttpTransport）
//! - **impls**: ports の実装（InMemoryStore, FileStore, NetworkStatus, NetworkProbe, ReqwestTransport）
//! - **queue**: QueueStore / EventBus / RetryQueue（drain ループ）
//! - **app**: builder, drain worker, status
//! - **config**: TOML 設定
//! - **error**: エラー型

pub mod domain;
pub mod ports;
pub mod impls;
pub mod queue;
pub mod app;
pub mod config;
pub mod error;

pub use app::{DrainWorker, QueueStatus, RetryQueueBuilder};
pub use config::QueueConfig;
pub use domain::{NewRequest, Priority, QueueEvent, QueueEventKind, QueuedRequest, RequestId};
pub use queue::{DrainReport, RetryPolicy, RetryQueue, Subscription};
