//! RetryQueueBuilder - ports の注入とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターン
//! - 起動時検証（transport 未設定は build() で失敗）
//! - グローバル singleton ではなく、起動シーケンスが所有するオブジェクト
//!
//! # デフォルト
//! - store: InMemoryStore
//! - network: 常に online の NetworkStatus
//! - clock: SystemClock
//! - id generator: UlidGenerator（clock 共有）
//! - decider: DefaultDecider（policy 共有）

use std::sync::Arc;

use crate::config::{DEFAULT_STORAGE_KEY, QueueConfig};
use crate::domain::{Decider, DefaultDecider};
use crate::impls::{InMemoryStore, NetworkStatus};
use crate::ports::{
    Clock, DurableKeyValueStore, HttpTransport, IdGenerator, NetworkStatusProvider, SystemClock,
    UlidGenerator,
};
use crate::queue::{QueueParts, QueueStore, RetryPolicy, RetryQueue};

/// # 使用例
/// ```ignore
/// let queue = RetryQueueBuilder::from_config(&config)
///     .store(Arc::new(FileStore::open(data_dir)?))
///     .transport(Arc::new(ReqwestTransport::new()?))
///     .network(Arc::new(network.clone()))
///     .build()?;
/// let worker = DrainWorker::spawn(queue.clone());
/// ```
#[derive(Default)]
pub struct RetryQueueBuilder {
    store: Option<Arc<dyn DurableKeyValueStore>>,
    transport: Option<Arc<dyn HttpTransport>>,
    network: Option<Arc<dyn NetworkStatusProvider>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    decider: Option<Arc<dyn Decider>>,
    policy: RetryPolicy,
    storage_key: Option<String>,
}

/// BuildError はキュー構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("No HttpTransport configured. Call .transport(...) before build().")]
    MissingTransport,

    #[error("storage key must not be empty")]
    EmptyStorageKey,
}

impl RetryQueueBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed policy and storage key from configuration.
    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new()
            .policy(config.retry_policy())
            .storage_key(config.storage_key.clone())
    }

    pub fn store(mut self, store: Arc<dyn DurableKeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn network(mut self, network: Arc<dyn NetworkStatusProvider>) -> Self {
        self.network = Some(network);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn decider(mut self, decider: Arc<dyn Decider>) -> Self {
        self.decider = Some(decider);
        self
    }

    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = Some(key.into());
        self
    }

    /// Load the persisted queue and wire everything together.
    pub fn build(self) -> Result<RetryQueue, BuildError> {
        let transport = self.transport.ok_or(BuildError::MissingTransport)?;
        let key = self
            .storage_key
            .unwrap_or_else(|| DEFAULT_STORAGE_KEY.to_string());
        if key.is_empty() {
            return Err(BuildError::EmptyStorageKey);
        }

        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids: Arc<dyn IdGenerator> = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(clock.clone())));
        let decider: Arc<dyn Decider> = self
            .decider
            .unwrap_or_else(|| Arc::new(DefaultDecider::new(self.policy.clone())));
        let network: Arc<dyn NetworkStatusProvider> = self
            .network
            .unwrap_or_else(|| Arc::new(NetworkStatus::online()));
        let backend: Arc<dyn DurableKeyValueStore> =
            self.store.unwrap_or_else(|| Arc::new(InMemoryStore::new()));

        let store = QueueStore::load(backend, key, clock.now(), self.policy.max_age_chrono());
        tracing::debug!(key = store.key(), pending = store.len(), "retry queue loaded");

        Ok(RetryQueue::from_parts(QueueParts {
            store,
            transport,
            network,
            clock,
            ids,
            decider,
            policy: self.policy,
        }))
    }
}
