//! RetryQueue - 公開 API と drain ループ
//!
//! # 並行性モデル
//! - drain ループは常に 1 本（`processing` フラグ + drop guard）
//! - ループが suspend するのは transport の await と backoff の sleep だけ
//! - QueueStore のロックは await を跨がない
//!
//! # add() と drain の関係
//! add() はバックグラウンドの future を直接起動しない。online なら
//! `DrainSignal::Enqueued` を DrainWorker に送るだけ（容量 1 のチャネルで合流）。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::{mpsc, watch};

use super::events::{EventBus, Subscription};
use super::retry::RetryPolicy;
use super::store::QueueStore;
use crate::app::QueueStatus;
use crate::domain::{
    Decider, Decision, DeliveryOutcome, NewRequest, QueueEvent, QueueEventKind, QueuedRequest,
    RequestId,
};
use crate::ports::{Clock, HttpTransport, IdGenerator, NetworkStatusProvider};

/// Message asking the drain worker to run `process_queue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainSignal {
    /// An item was added while online.
    Enqueued,
    /// Someone asked for a drain explicitly ("sync now").
    Requested,
}

/// Summary of one `process_queue` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Requests actually sent.
    pub attempts: u32,
    pub delivered: u32,
    pub failed: u32,
    /// Failed attempts that were scheduled for another try.
    pub retried: u32,
    /// The loop stopped because the network became unreachable.
    pub paused: bool,
    /// Another drain was already running; nothing was done.
    pub skipped: bool,
}

/// Everything a RetryQueue is wired from (see `RetryQueueBuilder`).
pub(crate) struct QueueParts {
    pub store: QueueStore,
    pub transport: Arc<dyn HttpTransport>,
    pub network: Arc<dyn NetworkStatusProvider>,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
    pub decider: Arc<dyn Decider>,
    pub policy: RetryPolicy,
}

struct Inner {
    store: Mutex<QueueStore>,
    bus: Arc<EventBus>,
    transport: Arc<dyn HttpTransport>,
    network: Arc<dyn NetworkStatusProvider>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    decider: Arc<dyn Decider>,
    policy: RetryPolicy,
    processing: AtomicBool,
    signal_tx: mpsc::Sender<DrainSignal>,
    signal_rx: Mutex<Option<mpsc::Receiver<DrainSignal>>>,
}

/// Persistent retry queue for outgoing requests.
///
/// Cheap to clone; clones share the same queue.
#[derive(Clone)]
pub struct RetryQueue {
    inner: Arc<Inner>,
}

impl RetryQueue {
    pub(crate) fn from_parts(parts: QueueParts) -> Self {
        let (signal_tx, signal_rx) = mpsc::channel(1);
        let bus = Arc::new(EventBus::new(parts.ids.clone()));
        Self {
            inner: Arc::new(Inner {
                store: Mutex::new(parts.store),
                bus,
                transport: parts.transport,
                network: parts.network,
                clock: parts.clock,
                ids: parts.ids,
                decider: parts.decider,
                policy: parts.policy,
                processing: AtomicBool::new(false),
                signal_tx,
                signal_rx: Mutex::new(Some(signal_rx)),
            }),
        }
    }

    /// Enqueue a request. Never fails; delivery happens in the background.
    ///
    /// If the network is reachable, the drain worker is signalled.
    pub fn add(&self, request: NewRequest) -> RequestId {
        let id = self.inner.ids.generate_request_id();
        let item = QueuedRequest::from_new(
            request,
            id,
            self.inner.clock.now(),
            self.inner.policy.default_max_retries,
        );
        tracing::debug!(
            request_id = %id,
            method = %item.method,
            url = %item.url,
            priority = %item.priority,
            "request queued"
        );

        let len = {
            let mut store = self.lock_store();
            store.insert(item);
            store.len()
        };
        self.emit(QueueEventKind::Added, len, Some(id));

        if self.is_online() {
            self.signal(DrainSignal::Enqueued);
        }
        id
    }

    /// Remove a pending request. Emits `processed` when something was removed.
    pub fn remove(&self, id: RequestId) -> bool {
        let len = {
            let mut store = self.lock_store();
            store.remove(id).map(|_| store.len())
        };
        match len {
            Some(len) => {
                self.emit(QueueEventKind::Processed, len, Some(id));
                true
            }
            None => false,
        }
    }

    /// Drop every pending request.
    pub fn clear(&self) {
        let dropped = self.lock_store().clear();
        tracing::debug!(dropped, "retry queue cleared");
        self.emit(QueueEventKind::Cleared, 0, None);
    }

    /// Snapshot of the pending requests, head first.
    pub fn get_all(&self) -> Vec<QueuedRequest> {
        self.lock_store().snapshot()
    }

    pub fn get(&self, id: RequestId) -> Option<QueuedRequest> {
        self.lock_store().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock_store().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_store().is_empty()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        let id = self.inner.bus.subscribe(listener);
        Subscription::new(id, &self.inner.bus)
    }

    pub fn status(&self) -> QueueStatus {
        let (length, oldest) = {
            let store = self.lock_store();
            (store.len(), store.oldest_timestamp())
        };
        QueueStatus {
            length,
            processing: self.is_processing(),
            online: self.is_online(),
            oldest,
        }
    }

    /// Persist the current list (shutdown hook).
    pub fn flush(&self) {
        self.lock_store().flush();
    }

    /// Ask the drain worker for a drain regardless of what triggered it.
    pub fn request_drain(&self) {
        self.signal(DrainSignal::Requested);
    }

    pub fn is_processing(&self) -> bool {
        self.inner.processing.load(Ordering::Acquire)
    }

    pub fn is_online(&self) -> bool {
        self.inner.network.is_online()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.inner.policy
    }

    pub(crate) fn network_watch(&self) -> watch::Receiver<bool> {
        self.inner.network.watch()
    }

    /// Hand the signal receiver to a drain worker (only one at a time).
    pub(crate) fn take_signals(&self) -> Option<mpsc::Receiver<DrainSignal>> {
        self.inner
            .signal_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub(crate) fn restore_signals(&self, rx: mpsc::Receiver<DrainSignal>) {
        *self
            .inner
            .signal_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(rx);
    }

    /// Deliver queued requests in order until the queue is empty or the
    /// network is unreachable.
    ///
    /// Only one drain runs at a time; a call made while another drain is in
    /// progress returns immediately with `skipped = true`.
    pub async fn process_queue(&self) -> DrainReport {
        let Some(guard) = ProcessingGuard::try_acquire(&self.inner.processing) else {
            return DrainReport {
                skipped: true,
                ..DrainReport::default()
            };
        };
        let report = self.drain().await;
        drop(guard);

        self.finish_drain(&report);
        report
    }

    /// An `add` racing the end of a drain sees the guard still held, so its
    /// own drain is skipped. Re-signal if anything deliverable is left.
    pub(crate) fn finish_drain(&self, report: &DrainReport) {
        if !report.paused && self.is_online() && !self.is_empty() {
            tracing::debug!(pending = self.len(), "requests left after drain, signalling again");
            self.signal(DrainSignal::Requested);
        }
    }

    async fn drain(&self) -> DrainReport {
        let mut report = DrainReport::default();
        loop {
            if !self.is_online() {
                report.paused = true;
                break;
            }
            let Some(item) = self.lock_store().head().cloned() else {
                break;
            };

            let outcome = DeliveryOutcome::from(self.inner.transport.send(&item).await);
            report.attempts += 1;
            let decision = self.inner.decider.decide(&item, &outcome, self.is_online());

            match decision {
                Decision::Complete => {
                    if self.pop(&item, QueueEventKind::Processed) {
                        tracing::debug!(request_id = %item.id, status = ?outcome.status(), "request delivered");
                        report.delivered += 1;
                    }
                }
                Decision::Reject { status } => {
                    tracing::error!(
                        request_id = %item.id,
                        url = %item.url,
                        status,
                        kind = "client_error",
                        "API request failed with status {status}"
                    );
                    if self.pop(&item, QueueEventKind::Failed) {
                        report.failed += 1;
                    }
                }
                Decision::GiveUp { attempts, reason } => {
                    tracing::error!(
                        request_id = %item.id,
                        url = %item.url,
                        attempts,
                        status = ?outcome.status(),
                        "{reason}"
                    );
                    if self.pop(&item, QueueEventKind::Failed) {
                        report.failed += 1;
                    }
                }
                Decision::Retry { attempts, delay } => {
                    // The item may have been removed while its request was in flight.
                    if self.lock_store().record_failed_attempt(item.id).is_none() {
                        continue;
                    }
                    tracing::debug!(
                        request_id = %item.id,
                        attempts,
                        max_retries = item.max_retries,
                        ?delay,
                        "delivery failed, backing off"
                    );
                    report.retried += 1;
                    tokio::time::sleep(delay).await;
                }
                Decision::Pause => {
                    tracing::info!(request_id = %item.id, ?outcome, "network unreachable, pausing drain");
                    report.paused = true;
                    break;
                }
            }
        }

        report
    }

    /// Remove `item` after a terminal decision and emit `kind`.
    /// Returns `false` if it was already gone.
    fn pop(&self, item: &QueuedRequest, kind: QueueEventKind) -> bool {
        let len = {
            let mut store = self.lock_store();
            store.remove(item.id).map(|_| store.len())
        };
        match len {
            Some(len) => {
                self.emit(kind, len, Some(item.id));
                true
            }
            None => false,
        }
    }

    fn emit(&self, kind: QueueEventKind, len: usize, id: Option<RequestId>) {
        self.inner.bus.emit(QueueEvent::new(kind, len, id));
    }

    fn signal(&self, signal: DrainSignal) {
        // Full means a drain is already pending; Closed means no worker. Both are fine.
        let _ = self.inner.signal_tx.try_send(signal);
    }

    fn lock_store(&self) -> MutexGuard<'_, QueueStore> {
        self.inner
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for RetryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryQueue")
            .field("len", &self.len())
            .field("processing", &self.is_processing())
            .finish()
    }
}

/// Holds the in-flight flag; releasing it on drop keeps a cancelled drain
/// from blocking every later one.
struct ProcessingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ProcessingGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
