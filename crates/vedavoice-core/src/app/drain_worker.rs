//! DrainWorker - drain のトリガーとライフサイクル
//!
//! # フロー
//! 1. 起動時: online かつ非空なら 1 回 drain
//! 2. `DrainSignal` 受信（add / request_drain）→ drain
//! 3. offline → online 遷移 → settle delay 待ち → drain
//! 4. shutdown → 実行中の drain は次の suspend 点でキャンセル → flush
//!
//! 再接続時の自動 drain と終了時フラッシュをひとつのタスクにまとめたもの。

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::queue::RetryQueue;

/// Worker handle.
/// - `request_shutdown()` で停止を要求
/// - `shutdown_and_join()` で停止して終了を待つ
pub struct DrainWorker {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl DrainWorker {
    /// Spawn the worker on the current tokio runtime.
    ///
    /// Only one worker per queue receives drain signals; a second worker
    /// still reacts to network transitions.
    pub fn spawn(queue: RetryQueue) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(drain_loop(queue, shutdown_rx));
        Self { shutdown_tx, join }
    }

    /// Request shutdown. An in-progress drain is abandoned at its next
    /// await point; queue state is already persisted per mutation.
    pub fn request_shutdown(&self) {
        // ignore send error: the worker may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for the worker (including its final flush).
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}

async fn drain_loop(queue: RetryQueue, mut shutdown_rx: watch::Receiver<bool>) {
    let mut signals = queue.take_signals();
    if signals.is_none() {
        tracing::warn!("another drain worker owns the signal channel; reacting to network changes only");
    }
    let mut online_rx = queue.network_watch();
    let mut watch_network = true;
    let settle = queue.policy().online_settle_delay;

    let mut pending = queue.is_online() && !queue.is_empty();
    tracing::info!(pending = queue.len(), online = queue.is_online(), "drain worker started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        if pending {
            pending = false;
            // drain は shutdown と競合させる（長い backoff 中でも止まれるように）
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                report = queue.process_queue() => {
                    tracing::debug!(?report, "drain finished");
                }
            }
            continue;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            signal = recv_signal(&mut signals) => {
                match signal {
                    Some(signal) => {
                        tracing::trace!(?signal, "drain signal");
                        pending = true;
                    }
                    None => signals = None,
                }
            }
            changed = online_rx.changed(), if watch_network => {
                if changed.is_err() {
                    watch_network = false;
                    continue;
                }
                let online = *online_rx.borrow_and_update();
                if online {
                    // 接続直後は不安定なので少し待つ
                    tokio::select! {
                        changed = shutdown_rx.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            continue;
                        }
                        _ = tokio::time::sleep(settle) => pending = true,
                    }
                }
            }
        }
    }

    queue.flush();
    if let Some(rx) = signals {
        queue.restore_signals(rx);
    }
    tracing::info!(pending = queue.len(), "drain worker stopped");
}

/// `recv` on the signal channel, or pend forever when this worker has none.
async fn recv_signal(
    signals: &mut Option<tokio::sync::mpsc::Receiver<crate::queue::DrainSignal>>,
) -> Option<crate::queue::DrainSignal> {
    match signals {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
