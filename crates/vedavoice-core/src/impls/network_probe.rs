//! NetworkProbe - ブラウザ以外のホストで「online イベント」を作る
//!
//! URL に HEAD を送り、何らかのレスポンスが返れば online、
//! transport error なら offline として NetworkStatus に反映する。
//!
//! - `ProbeTarget::refresh`: 1 回だけ確認（one-shot コマンドの drain 前）
//! - `NetworkProbe::spawn`: 一定間隔で確認し続けるタスク

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use ulid::Ulid;

use crate::domain::{NewRequest, QueuedRequest, RequestId};
use crate::impls::NetworkStatus;
use crate::ports::{Clock, HttpTransport};

/// Where and how to probe.
#[derive(Clone)]
pub struct ProbeTarget {
    transport: Arc<dyn HttpTransport>,
    url: String,
    clock: Arc<dyn Clock>,
}

impl ProbeTarget {
    pub fn new(transport: Arc<dyn HttpTransport>, url: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            transport,
            url: url.into(),
            clock,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one HEAD request. Any HTTP response counts as reachable.
    pub async fn check(&self) -> bool {
        let probe = QueuedRequest::from_new(
            NewRequest::new("HEAD", self.url.clone()),
            RequestId::from_ulid(Ulid::nil()),
            self.clock.now(),
            0,
        );
        let reachable = self.transport.send(&probe).await.is_ok();
        tracing::trace!(url = %self.url, reachable, "network probe");
        reachable
    }

    /// `check` and publish the result to `status`.
    pub async fn refresh(&self, status: &NetworkStatus) -> bool {
        let reachable = self.check().await;
        status.set_online(reachable);
        reachable
    }
}

impl std::fmt::Debug for ProbeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeTarget").field("url", &self.url).finish()
    }
}

/// Handle of a running probe task.
pub struct NetworkProbe {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl NetworkProbe {
    /// Spawn the probe loop. The first probe runs immediately.
    pub fn spawn(target: ProbeTarget, status: NetworkStatus, interval: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        target.refresh(&status).await;
                    }
                }
            }
        });

        Self { shutdown_tx, join }
    }

    pub async fn shutdown_and_join(self) {
        // ignore send error: the task may already be gone
        let _ = self.shutdown_tx.send(true);
        let _ = self.join.await;
    }
}
