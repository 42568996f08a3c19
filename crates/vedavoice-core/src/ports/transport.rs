//! HttpTransport port - リクエスト送信の抽象化
//!
//! ブラウザの `fetch` に相当。

use async_trait::async_trait;

use crate::domain::QueuedRequest;
use crate::error::TransportError;

/// The part of a response the queue cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
}

impl TransportResponse {
    pub fn new(status: u16) -> Self {
        Self { status }
    }
}

/// HttpTransport issues a queued request verbatim (url, method, headers, body).
///
/// # 契約
/// - Any HTTP response, including 4xx/5xx, is `Ok` with its status.
/// - `Err` means no response was obtained at all.
/// - No per-request timeout beyond what the implementation itself has.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &QueuedRequest) -> Result<TransportResponse, TransportError>;
}
