//! ReqwestTransport - reqwest による HttpTransport 実装
//!
//! 接続できなかった（connect / DNS 失敗）ときは `TransportError::Unreachable`。
//! `reporting_to` で NetworkStatus を渡すと、そのとき offline に倒す
//! （probe が次に online に戻したところで drain が再開する）。

use async_trait::async_trait;
use reqwest::{Client, Method};

use crate::domain::QueuedRequest;
use crate::error::TransportError;
use crate::impls::NetworkStatus;
use crate::ports::{HttpTransport, TransportResponse};

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    network: Option<NetworkStatus>,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .build()
            .map_err(|e| TransportError::InvalidRequest(format!("failed to build client: {e}")))?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            network: None,
        }
    }

    /// Mark `network` offline whenever a host turns out to be unreachable.
    pub fn reporting_to(mut self, network: NetworkStatus) -> Self {
        self.network = Some(network);
        self
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &QueuedRequest) -> Result<TransportResponse, TransportError> {
        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|e| TransportError::InvalidRequest(format!("method {:?}: {e}", request.method)))?;

        let mut builder = self.client.request(method, &request.url);
        if let Some(headers) = &request.headers {
            for (name, value) in headers {
                builder = builder.header(name, value);
            }
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_builder() {
                TransportError::InvalidRequest(e.to_string())
            } else if e.is_connect() {
                if let Some(network) = &self.network {
                    network.set_online(false);
                }
                TransportError::Unreachable(e.to_string())
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        Ok(TransportResponse::new(response.status().as_u16()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewRequest, RequestId};
    use crate::ports::NetworkStatusProvider;
    use chrono::Utc;
    use ulid::Ulid;

    fn request(method: &str, url: &str) -> QueuedRequest {
        QueuedRequest::from_new(
            NewRequest::new(method, url),
            RequestId::from_ulid(Ulid::new()),
            Utc::now(),
            3,
        )
    }

    #[tokio::test]
    async fn invalid_method_is_an_invalid_request() {
        let transport = ReqwestTransport::new().unwrap();

        let err = transport
            .send(&request("BAD METHOD", "http://127.0.0.1:9/"))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::InvalidRequest(_)));
    }

    /// A loopback port nobody listens on.
    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable_and_reported() {
        let network = NetworkStatus::online();
        let transport = ReqwestTransport::new().unwrap().reporting_to(network.clone());
        let url = format!("http://127.0.0.1:{}/api/sadhana", closed_port());

        let err = transport.send(&request("POST", &url)).await.unwrap_err();

        assert!(matches!(err, TransportError::Unreachable(_)), "got {err:?}");
        assert!(!network.is_online());
    }

    #[tokio::test]
    async fn malformed_url_is_an_invalid_request() {
        let transport = ReqwestTransport::new().unwrap();

        let err = transport.send(&request("GET", "not a url")).await.unwrap_err();

        assert!(matches!(err, TransportError::InvalidRequest(_)));
    }
}
