// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Client for the home server's node pin configuration API.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::debug;

use pwr_core::{ControllerError, PinConfig, PinRole};

/// Alias to reduce type complexity in PinSource.
pub type PinsFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<PinConfig>, ControllerError>> + Send + 'a>>;

/// Where the boot sequence gets its pin lists from.
pub trait PinSource: Send + Sync {
    /// Ordered pin entries of one role for this node.
    fn fetch_pins<'a>(&'a self, role: PinRole) -> PinsFuture<'a>;
}

#[derive(Debug, Clone)]
pub struct NodeApiClient {
    http: reqwest::Client,
    base_url: String,
    node_id: String,
}

impl NodeApiClient {
    /// `server_url` is `host:port` or a base URL with an explicit scheme.
    pub fn new(server_url: &str, node_id: &str, timeout: Duration) -> Result<Self, ControllerError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ControllerError::ConfigFetch(format!("HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url(server_url),
            node_id: node_id.to_string(),
        })
    }

    pub fn endpoint(&self, role: PinRole) -> String {
        format!(
            "{}/api/NodePin/node/{}/{}",
            self.base_url,
            self.node_id,
            role.path_segment()
        )
    }

    async fn get_pins(&self, role: PinRole) -> Result<Vec<PinConfig>, ControllerError> {
        let url = self.endpoint(role);
        debug!("Fetching {} pins from {}", role, url);
        let fetch_err = |e: reqwest::Error| ControllerError::ConfigFetch(format!("{}: {}", url, e));
        let mut pins: Vec<PinConfig> = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(fetch_err)?
            .error_for_status()
            .map_err(fetch_err)?
            .json()
            .await
            .map_err(fetch_err)?;
        for pin in &mut pins {
            pin.role = role;
        }
        Ok(pins)
    }
}

impl PinSource for NodeApiClient {
    fn fetch_pins<'a>(&'a self, role: PinRole) -> PinsFuture<'a> {
        Box::pin(self.get_pins(role))
    }
}

fn base_url(server_url: &str) -> String {
    let trimmed = server_url.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pwr_core::PinId;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_endpoint() {
        let client = NodeApiClient::new("localhost:2853", "7", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint(PinRole::Writer),
            "http://localhost:2853/api/NodePin/node/7/write"
        );
        assert_eq!(
            client.endpoint(PinRole::Reader),
            "http://localhost:2853/api/NodePin/node/7/read"
        );

        let client =
            NodeApiClient::new("https://home.lan/", "12", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint(PinRole::Writer),
            "https://home.lan/api/NodePin/node/12/write"
        );
    }

    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        addr.to_string()
    }

    #[tokio::test]
    async fn test_fetch_pins_sets_role() {
        let addr = serve_once(
            "200 OK",
            r#"[{"controllerPin":17,"pinModeId":1,"status":false,"name":"pump"},
                {"controllerPin":4,"pinModeId":4,"status":true}]"#,
        )
        .await;
        let client = NodeApiClient::new(&addr, "7", Duration::from_secs(5)).unwrap();

        let pins = client.fetch_pins(PinRole::Reader).await.unwrap();
        assert_eq!(pins.len(), 2);
        assert_eq!(pins[0].controller_pin, PinId(17));
        assert!(pins[1].initial_status);
        assert!(pins.iter().all(|p| p.role == PinRole::Reader));
    }

    #[tokio::test]
    async fn test_http_error_is_config_fetch_failure() {
        let addr = serve_once("503 Service Unavailable", "[]").await;
        let client = NodeApiClient::new(&addr, "7", Duration::from_secs(5)).unwrap();

        let err = client.fetch_pins(PinRole::Writer).await.unwrap_err();
        assert!(matches!(err, ControllerError::ConfigFetch(_)));
        assert!(err.is_transient());
    }
}
