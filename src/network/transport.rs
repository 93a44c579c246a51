use crate::error::{LedgerError, Result};
use crate::network::PeerAddress;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One request fanned out to peers
#[derive(Debug, Clone, PartialEq)]
pub struct PeerRequest {
    pub method: Method,
    pub route: String,
    pub payload: Option<Value>,
}

impl PeerRequest {
    pub fn get(route: &str) -> PeerRequest {
        PeerRequest {
            method: Method::Get,
            route: route.to_string(),
            payload: None,
        }
    }

    pub fn post(route: &str, payload: Value) -> PeerRequest {
        PeerRequest {
            method: Method::Post,
            route: route.to_string(),
            payload: Some(payload),
        }
    }
}

/// How a node talks to one peer
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Send `request` to `peer` and return the decoded JSON body
    async fn send(&self, peer: &PeerAddress, request: &PeerRequest) -> Result<Value>;
}

/// Plain HTTP/JSON transport
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<HttpTransport> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(HttpTransport { client })
    }
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn send(&self, peer: &PeerAddress, request: &PeerRequest) -> Result<Value> {
        let unreachable = |reason: String| LedgerError::PeerUnreachable {
            peer: peer.to_string(),
            reason,
        };

        let url = format!("{}{}", peer.base_url(), request.route);
        let builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        let builder = match &request.payload {
            Some(payload) => builder.json(payload),
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| unreachable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(unreachable(format!("status {}", response.status())));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| unreachable(format!("malformed body: {e}")))
    }
}
