// HTTP Transport - XML-RPC over plain HTTP with basic auth

use crate::codec::{decode_response, encode_request};
use async_trait::async_trait;
use nimbus_core::domain::Value;
use nimbus_core::port::{RpcError, RpcTransport};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, warn};

/// Longest HTTP error body kept in `RpcError::Http`
const MAX_ERROR_BODY: usize = 512;

/// Where and how to reach an agent
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl HttpTransportConfig {
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }
}

/// `RpcTransport` backed by a pooled `reqwest::Client`
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    username: String,
    password: String,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| RpcError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
            username: config.username,
            password: config.password,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> RpcError {
    if err.is_timeout() {
        RpcError::Timeout(timeout)
    } else {
        RpcError::Transport(err.to_string())
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn call(
        &self,
        method: &str,
        params: Vec<Value>,
        timeout: Duration,
    ) -> Result<Value, RpcError> {
        let body = encode_request(method, &params)?;
        debug!(endpoint = %self.endpoint, method, params = params.len(), "Sending XML-RPC request");

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .header(CONTENT_TYPE, "text/xml")
            .timeout(timeout)
            .body(body)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        if !status.is_success() {
            warn!(endpoint = %self.endpoint, method, status = status.as_u16(), "Agent returned HTTP error");
            let body: String = text.chars().take(MAX_ERROR_BODY).collect();
            return Err(RpcError::Http {
                status: status.as_u16(),
                body,
            });
        }

        decode_response(&text)
    }
}
