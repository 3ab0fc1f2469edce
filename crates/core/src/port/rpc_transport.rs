// RPC Transport Port
// Abstraction over the wire protocol used to reach a hypervisor agent

use crate::domain::Value;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Remote call errors
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Call timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Fault {code}: {message}")]
    Fault { code: i64, message: String },

    #[error("Malformed payload: {0}")]
    Codec(String),

    #[error("{method} returned {actual}, expected {expected}")]
    UnexpectedType {
        method: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// RPC Transport trait
///
/// Implementations:
/// - HttpTransport: XML-RPC over HTTP with basic auth (infra-xmlrpc)
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Invoke `method` with positional `params`, waiting at most `timeout`
    ///
    /// # Errors
    /// - RpcError::Timeout if no response arrives within `timeout`
    /// - RpcError::Fault if the agent answered with an XML-RPC fault
    /// - RpcError::Transport / RpcError::Http for connection level failures
    async fn call(
        &self,
        method: &str,
        params: Vec<Value>,
        timeout: Duration,
    ) -> Result<Value, RpcError>;
}
