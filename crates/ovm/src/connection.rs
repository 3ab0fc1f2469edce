// Connection - one agent endpoint plus the generic call path

use nimbus_core::domain::Value;
use nimbus_core::error::{AppError, Result};
use nimbus_core::port::RpcTransport;
use nimbus_infra_xmlrpc::{HttpTransport, HttpTransportConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const DEFAULT_PORT: u16 = 8899;
pub const DEFAULT_USERNAME: &str = "oracle";
/// Agents run long operations (VM migration, disk import) synchronously
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// How to reach one agent
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            username: DEFAULT_USERNAME.to_string(),
            password: String::new(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

// password stays out of logs
impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Handle to one agent. Cloning shares the underlying transport.
#[derive(Clone)]
pub struct Connection {
    transport: Arc<dyn RpcTransport>,
    host: String,
    port: u16,
    timeout: Duration,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Connection {
    /// Build an XML-RPC over HTTP connection
    ///
    /// # Errors
    /// - AppError::Config if no host is set or the timeout is zero
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        if config.host.trim().is_empty() {
            return Err(AppError::Config("agent host is not set".to_string()));
        }
        if config.timeout_secs == 0 {
            return Err(AppError::Config(
                "agent timeout must be at least one second".to_string(),
            ));
        }

        let transport = HttpTransport::new(HttpTransportConfig {
            host: config.host.clone(),
            port: config.port,
            username: config.username.clone(),
            password: config.password.clone(),
        })?;

        Ok(Self::with_transport(Arc::new(transport), &config.host, config.port)
            .with_timeout(Duration::from_secs(config.timeout_secs)))
    }

    /// Wrap an existing transport (mock agents, alternative wire formats)
    pub fn with_transport(
        transport: Arc<dyn RpcTransport>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            transport,
            host: host.into(),
            port,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Same agent, different default timeout
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Call `method` with the default timeout
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        self.call_with_timeout(method, params, self.timeout).await
    }

    /// Call `method`, waiting at most `timeout`
    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Vec<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        let started = Instant::now();
        debug!(host = %self.host, method, "Calling agent");

        match self.transport.call(method, params, timeout).await {
            Ok(value) => {
                debug!(
                    host = %self.host,
                    method,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Agent call returned"
                );
                Ok(value)
            }
            Err(e) => {
                warn!(host = %self.host, method, error = %e, "Agent call failed");
                Err(AppError::Rpc(e))
            }
        }
    }
}
