// Common - liveness and generic dispatch

use crate::connection::Connection;
use crate::object::OvmObject;
use nimbus_core::domain::Value;
use nimbus_core::error::Result;
use std::time::Duration;

pub struct Common {
    conn: Connection,
}

impl OvmObject for Common {
    fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Common {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Agent sends `msg` back unchanged
    pub async fn echo(&self, msg: &str) -> Result<String> {
        self.call_string("echo", vec![Value::from(msg)]).await
    }

    pub async fn api_version(&self) -> Result<i64> {
        self.call_i64("get_api_version", vec![]).await
    }

    /// Make the agent block for `secs` seconds
    pub async fn sleep(&self, secs: u32) -> Result<bool> {
        // the call itself takes `secs`, keep the default margin on top
        let timeout = self.conn.timeout() + Duration::from_secs(u64::from(secs));
        let value = self
            .conn
            .call_with_timeout("sleep", vec![Value::from(secs)], timeout)
            .await?;
        Ok(value.is_nil())
    }

    /// Ask the agent to forward `method(args)` to the agent at `url`
    pub async fn dispatch(&self, url: &str, method: &str, args: Vec<Value>) -> Result<Value> {
        let mut params = Vec::with_capacity(args.len() + 2);
        params.push(Value::from(url));
        params.push(Value::from(method));
        params.extend(args);
        self.call_value("dispatch", params).await
    }
}
