// Ntp - time synchronisation settings

use crate::connection::Connection;
use crate::object::{expect_bool, text_list, OvmObject};
use nimbus_core::domain::Value;
use nimbus_core::error::Result;
use nimbus_core::port::RpcError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NtpSettings {
    pub servers: Vec<String>,
    pub running: bool,
}

pub struct Ntp {
    conn: Connection,
}

impl OvmObject for Ntp {
    fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Ntp {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Agent answers `[servers, running]`
    pub async fn get(&self) -> Result<NtpSettings> {
        let reply = self.call_array("get_ntp", vec![]).await?;
        let mut fields = reply.into_iter();
        let (Some(servers), Some(running)) = (fields.next(), fields.next()) else {
            return Err(RpcError::Codec("get_ntp reply needs servers and state".to_string()).into());
        };

        Ok(NtpSettings {
            servers: text_list(Some(&servers)),
            running: expect_bool("get_ntp", running)?,
        })
    }

    pub async fn set(&self, servers: &[String], running: bool) -> Result<bool> {
        self.call_null_is_true("set_ntp", vec![Value::from(servers.to_vec()), Value::from(running)])
            .await
    }

    pub async fn enable(&self) -> Result<bool> {
        self.call_null_is_true("enable_ntp", vec![]).await
    }

    pub async fn disable(&self) -> Result<bool> {
        self.call_null_is_true("disable_ntp", vec![]).await
    }
}
