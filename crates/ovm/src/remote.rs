// Remote - host power control

use crate::connection::Connection;
use crate::object::OvmObject;
use nimbus_core::error::Result;

pub struct Remote {
    conn: Connection,
}

impl OvmObject for Remote {
    fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Remote {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub async fn shutdown(&self) -> Result<bool> {
        self.call_null_is_true("sys_shutdown", vec![]).await
    }

    pub async fn reboot(&self) -> Result<bool> {
        self.call_null_is_true("sys_reboot", vec![]).await
    }
}
