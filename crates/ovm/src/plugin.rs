// CloudStackPlugin - host side helper plugin installed next to the agent

use crate::connection::Connection;
use crate::object::{member_f64, member_i64, member_text, OvmObject};
use nimbus_core::domain::Value;
use nimbus_core::error::Result;
use std::collections::BTreeMap;
use tracing::debug;

/// Port the router VM runs its management SSH daemon on
pub const DOMR_SSH_PORT: u16 = 3922;
const DOMR_SSH_RETRIES: u32 = 7;
const DOMR_SSH_INTERVAL_SECS: u32 = 2;

/// Host level usage counters from `ovs_dom0_stats`
#[derive(Debug, Clone, PartialEq)]
pub struct Dom0Stats {
    pub cpu_percent: f64,
    pub free_memory_bytes: i64,
    pub total_memory_bytes: i64,
    pub rx_bytes: i64,
    pub tx_bytes: i64,
}

impl Dom0Stats {
    fn from_members(members: &BTreeMap<String, Value>) -> Self {
        Self {
            cpu_percent: member_f64(members, "cpu").unwrap_or(0.0),
            free_memory_bytes: member_i64(members, "free").unwrap_or(0),
            total_memory_bytes: member_i64(members, "total").unwrap_or(0),
            rx_bytes: member_i64(members, "rx").unwrap_or(0),
            tx_bytes: member_i64(members, "tx").unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomrExecResult {
    pub ok: bool,
    pub output: String,
}

pub struct CloudStackPlugin {
    conn: Connection,
}

impl OvmObject for CloudStackPlugin {
    fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl CloudStackPlugin {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub async fn ping(&self, host: &str) -> Result<bool> {
        self.call_bool("ping", vec![Value::from(host)]).await
    }

    pub async fn dom0_stats(&self, bridge: &str) -> Result<Dom0Stats> {
        let members = self
            .call_map("ovs_dom0_stats", vec![Value::from(bridge)])
            .await?;
        Ok(Dom0Stats::from_members(&members))
    }

    /// Raw per-guest counters, keyed by the agent's own names
    pub async fn domu_stats(&self, vm_name: &str) -> Result<BTreeMap<String, Value>> {
        self.call_map("ovs_domU_stats", vec![Value::from(vm_name)])
            .await
    }

    /// Ask the host to probe `ip:port`, `retries` times `interval_secs` apart
    pub async fn domr_check_port(
        &self,
        ip: &str,
        port: u16,
        retries: u32,
        interval_secs: u32,
    ) -> Result<bool> {
        debug!(ip, port, retries, "Checking router port");
        self.call_bool(
            "domr_check_port",
            vec![
                Value::from(ip),
                Value::from(port),
                Value::from(retries),
                Value::from(interval_secs),
            ],
        )
        .await
    }

    pub async fn domr_check_ssh(&self, ip: &str) -> Result<bool> {
        self.domr_check_port(ip, DOMR_SSH_PORT, DOMR_SSH_RETRIES, DOMR_SSH_INTERVAL_SECS)
            .await
    }

    /// Run `command` inside the router VM at `ip`
    pub async fn domr_exec(&self, ip: &str, command: &str) -> Result<DomrExecResult> {
        let members = self
            .call_map("domr_exec", vec![Value::from(ip), Value::from(command)])
            .await?;
        Ok(DomrExecResult {
            ok: members
                .get("rc")
                .map(|rc| match rc {
                    Value::Bool(b) => *b,
                    // shell style exit code
                    other => other.to_i64() == Some(0),
                })
                .unwrap_or(false),
            output: member_text(&members, "msg").unwrap_or_default(),
        })
    }

    pub async fn control_interface(&self, dev: &str, cidr: &str) -> Result<bool> {
        self.call_bool(
            "ovs_control_interface",
            vec![Value::from(dev), Value::from(cidr)],
        )
        .await
    }

    pub async fn mkdirs(&self, dir: &str) -> Result<bool> {
        self.call_bool("ovs_mkdirs", vec![Value::from(dir)]).await
    }

    pub async fn check_file(&self, path: &str, name: &str) -> Result<bool> {
        self.call_bool("ovs_check_file", vec![Value::from(path), Value::from(name)])
            .await
    }

    pub async fn upload_ssh_key(&self, name: &str, content: &str) -> Result<bool> {
        self.call_bool(
            "ovs_upload_ssh_key",
            vec![Value::from(name), Value::from(content)],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::connection;

    #[tokio::test]
    async fn test_domr_check_ssh_defaults() {
        let plugin = CloudStackPlugin::new(connection(
            "domr_check_port",
            vec![
                Value::from("169.254.0.10"),
                Value::from(3922u16),
                Value::from(7u32),
                Value::from(2u32),
            ],
            Value::Bool(true),
        ));
        assert!(plugin.domr_check_ssh("169.254.0.10").await.unwrap());
    }

    #[tokio::test]
    async fn test_dom0_stats_accepts_strings() {
        let mut members = BTreeMap::new();
        members.insert("cpu".to_string(), Value::from("12.5"));
        members.insert("free".to_string(), Value::from("1024"));
        members.insert("total".to_string(), Value::Int(4096));
        let plugin = CloudStackPlugin::new(connection(
            "ovs_dom0_stats",
            vec![Value::from("xenbr0")],
            Value::Struct(members),
        ));

        let stats = plugin.dom0_stats("xenbr0").await.unwrap();
        assert_eq!(stats.cpu_percent, 12.5);
        assert_eq!(stats.free_memory_bytes, 1024);
        assert_eq!(stats.total_memory_bytes, 4096);
        assert_eq!(stats.rx_bytes, 0);
    }

    #[tokio::test]
    async fn test_domr_exec() {
        let mut members = BTreeMap::new();
        members.insert("rc".to_string(), Value::Bool(false));
        members.insert("msg".to_string(), Value::from("permission denied"));
        let plugin = CloudStackPlugin::new(connection(
            "domr_exec",
            vec![Value::from("169.254.0.10"), Value::from("ls /")],
            Value::Struct(members),
        ));

        let result = plugin.domr_exec("169.254.0.10", "ls /").await.unwrap();
        assert!(!result.ok);
        assert_eq!(result.output, "permission denied");
    }

    #[tokio::test]
    async fn test_mkdirs_wrong_shape() {
        let plugin = CloudStackPlugin::new(connection(
            "ovs_mkdirs",
            vec![Value::from("/etc/xen")],
            Value::from("done"),
        ));
        assert!(plugin.mkdirs("/etc/xen").await.is_err());
    }
}
