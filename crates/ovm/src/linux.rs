// Linux - host discovery and OS level operations

use crate::connection::Connection;
use crate::object::{optional_text, required_number, required_text, OvmObject};
use chrono::{DateTime, Utc};
use nimbus_core::domain::Value;
use nimbus_core::error::Result;
use nimbus_core::port::RpcError;
use nimbus_infra_xmlrpc::XmlNode;

/// Pages reported by the hypervisor are 4 KiB
const PAGES_PER_MIB: u64 = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub unique_id: String,
    pub hostname: String,
    pub ovm_version: Option<String>,
    pub agent_version: Option<String>,
    pub membership_state: Option<String>,
    pub pool_id: Option<String>,
    pub manager_id: Option<String>,
    pub is_master: bool,
    pub registered_ip: Option<String>,
    pub roles: Vec<String>,
}

impl ServerInfo {
    fn from_xml(doc: &XmlNode) -> std::result::Result<Self, RpcError> {
        let server = doc.find("Server").ok_or_else(|| crate::object::missing("Server"))?;
        Ok(Self {
            unique_id: required_text(server, "Unique_Id")?,
            hostname: required_text(server, "Hostname")?,
            ovm_version: optional_text(server, "OVM_Version"),
            agent_version: optional_text(server, "Agent_Version"),
            membership_state: optional_text(server, "Membership_State"),
            pool_id: optional_text(server, "Server_Pool_Unique_Id"),
            manager_id: optional_text(server, "Manager_Unique_Id"),
            is_master: server
                .text_at("Is_Master")
                .map(|t| t.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            registered_ip: optional_text(server, "Registered_IP"),
            roles: server
                .text_at("Server_Roles")
                .map(|roles| {
                    roles
                        .split(',')
                        .map(str::trim)
                        .filter(|r| !r.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareInfo {
    pub cpu_sockets: u32,
    pub cores_per_socket: u32,
    pub threads_per_core: u32,
    pub total_memory_mib: u64,
    pub free_memory_mib: u64,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub bios_version: Option<String>,
}

impl HardwareInfo {
    /// Saturates instead of overflowing on bogus counts
    pub fn total_threads(&self) -> u64 {
        u64::from(self.cpu_sockets)
            .saturating_mul(u64::from(self.cores_per_socket))
            .saturating_mul(u64::from(self.threads_per_core))
    }

    fn from_xml(doc: &XmlNode) -> std::result::Result<Self, RpcError> {
        let node = doc
            .find("NodeInformation")
            .ok_or_else(|| crate::object::missing("NodeInformation"))?;
        let total_pages: u64 = required_number(node, "VMM/PhysicalInfo/TotalPages")?;
        let free_pages: u64 = required_number(node, "VMM/PhysicalInfo/FreePages")?;

        Ok(Self {
            cpu_sockets: required_number(node, "CPUInfo/Sockets")?,
            cores_per_socket: required_number(node, "CPUInfo/CoresPerSocket")?,
            threads_per_core: required_number(node, "CPUInfo/ThreadsPerCore")?,
            total_memory_mib: total_pages / PAGES_PER_MIB,
            free_memory_mib: free_pages / PAGES_PER_MIB,
            manufacturer: optional_text(node, "DMTF/Manufacturer"),
            product: optional_text(node, "DMTF/Product"),
            bios_version: optional_text(node, "DMTF/BIOSVersion"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedFileSystem {
    pub fs_type: String,
    pub mount_point: String,
    pub device: Option<String>,
    pub uuid: Option<String>,
}

pub struct Linux {
    conn: Connection,
}

impl OvmObject for Linux {
    fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Linux {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub async fn discover_server(&self) -> Result<ServerInfo> {
        let doc = self.call_xml("discover_server", vec![]).await?;
        Ok(ServerInfo::from_xml(&doc)?)
    }

    pub async fn discover_hardware(&self) -> Result<HardwareInfo> {
        let doc = self.call_xml("discover_hardware", vec![]).await?;
        Ok(HardwareInfo::from_xml(&doc)?)
    }

    /// Convenience over `discover_server`
    pub async fn hostname(&self) -> Result<String> {
        Ok(self.discover_server().await?.hostname)
    }

    pub async fn last_boot_time(&self) -> Result<DateTime<Utc>> {
        let secs = self.call_i64("get_last_boot_time", vec![]).await?;
        DateTime::from_timestamp(secs, 0).ok_or_else(|| {
            RpcError::Codec(format!("boot time out of range: {}", secs)).into()
        })
    }

    /// Replace the agent-managed block of /etc/hosts with `(ip, hostname)` pairs
    pub async fn update_etc_hosts(&self, entries: &[(String, String)]) -> Result<bool> {
        let lines: Vec<Value> = entries
            .iter()
            .map(|(ip, name)| Value::from(format!("{} {}", ip, name)))
            .collect();
        self.call_null_is_true("update_etc_hosts", vec![Value::Array(lines)])
            .await
    }

    /// Mounted file systems of `fs_type` (e.g. `nfs`, `ocfs2`)
    pub async fn mounted_file_systems(&self, fs_type: &str) -> Result<Vec<MountedFileSystem>> {
        let doc = self
            .call_xml("discover_mounted_file_systems", vec![Value::from(fs_type)])
            .await?;

        let mut mounts = Vec::new();
        for fs in doc.find_all("Filesystem") {
            let kind = fs.attr("Type").unwrap_or(fs_type);
            for mount in fs.children_named("Mount") {
                let Some(dir) = mount.attr("Dir") else {
                    continue;
                };
                mounts.push(MountedFileSystem {
                    fs_type: kind.to_string(),
                    mount_point: dir.to_string(),
                    device: optional_text(mount, "Device"),
                    uuid: optional_text(mount, "Uuid"),
                });
            }
        }
        Ok(mounts)
    }
}
