// Xen - virtual machine lifecycle

use crate::connection::Connection;
use crate::object::{expect_map, member_i64, member_text, text_list, OvmObject};
use nimbus_core::domain::Value;
use nimbus_core::error::Result;
use nimbus_core::port::RpcError;
use std::collections::BTreeMap;
use uuid::Uuid;

/// A running or defined domain as listed by the agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vm {
    pub name: String,
    pub uuid: Option<String>,
    pub domid: Option<i64>,
    pub state: Option<String>,
    pub memory_mib: Option<i64>,
    pub vcpus: Option<i64>,
}

impl Vm {
    fn from_members(members: &BTreeMap<String, Value>) -> std::result::Result<Self, RpcError> {
        Ok(Self {
            name: member_text(members, "name")
                .ok_or_else(|| RpcError::Codec("vm entry without name".to_string()))?,
            uuid: member_text(members, "uuid"),
            domid: member_i64(members, "domid"),
            state: member_text(members, "state"),
            memory_mib: member_i64(members, "memory"),
            vcpus: member_i64(members, "vcpus"),
        })
    }

    pub fn is_running(&self) -> bool {
        self.domid.is_some_and(|id| id >= 0)
    }
}

const KNOWN_KEYS: [&str; 9] = [
    "name", "uuid", "memory", "maxmem", "vcpus", "disk", "vif", "on_reboot", "on_crash",
];

/// Domain configuration exchanged with `create_vm`, `configure_vm` and
/// `get_vm_config`. Keys this type does not model are kept in `extra`
/// and sent back untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct VmConfig {
    pub name: String,
    pub uuid: String,
    pub memory_mib: u64,
    pub max_memory_mib: u64,
    pub vcpus: u32,
    pub disks: Vec<String>,
    pub vifs: Vec<String>,
    pub on_reboot: String,
    pub on_crash: String,
    pub extra: BTreeMap<String, Value>,
}

impl VmConfig {
    /// Fresh config with a random uuid
    pub fn new(name: impl Into<String>, memory_mib: u64, vcpus: u32) -> Self {
        Self {
            name: name.into(),
            uuid: Uuid::new_v4().to_string(),
            memory_mib,
            max_memory_mib: memory_mib,
            vcpus,
            disks: Vec::new(),
            vifs: Vec::new(),
            on_reboot: "restart".to_string(),
            on_crash: "restart".to_string(),
            extra: BTreeMap::new(),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut members = self.extra.clone();
        members.insert("name".to_string(), Value::from(&self.name));
        members.insert("uuid".to_string(), Value::from(&self.uuid));
        members.insert("memory".to_string(), Value::Int(self.memory_mib as i64));
        members.insert("maxmem".to_string(), Value::Int(self.max_memory_mib as i64));
        members.insert("vcpus".to_string(), Value::from(self.vcpus));
        members.insert("disk".to_string(), Value::from(self.disks.clone()));
        members.insert("vif".to_string(), Value::from(self.vifs.clone()));
        members.insert("on_reboot".to_string(), Value::from(&self.on_reboot));
        members.insert("on_crash".to_string(), Value::from(&self.on_crash));
        Value::Struct(members)
    }

    pub fn from_members(members: BTreeMap<String, Value>) -> std::result::Result<Self, RpcError> {
        let name = member_text(&members, "name")
            .ok_or_else(|| RpcError::Codec("vm config without name".to_string()))?;
        let memory_mib = member_i64(&members, "memory").unwrap_or(0).max(0) as u64;

        Ok(Self {
            uuid: member_text(&members, "uuid").unwrap_or_default(),
            max_memory_mib: member_i64(&members, "maxmem")
                .map(|m| m.max(0) as u64)
                .unwrap_or(memory_mib),
            vcpus: member_i64(&members, "vcpus").unwrap_or(1).clamp(1, u32::MAX as i64) as u32,
            disks: text_list(members.get("disk")),
            vifs: text_list(members.get("vif")),
            on_reboot: member_text(&members, "on_reboot").unwrap_or_else(|| "restart".to_string()),
            on_crash: member_text(&members, "on_crash").unwrap_or_else(|| "restart".to_string()),
            extra: members
                .iter()
                .filter(|(k, _)| !KNOWN_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            name,
            memory_mib,
        })
    }
}

pub struct Xen {
    conn: Connection,
}

impl OvmObject for Xen {
    fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn repo_vm(repo_id: &str, vm_id: &str) -> Vec<Value> {
    vec![Value::from(repo_id), Value::from(vm_id)]
}

impl Xen {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub async fn list_vms(&self) -> Result<Vec<Vm>> {
        let items = self.call_array("list_vms", vec![]).await?;
        let mut vms = Vec::with_capacity(items.len());
        for item in items {
            let members = expect_map("list_vms", item)?;
            vms.push(Vm::from_members(&members)?);
        }
        Ok(vms)
    }

    /// `None` when the agent does not know the VM
    pub async fn list_vm(&self, repo_id: &str, vm_id: &str) -> Result<Option<Vm>> {
        let value = self.call_value("list_vm", repo_vm(repo_id, vm_id)).await?;
        if value.is_nil() {
            return Ok(None);
        }
        let members = expect_map("list_vm", value)?;
        Ok(Some(Vm::from_members(&members)?))
    }

    pub async fn create_vm(&self, repo_id: &str, vm_id: &str, config: &VmConfig) -> Result<bool> {
        let mut params = repo_vm(repo_id, vm_id);
        params.push(config.to_value());
        self.call_null_is_true("create_vm", params).await
    }

    pub async fn start_vm(&self, repo_id: &str, vm_id: &str) -> Result<bool> {
        self.call_null_is_true("start_vm", repo_vm(repo_id, vm_id)).await
    }

    pub async fn stop_vm(&self, repo_id: &str, vm_id: &str, force: bool) -> Result<bool> {
        let mut params = repo_vm(repo_id, vm_id);
        params.push(Value::from(force));
        self.call_null_is_true("stop_vm", params).await
    }

    /// Reboot, waiting up to `wait_secs` for the guest to go down
    pub async fn reboot_vm(&self, repo_id: &str, vm_id: &str, wait_secs: u32) -> Result<bool> {
        let mut params = repo_vm(repo_id, vm_id);
        params.push(Value::from(wait_secs));
        self.call_null_is_true("reboot_vm", params).await
    }

    pub async fn pause_vm(&self, repo_id: &str, vm_id: &str) -> Result<bool> {
        self.call_null_is_true("pause_vm", repo_vm(repo_id, vm_id)).await
    }

    pub async fn unpause_vm(&self, repo_id: &str, vm_id: &str) -> Result<bool> {
        self.call_null_is_true("unpause_vm", repo_vm(repo_id, vm_id)).await
    }

    pub async fn delete_vm(&self, repo_id: &str, vm_id: &str) -> Result<bool> {
        self.call_null_is_true("delete_vm", repo_vm(repo_id, vm_id)).await
    }

    pub async fn migrate_vm(
        &self,
        repo_id: &str,
        vm_id: &str,
        destination: &str,
        live: bool,
        ssl: bool,
    ) -> Result<bool> {
        let mut params = repo_vm(repo_id, vm_id);
        params.extend([Value::from(destination), Value::from(live), Value::from(ssl)]);
        self.call_null_is_true("migrate_vm", params).await
    }

    pub async fn configure_vm(&self, repo_id: &str, vm_id: &str, config: &VmConfig) -> Result<bool> {
        let mut params = repo_vm(repo_id, vm_id);
        params.push(config.to_value());
        self.call_null_is_true("configure_vm", params).await
    }

    pub async fn vm_config(&self, repo_id: &str, vm_id: &str) -> Result<VmConfig> {
        let members = self.call_map("get_vm_config", repo_vm(repo_id, vm_id)).await?;
        Ok(VmConfig::from_members(members)?)
    }

    pub async fn vnc_port(&self, vm_name: &str) -> Result<u16> {
        let port = self.call_i64("get_vnc_port", vec![Value::from(vm_name)]).await?;
        u16::try_from(port)
            .map_err(|_| RpcError::Codec(format!("vnc port out of range: {}", port)).into())
    }
}
