// Network - interface discovery and bridge/VLAN management

use crate::connection::Connection;
use crate::object::{optional_text, OvmObject};
use nimbus_core::domain::Value;
use nimbus_core::error::Result;
use nimbus_infra_xmlrpc::XmlNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceKind {
    Physical,
    Bridge,
    Vlan,
}

impl InterfaceKind {
    /// Section of the discovery document listing this kind
    fn section(self) -> &'static str {
        match self {
            InterfaceKind::Physical => "Network",
            InterfaceKind::Bridge => "Bridges",
            InterfaceKind::Vlan => "Vlans",
        }
    }
}

impl std::fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterfaceKind::Physical => write!(f, "physical"),
            InterfaceKind::Bridge => write!(f, "bridge"),
            InterfaceKind::Vlan => write!(f, "vlan"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    pub name: String,
    pub kind: InterfaceKind,
    pub mac: Option<String>,
    pub address: Option<String>,
    pub netmask: Option<String>,
    pub broadcast: Option<String>,
    /// Interfaces enslaved to a bridge or carrying a VLAN
    pub ports: Vec<String>,
}

impl NetworkInterface {
    fn from_device(device: &XmlNode, kind: InterfaceKind) -> Option<Self> {
        let name = device.attr("Name")?.to_string();
        Some(Self {
            name,
            kind,
            mac: optional_text(device, "MAC"),
            address: optional_text(device, "Ipv4/Address"),
            netmask: optional_text(device, "Ipv4/Netmask"),
            broadcast: optional_text(device, "Ipv4/Broadcast"),
            ports: device
                .find_all("Interfaces/PhyInterface")
                .into_iter()
                .map(|p| p.text().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        })
    }
}

pub struct Network {
    conn: Connection,
}

impl OvmObject for Network {
    fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Network {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Every active interface: physical NICs, bridges, then VLANs
    pub async fn discover(&self) -> Result<Vec<NetworkInterface>> {
        let doc = self.call_xml("discover_network", vec![]).await?;

        let mut interfaces = Vec::new();
        for kind in [InterfaceKind::Physical, InterfaceKind::Bridge, InterfaceKind::Vlan] {
            let path = format!("Network/Active/{}/Device", kind.section());
            interfaces.extend(
                doc.find_all(&path)
                    .into_iter()
                    .filter_map(|device| NetworkInterface::from_device(device, kind)),
            );
        }
        Ok(interfaces)
    }

    pub fn interface_by_name<'a>(
        interfaces: &'a [NetworkInterface],
        name: &str,
    ) -> Option<&'a NetworkInterface> {
        interfaces.iter().find(|i| i.name == name)
    }

    pub fn interface_by_ip<'a>(
        interfaces: &'a [NetworkInterface],
        ip: &str,
    ) -> Option<&'a NetworkInterface> {
        interfaces
            .iter()
            .find(|i| i.address.as_deref() == Some(ip))
    }

    pub fn bridges(interfaces: &[NetworkInterface]) -> impl Iterator<Item = &NetworkInterface> {
        interfaces
            .iter()
            .filter(|i| i.kind == InterfaceKind::Bridge)
    }

    pub async fn start_bridge(&self, bridge: &str, physical: &str) -> Result<bool> {
        self.call_null_is_true(
            "start_bridge",
            vec![Value::from(bridge), Value::from(physical)],
        )
        .await
    }

    pub async fn stop_bridge(&self, bridge: &str, physical: &str) -> Result<bool> {
        self.call_null_is_true(
            "stop_bridge",
            vec![Value::from(bridge), Value::from(physical)],
        )
        .await
    }

    pub async fn start_vlan_bridge(&self, bridge: &str, physical: &str, vlan: u16) -> Result<bool> {
        self.call_null_is_true(
            "start_vlan_bridge",
            vec![Value::from(bridge), Value::from(physical), Value::from(vlan)],
        )
        .await
    }

    pub async fn stop_vlan_bridge(&self, bridge: &str, physical: &str, vlan: u16) -> Result<bool> {
        self.call_null_is_true(
            "stop_vlan_bridge",
            vec![Value::from(bridge), Value::from(physical), Value::from(vlan)],
        )
        .await
    }

    /// Add (or remove, when `add` is false) the pool master virtual IP
    pub async fn configure_virtual_ip(&self, vip: &str, add: bool) -> Result<bool> {
        self.call_null_is_true("configure_virtual_ip", vec![Value::from(vip), Value::from(add)])
            .await
    }
}
