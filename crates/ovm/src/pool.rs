// Pool - server pool membership and ownership

use crate::connection::Connection;
use crate::object::{optional_text, required_text, OvmObject};
use nimbus_core::domain::Value;
use nimbus_core::error::Result;
use nimbus_core::port::RpcError;
use nimbus_infra_xmlrpc::XmlNode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolInfo {
    pub unique_id: String,
    pub alias: Option<String>,
    pub master_virtual_ip: Option<String>,
    pub member_ips: Vec<String>,
}

impl PoolInfo {
    /// `None` when the host does not belong to a pool
    fn from_xml(doc: &XmlNode) -> std::result::Result<Option<Self>, RpcError> {
        let Some(pool) = doc.find("Server_Pool") else {
            return Ok(None);
        };
        Ok(Some(Self {
            unique_id: required_text(pool, "Unique_Id")?,
            alias: optional_text(pool, "Pool_Alias"),
            master_virtual_ip: optional_text(pool, "Master_Virtual_Ip"),
            member_ips: pool
                .find_all("Member_List/Member/Registered_IP")
                .into_iter()
                .map(|ip| ip.text().to_string())
                .filter(|ip| !ip.is_empty())
                .collect(),
        }))
    }
}

pub struct Pool {
    conn: Connection,
}

impl OvmObject for Pool {
    fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Pool {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub async fn discover(&self) -> Result<Option<PoolInfo>> {
        let doc = self.call_xml("discover_server_pool", vec![]).await?;
        Ok(PoolInfo::from_xml(&doc)?)
    }

    fn membership_params(
        alias: &str,
        pool_id: &str,
        vip: &str,
        member_count: u32,
        hostname: &str,
        ip: &str,
    ) -> Vec<Value> {
        vec![
            Value::from(alias),
            Value::from(pool_id),
            Value::from(vip),
            Value::from(member_count),
            Value::from(hostname),
            Value::from(ip),
        ]
    }

    pub async fn create(
        &self,
        alias: &str,
        pool_id: &str,
        vip: &str,
        member_count: u32,
        hostname: &str,
        ip: &str,
    ) -> Result<bool> {
        let params = Self::membership_params(alias, pool_id, vip, member_count, hostname, ip);
        self.call_null_is_true("create_server_pool", params).await
    }

    pub async fn join(
        &self,
        alias: &str,
        pool_id: &str,
        vip: &str,
        member_count: u32,
        hostname: &str,
        ip: &str,
    ) -> Result<bool> {
        let params = Self::membership_params(alias, pool_id, vip, member_count, hostname, ip);
        self.call_null_is_true("join_server_pool", params).await
    }

    pub async fn leave(&self, pool_id: &str) -> Result<bool> {
        self.call_null_is_true("leave_server_pool", vec![Value::from(pool_id)])
            .await
    }

    pub async fn destroy(&self, pool_id: &str) -> Result<bool> {
        self.call_null_is_true("destroy_server_pool", vec![Value::from(pool_id)])
            .await
    }

    pub async fn set_member_ips(&self, ips: &[String]) -> Result<bool> {
        self.call_null_is_true("set_pool_member_ip_list", vec![Value::from(ips.to_vec())])
            .await
    }

    pub async fn take_ownership(&self, manager_id: &str, manager_url: &str) -> Result<bool> {
        self.call_null_is_true(
            "take_ownership",
            vec![Value::from(manager_id), Value::from(manager_url)],
        )
        .await
    }

    pub async fn release_ownership(&self, manager_id: &str) -> Result<bool> {
        self.call_null_is_true("release_ownership", vec![Value::from(manager_id)])
            .await
    }
}
