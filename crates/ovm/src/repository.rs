// Repository - storage repositories and imports

use crate::connection::Connection;
use crate::object::{optional_text, OvmObject};
use nimbus_core::domain::Value;
use nimbus_core::error::Result;
use nimbus_infra_xmlrpc::XmlNode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInfo {
    pub id: String,
    pub alias: Option<String>,
    pub mount_point: Option<String>,
    pub fs_location: Option<String>,
    pub total_bytes: Option<u64>,
    pub free_bytes: Option<u64>,
}

impl RepositoryInfo {
    fn from_node(node: &XmlNode) -> Option<Self> {
        let id = node
            .attr("Name")
            .map(str::to_string)
            .or_else(|| optional_text(node, "Id"))?;
        Some(Self {
            id,
            alias: optional_text(node, "Alias"),
            mount_point: optional_text(node, "Mount_point"),
            fs_location: optional_text(node, "Filesystem_location"),
            total_bytes: node.text_at("Size").and_then(|s| s.parse().ok()),
            free_bytes: node.text_at("Free").and_then(|s| s.parse().ok()),
        })
    }
}

pub struct Repository {
    conn: Connection,
}

impl OvmObject for Repository {
    fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Repository {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Repositories known to the host, limited to `ids` unless empty
    pub async fn discover(&self, ids: &[String]) -> Result<Vec<RepositoryInfo>> {
        let doc = self
            .call_xml("discover_repositories", vec![Value::from(ids.to_vec())])
            .await?;
        Ok(doc
            .find_all("RepositoryList/Repository")
            .into_iter()
            .filter_map(RepositoryInfo::from_node)
            .collect())
    }

    pub async fn create(
        &self,
        fs_location: &str,
        mount_point: &str,
        repo_id: &str,
        alias: &str,
    ) -> Result<bool> {
        self.call_null_is_true(
            "create_repository",
            vec![
                Value::from(fs_location),
                Value::from(mount_point),
                Value::from(repo_id),
                Value::from(alias),
            ],
        )
        .await
    }

    /// Remove the repository; `erase` also wipes its contents
    pub async fn delete(&self, repo_id: &str, erase: bool) -> Result<bool> {
        self.call_null_is_true("delete_repository", vec![Value::from(repo_id), Value::from(erase)])
            .await
    }

    pub async fn mount_fs(&self, fs_location: &str, mount_point: &str) -> Result<bool> {
        self.call_null_is_true(
            "mount_repository_fs",
            vec![Value::from(fs_location), Value::from(mount_point)],
        )
        .await
    }

    pub async fn unmount_fs(&self, mount_point: &str) -> Result<bool> {
        self.call_null_is_true("unmount_repository_fs", vec![Value::from(mount_point)])
            .await
    }

    pub async fn import_virtual_disk(&self, url: &str, disk_id: &str, repo_id: &str) -> Result<bool> {
        self.call_null_is_true(
            "import_virtual_disk",
            vec![Value::from(url), Value::from(disk_id), Value::from(repo_id)],
        )
        .await
    }

    pub async fn import_iso(&self, url: &str, iso_id: &str, repo_id: &str) -> Result<bool> {
        self.call_null_is_true(
            "import_iso",
            vec![Value::from(url), Value::from(iso_id), Value::from(repo_id)],
        )
        .await
    }
}
