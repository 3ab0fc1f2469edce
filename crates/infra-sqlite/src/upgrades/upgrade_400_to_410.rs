// 4.0.x -> 4.1.0: agent credentials move from global configuration to host_details

use async_trait::async_trait;
use nimbus_core::application::DbUpgrade;
use nimbus_core::domain::Version;
use nimbus_core::error::Result;
use nimbus_core::port::UpgradeTransaction;
use tracing::info;

pub struct Upgrade400to410;

#[async_trait]
impl DbUpgrade for Upgrade400to410 {
    fn upgradable_range(&self) -> (Version, Version) {
        (Version::new(4, 0, 0), Version::new(4, 0, 2))
    }

    fn upgraded_version(&self) -> Version {
        Version::new(4, 1, 0)
    }

    fn supports_rolling_upgrade(&self) -> bool {
        false
    }

    fn prepare_scripts(&self) -> Vec<&'static str> {
        vec!["schema-400to410.sql"]
    }

    async fn perform_data_migration(&self, tx: &mut dyn UpgradeTransaction) -> Result<()> {
        // 'ovm.agent.' is 10 characters; the rest becomes the detail name
        let copied = tx
            .execute(
                "INSERT INTO host_details (host_id, name, value) \
                 SELECT h.id, substr(c.name, 11), c.value \
                 FROM host h JOIN configuration c \
                   ON c.name IN ('ovm.agent.username', 'ovm.agent.password', 'ovm.agent.port') \
                 WHERE h.hypervisor_type = 'Ovm' AND h.removed IS NULL AND c.value IS NOT NULL",
            )
            .await?;
        info!(rows = copied, "Copied agent settings into host_details");
        Ok(())
    }

    fn cleanup_scripts(&self) -> Vec<&'static str> {
        vec!["schema-400to410-cleanup.sql"]
    }
}
