// 4.1.x -> 4.2.0: routers may serve several networks

use async_trait::async_trait;
use nimbus_core::application::DbUpgrade;
use nimbus_core::domain::Version;
use nimbus_core::error::Result;
use nimbus_core::port::UpgradeTransaction;
use tracing::{info, warn};

pub struct Upgrade410to420;

#[async_trait]
impl DbUpgrade for Upgrade410to420 {
    fn upgradable_range(&self) -> (Version, Version) {
        (Version::new(4, 1, 0), Version::new(4, 1, 1))
    }

    fn upgraded_version(&self) -> Version {
        Version::new(4, 2, 0)
    }

    fn supports_rolling_upgrade(&self) -> bool {
        false
    }

    fn prepare_scripts(&self) -> Vec<&'static str> {
        vec!["schema-410to420.sql"]
    }

    async fn perform_data_migration(&self, tx: &mut dyn UpgradeTransaction) -> Result<()> {
        if tx.column_exists("domain_router", "network_id").await? {
            let refs = tx
                .execute(
                    "INSERT OR IGNORE INTO router_network_ref (router_id, network_id, guest_type) \
                     SELECT r.id, r.network_id, 'Isolated' \
                     FROM domain_router r JOIN networks n ON n.id = r.network_id",
                )
                .await?;
            info!(rows = refs, "Filled router_network_ref");
        } else {
            warn!("domain_router.network_id already gone, skipping router network refs");
        }

        tx.execute("UPDATE vm_instance SET display_name = instance_name WHERE display_name IS NULL")
            .await?;
        Ok(())
    }

    fn cleanup_scripts(&self) -> Vec<&'static str> {
        vec!["schema-410to420-cleanup.sql"]
    }
}
