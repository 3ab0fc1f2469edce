// 4.2.0 -> 4.3.0: VPCs

use async_trait::async_trait;
use nimbus_core::application::DbUpgrade;
use nimbus_core::domain::Version;
use nimbus_core::error::Result;
use nimbus_core::port::UpgradeTransaction;

/// Default system VM template for OVM routers
pub const ROUTER_TEMPLATE: &str = "SystemVM Template (OVM)";

pub struct Upgrade420to430;

#[async_trait]
impl DbUpgrade for Upgrade420to430 {
    fn upgradable_range(&self) -> (Version, Version) {
        (Version::new(4, 2, 0), Version::new(4, 2, 0))
    }

    fn upgraded_version(&self) -> Version {
        Version::new(4, 3, 0)
    }

    fn supports_rolling_upgrade(&self) -> bool {
        true
    }

    fn prepare_scripts(&self) -> Vec<&'static str> {
        vec!["schema-420to430.sql"]
    }

    async fn perform_data_migration(&self, tx: &mut dyn UpgradeTransaction) -> Result<()> {
        tx.execute(&format!(
            "INSERT INTO configuration (name, category, value, description) \
             VALUES ('router.template.ovm', 'Advanced', '{}', 'Name of the default router template on OVM') \
             ON CONFLICT (name) DO NOTHING",
            ROUTER_TEMPLATE
        ))
        .await?;
        Ok(())
    }

    fn cleanup_scripts(&self) -> Vec<&'static str> {
        Vec::new()
    }
}
