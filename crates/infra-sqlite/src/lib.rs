// Nimbus Infrastructure - SQLite Adapter
// Implements: UpgradeStore, UpgradeTransaction, ScriptSource, and the upgrade chain

mod connection;
mod error;
mod scripts;
mod transaction;
mod upgrade_store;
pub mod upgrades;

pub use connection::create_pool;
pub use scripts::ScriptResolver;
pub use transaction::SqliteUpgradeTransaction;
pub use upgrade_store::SqliteUpgradeStore;
pub use upgrades::registry;
