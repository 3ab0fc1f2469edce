// Port Layer - Interfaces for external dependencies

pub mod rpc_transport;
pub mod script_source;
pub mod time_provider; // For deterministic testing
pub mod transaction;
pub mod upgrade_store;

// Re-exports
pub use rpc_transport::{RpcError, RpcTransport};
pub use script_source::ScriptSource;
pub use time_provider::{SystemTimeProvider, TimeProvider};
pub use transaction::{Transaction, UpgradeTransaction};
pub use upgrade_store::{SchemaState, UpgradeStore};
