// Domain Layer - RPC values, schema versions and upgrade bookkeeping

pub mod error;
pub mod upgrade;
pub mod value;
pub mod version;

// Re-exports
pub use error::DomainError;
pub use upgrade::{UpgradeStep, VersionRecord};
pub use value::Value;
pub use version::Version;
