//! Nimbus OVM - typed client for the Oracle VM host agent
//!
//! Every wrapper object holds a cheap clone of a [`Connection`] and maps
//! one method onto one agent call.
//!
//! # Example
//!
//! ```no_run
//! use nimbus_ovm::{Connection, ConnectionConfig, Linux};
//!
//! # async fn example() -> nimbus_core::Result<()> {
//! let conn = Connection::connect(&ConnectionConfig {
//!     host: "192.168.1.20".to_string(),
//!     password: "secret".to_string(),
//!     ..Default::default()
//! })?;
//!
//! let server = Linux::new(conn).discover_server().await?;
//! println!("{} runs OVM {:?}", server.hostname, server.ovm_version);
//! # Ok(())
//! # }
//! ```

mod common;
mod connection;
mod linux;
mod network;
mod ntp;
mod object;
mod plugin;
mod pool;
mod remote;
mod repository;
mod xen;

#[cfg(test)]
mod testing;

pub use common::Common;
pub use connection::{Connection, ConnectionConfig, DEFAULT_PORT, DEFAULT_TIMEOUT, DEFAULT_USERNAME};
pub use linux::{HardwareInfo, Linux, MountedFileSystem, ServerInfo};
pub use network::{InterfaceKind, Network, NetworkInterface};
pub use ntp::{Ntp, NtpSettings};
pub use object::OvmObject;
pub use plugin::{CloudStackPlugin, Dom0Stats, DomrExecResult, DOMR_SSH_PORT};
pub use pool::{Pool, PoolInfo};
pub use remote::Remote;
pub use repository::{Repository, RepositoryInfo};
pub use xen::{Vm, VmConfig, Xen};
