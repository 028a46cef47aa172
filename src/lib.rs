//! Box folder trees as a remote storage backend.
//!
//! [`BoxRemote`] parses a `box://<root>/<path>` remote configuration, hands
//! the credentials to a [`driver::DriverFactory`] on first use and forwards
//! filesystem operations to the resulting [`VfsClient`].

pub mod config_loader;
pub mod driver;
pub mod error;
pub mod service;
pub mod vfs;

pub use config_loader::ConfigMap;
pub use error::{Error, Result};
pub use service::{BoxRemote, RemoteStorage};
pub use vfs::VfsClient;
