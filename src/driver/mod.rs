use std::sync::Arc;
use crate::config_loader::{AuthMode, CredentialsSource};
use crate::error::Result;
use crate::vfs::VfsClient;

pub mod box_api;

pub use box_api::BoxDriver;

/// Everything a driver needs to build a client, derived once from the
/// remote configuration. Exactly one of `root_id` and `root_path` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub credentials: CredentialsSource,
    pub auth_mode: AuthMode,
    pub user_id: Option<String>,
    pub use_service_account: bool,
    pub root_id: Option<String>,
    pub root_path: Option<String>,
}

/// Seam between the remote adapter and whatever talks to the store.
pub trait DriverFactory: Send + Sync {
    fn create(&self, settings: &ClientSettings) -> Result<Arc<dyn VfsClient>>;
}

impl<F> DriverFactory for F
    where
        F: Fn(&ClientSettings) -> Result<Arc<dyn VfsClient>> + Send + Sync,
{
    fn create(&self, settings: &ClientSettings) -> Result<Arc<dyn VfsClient>> {
        self(settings)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BoxDriverFactory;

impl DriverFactory for BoxDriverFactory {
    fn create(&self, settings: &ClientSettings) -> Result<Arc<dyn VfsClient>> {
        Ok(Arc::new(BoxDriver::new(settings)?))
    }
}
