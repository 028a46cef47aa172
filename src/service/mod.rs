pub mod box_remote;

use std::io::Read;
use std::sync::Arc;
use crate::config_loader::ConfigMap;
use crate::error::Result;
use crate::vfs::{EntryInfo, FileWriter, VfsClient};

pub use box_remote::BoxRemote;

/// # Remote filesystem capability
/// What the hosting tool expects from a remote. Implementors provide the path
/// mapping and the client accessor; everything else forwards to the client.
pub trait RemoteStorage {
    const PROTOCOL: &'static str;

    /// Bare `root/sub` form of a path, no scheme and no surrounding slashes.
    fn strip_prefix(path: &str) -> String;

    /// Fully-qualified form of a bare path.
    fn unstrip_prefix(&self, path: &str) -> String;

    /// Constructor arguments for a remote given only its url.
    fn kwargs_from_url(url: &str) -> ConfigMap;

    fn client(&self) -> Result<Arc<dyn VfsClient>>;

    /// Translates a hosting path into a path relative to the client root.
    fn client_path(&self, path: &str) -> Result<String>;

    /// Inverse of `client_path`, used to report entries in hosting form.
    fn bare_path(&self, client_path: &str) -> String;

    fn upload_stream(&self, source: &mut dyn Read, destination: &str) -> Result<u64>;

    fn make_directories(&self, path: &str, exist_ok: bool) -> Result<()>;

    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        self.client()?.open_read(&self.client_path(path)?)
    }

    fn open_write(&self, path: &str) -> Result<Box<dyn FileWriter>> {
        self.client()?.open_write(&self.client_path(path)?)
    }

    fn list(&self, path: &str) -> Result<Vec<EntryInfo>> {
        let mut entries = self.client()?.list(&self.client_path(path)?)?;
        for entry in entries.iter_mut() {
            entry.path = self.bare_path(&entry.path);
        }
        Ok(entries)
    }

    fn info(&self, path: &str) -> Result<EntryInfo> {
        let mut entry = self.client()?.info(&self.client_path(path)?)?;
        entry.path = self.bare_path(&entry.path);
        Ok(entry)
    }

    fn exists(&self, path: &str) -> Result<bool> {
        self.client()?.exists(&self.client_path(path)?)
    }

    fn remove(&self, path: &str, recursive: bool) -> Result<()> {
        self.client()?.remove(&self.client_path(path)?, recursive)
    }
}
