use std::io::Read;
use std::sync::{Arc, Mutex};
use serde_json::Value;
use tracing::{debug, info, warn};
use crate::config_loader::{ConfigMap, RemoteConfig, CREDENTIALS_ENV};
use crate::driver::{BoxDriverFactory, ClientSettings, DriverFactory};
use crate::error::{Error, Result};
use crate::service::RemoteStorage;
use crate::vfs::path::{self, join, split_parent, Location};
use crate::vfs::VfsClient;

/// Box folder tree exposed as a remote.
///
/// The url is parsed and the client settings are fixed at construction; the
/// client itself is built on first use and then shared by every operation.
pub struct BoxRemote {
    url: String,
    location: Location,
    settings: ClientSettings,
    factory: Arc<dyn DriverFactory>,
    client: Mutex<Option<Arc<dyn VfsClient>>>,
}

fn derive_settings(location: &Location, config: &RemoteConfig, env: &dyn Fn(&str) -> Option<String>) -> ClientSettings {
    let (root_id, root_path) = if location.has_root_identifier() {
        (Some(location.root_identifier.clone()), None)
    } else {
        (None, Some(location.sub_path.clone()))
    };
    ClientSettings {
        credentials: config.credentials_source(env),
        auth_mode: config.auth_mode,
        user_id: config.user_id.clone(),
        use_service_account: config.box_use_service_account,
        root_id,
        root_path,
    }
}

impl BoxRemote {
    pub fn new(config: &ConfigMap) -> Result<Self> {
        Self::with_factory(config, Arc::new(BoxDriverFactory))
    }

    pub fn with_factory(config: &ConfigMap, factory: Arc<dyn DriverFactory>) -> Result<Self> {
        Self::with_env(config, factory, &|key| std::env::var(key).ok())
    }

    fn with_env(
        config: &ConfigMap,
        factory: Arc<dyn DriverFactory>,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        match config.get("url") {
            None => return Err(Error::configuration("missing 'url' in Box remote config")),
            Some(Value::String(_)) => {}
            Some(other) => return Err(Error::configuration(format!("'url' must be a string, got {}", other))),
        }
        let remote_config: RemoteConfig = serde_json::from_value(Value::Object(config.clone()))
            .map_err(|e| Error::configuration(format!("invalid Box remote config: {}", e)))?;
        let location = Location::parse(&remote_config.url)?;
        let settings = derive_settings(&location, &remote_config, env);
        if settings.credentials.is_missing() {
            warn!(
                url = %remote_config.url,
                "no Box credentials configured (config_file_path or {}), authentication will likely fail on first use",
                CREDENTIALS_ENV
            );
        }
        info!(url = %remote_config.url, root = %location.root_identifier, path = %location.sub_path, "Box remote configured");
        Ok(BoxRemote {
            url: remote_config.url,
            location,
            settings,
            factory,
            client: Mutex::new(None),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn is_client_initialized(&self) -> bool {
        self.client.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).is_some()
    }
}

impl RemoteStorage for BoxRemote {
    const PROTOCOL: &'static str = path::PROTOCOL;

    fn strip_prefix(path: &str) -> String {
        path::strip_prefix(path)
    }

    /// A remote without a root identifier keeps its empty authority, so the
    /// result parses back to the same location.
    fn unstrip_prefix(&self, path: &str) -> String {
        if self.location.has_root_identifier() {
            path::unstrip_prefix(path)
        } else {
            format!("{}/{}", path::SCHEME_PREFIX, path.trim_start_matches('/'))
        }
    }

    fn kwargs_from_url(url: &str) -> ConfigMap {
        let mut kwargs = ConfigMap::new();
        kwargs.insert("url".to_owned(), Value::String(url.to_owned()));
        kwargs
    }

    /// The guard only covers check-and-construct; callers get their own
    /// `Arc` and never hold the lock while doing I/O.
    fn client(&self) -> Result<Arc<dyn VfsClient>> {
        let mut slot = self.client.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        debug!(url = %self.url, "creating Box client");
        let client = self.factory.create(&self.settings).map_err(Error::into_configuration)?;
        *slot = Some(client.clone());
        Ok(client)
    }

    fn client_path(&self, path: &str) -> Result<String> {
        let bare = path::strip_prefix(path);
        let anchor = self.location.anchor();
        if bare == anchor {
            return Ok(String::new());
        }
        match bare.strip_prefix(anchor).and_then(|rest| rest.strip_prefix('/')) {
            Some(rest) => Ok(rest.to_owned()),
            None => Err(Error::InvalidPath(format!("'{}' is outside of remote '{}'", path, self.url))),
        }
    }

    fn bare_path(&self, client_path: &str) -> String {
        join(self.location.anchor(), client_path)
    }

    fn upload_stream(&self, source: &mut dyn Read, destination: &str) -> Result<u64> {
        let client = self.client()?;
        let target = self.client_path(destination)?;
        let (parent, _) = split_parent(&target);
        client.mkdir(parent, true, true)?;
        let mut writer = client.open_write(&target)?;
        let copied = std::io::copy(source, &mut writer)?;
        writer.close()?;
        debug!("uploaded {} bytes to {}", copied, destination);
        Ok(copied)
    }

    fn make_directories(&self, path: &str, exist_ok: bool) -> Result<()> {
        self.client()?.mkdir(&self.client_path(path)?, true, exist_ok)
    }
}
