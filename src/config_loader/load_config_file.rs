use std::fs::File;
use std::path::Path;
use crate::config_loader::config_struct::{BoxAppSettings, ConfigMap, CredentialsSource};
use crate::error::{Error, Result};

/// Reads a remote configuration object from a json file.
pub fn load_remote_config(path: &Path) -> Result<ConfigMap> {
    let file = File::open(path).map_err(|e| {
        Error::configuration(format!("cannot open remote config '{}': {}", path.display(), e))
    })?;
    let value: serde_json::Value = serde_json::from_reader(file)?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(Error::configuration(format!("remote config '{}' must be a json object", path.display()))),
    }
}

/// Every failure here is an authentication error: the settings exist only to
/// obtain a token.
pub fn load_app_settings(source: &CredentialsSource) -> Result<BoxAppSettings> {
    let parsed = match source {
        CredentialsSource::Missing => {
            return Err(Error::authentication("no Box credentials configured, set 'config_file_path'"));
        }
        CredentialsSource::Inline(data) => serde_json::from_str(data),
        CredentialsSource::File(path) => {
            let file = File::open(path).map_err(|e| {
                Error::authentication(format!("cannot open Box settings file '{}': {}", path.display(), e))
            })?;
            serde_json::from_reader(file)
        }
    };
    parsed.map_err(|e| Error::authentication(format!("invalid Box settings: {}", e)))
}
