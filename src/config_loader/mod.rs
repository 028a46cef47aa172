pub mod config_struct;
pub mod load_config_file;

pub use config_struct::{AuthMode, BoxAppSettings, ConfigMap, CredentialsSource, RemoteConfig, CREDENTIALS_ENV};
pub use load_config_file::{load_app_settings, load_remote_config};

pub const CONFIG_PATH: &str = "remote.json";
