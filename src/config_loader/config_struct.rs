use std::fmt;
use std::path::PathBuf;
use serde::{de, Deserialize, Deserializer};
use serde::de::Visitor;

/// Remote configuration as the hosting tool hands it over: a flat json-like
/// object, one per remote.
pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

pub const CREDENTIALS_ENV: &str = "BOX_CREDENTIALS_DATA";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// Client credentials grant, as a user or as the enterprise service account
    #[default]
    Ccg,
    /// Refresh token grant with the `refreshToken` from the settings file
    OAuth,
    /// Short-lived token pasted from the developer console
    DeveloperToken,
}

const AUTH_MODES: &[&str] = &["ccg", "oauth", "developer_token"];

impl<'de> Deserialize<'de> for AuthMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
    {
        struct AuthModeVisitor;

        impl<'de> Visitor<'de> for AuthModeVisitor {
            type Value = AuthMode;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("one of \"ccg\", \"oauth\", \"developer_token\"")
            }

            fn visit_str<E>(self, value: &str) -> Result<AuthMode, E>
                where
                    E: de::Error,
            {
                match value.to_ascii_lowercase().replace('-', "_").as_str() {
                    "ccg" | "client_credentials" => Ok(AuthMode::Ccg),
                    "oauth" | "oauth2" => Ok(AuthMode::OAuth),
                    "developer_token" | "token" => Ok(AuthMode::DeveloperToken),
                    _ => Err(de::Error::unknown_variant(value, AUTH_MODES)),
                }
            }
        }

        deserializer.deserialize_str(AuthModeVisitor)
    }
}

/// Typed view over the keys of a [`ConfigMap`] this remote understands.
/// Unknown keys are ignored.
#[derive(Debug, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
    #[serde(default, alias = "box_credentials_file", alias = "credentials_file")]
    pub config_file_path: Option<PathBuf>,
    #[serde(default)]
    pub credentials_data: Option<String>,
    #[serde(default)]
    pub auth_mode: AuthMode,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default, alias = "use_service_account")]
    pub box_use_service_account: bool,
}

/// Where the Box app settings come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialsSource {
    File(PathBuf),
    Inline(String),
    Missing,
}

impl CredentialsSource {
    pub fn is_missing(&self) -> bool {
        matches!(self, CredentialsSource::Missing)
    }
}

impl RemoteConfig {
    /// Inline data wins over the environment, which wins over a file path.
    pub fn credentials_source<F>(&self, env: F) -> CredentialsSource
        where
            F: Fn(&str) -> Option<String>,
    {
        let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.trim().is_empty());
        if let Some(data) = non_empty(&self.credentials_data) {
            return CredentialsSource::Inline(data);
        }
        if let Some(data) = non_empty(&env(CREDENTIALS_ENV)) {
            return CredentialsSource::Inline(data);
        }
        match &self.config_file_path {
            Some(path) if !path.as_os_str().is_empty() => CredentialsSource::File(path.clone()),
            _ => CredentialsSource::Missing,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppAuth {
    #[serde(rename = "publicKeyID")]
    pub public_key_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(rename = "clientID")]
    pub client_id: String,
    #[serde(rename = "clientSecret")]
    pub client_secret: String,
    #[serde(rename = "appAuth")]
    pub app_auth: Option<AppAuth>,
}

/// Settings file as downloaded from the Box developer console.
#[derive(Debug, Clone, Deserialize)]
pub struct BoxAppSettings {
    #[serde(rename = "boxAppSettings")]
    pub app: AppSettings,
    #[serde(rename = "enterpriseID")]
    pub enterprise_id: Option<String>,
    #[serde(rename = "developerToken")]
    pub developer_token: Option<String>,
    #[serde(rename = "refreshToken")]
    pub refresh_token: Option<String>,
}
