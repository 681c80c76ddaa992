//! Configuration management
//!
//! Settings come from an env-style key/value file (the web app reads
//! `webapp/config/.env` by default). Values may be overridden by environment
//! variables carrying the `QBAPI_` prefix, e.g. `QBAPI_CLIENT_SECRET`.

use std::{collections::HashMap, env, fmt, path::Path};

use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default location of the web app settings file
pub const DEFAULT_SETTINGS_PATH: &str = "webapp/config/.env";

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "QBAPI_";

/// Region used when neither the settings nor `AWS_DEFAULT_REGION` name one
pub const DEFAULT_REGION: &str = "us-east-1";

/// Web app and token-exchange settings
#[derive(Clone, Serialize, Deserialize)]
pub struct Settings {
    /// OIDC issuer URL (discovery document lives below it)
    pub issuer_url: String,
    /// OIDC client id
    pub client_id: String,
    /// OIDC client secret
    pub client_secret: String,
    /// Host (and port) the web app is reachable on, used for the redirect URI
    pub app_domain: String,
    /// Identity Center application ARN used for the token exchange
    pub idc_provider_apl_arn: String,
    /// Role assumed with the identity context
    pub qb_sts_role: String,
    /// Q Business application id
    pub qb_apl_id: String,
    /// AWS region
    #[serde(default)]
    pub region_name: Option<String>,
    /// Override for the Q Business endpoint (testing, private endpoints)
    #[serde(default)]
    pub qbusiness_endpoint: Option<String>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("issuer_url", &self.issuer_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("app_domain", &self.app_domain)
            .field("idc_provider_apl_arn", &self.idc_provider_apl_arn)
            .field("qb_sts_role", &self.qb_sts_role)
            .field("qb_apl_id", &self.qb_apl_id)
            .field("region_name", &self.region_name)
            .field("qbusiness_endpoint", &self.qbusiness_endpoint)
            .finish()
    }
}

impl Settings {
    /// Load settings from an env-style file, then apply `QBAPI_` overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, cannot be parsed, or
    /// leaves a required key unset.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Settings file not found: {}",
                path.display()
            )));
        }

        let values = dotenvy::from_path_iter(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?
            .collect::<std::result::Result<HashMap<String, String>, _>>()
            .map_err(|e| Error::Config(format!("Failed to parse {}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), keys = values.len(), "Loaded settings file");

        Self::from_figment(
            Figment::new()
                .merge(Serialized::defaults(values))
                .merge(Env::prefixed(ENV_PREFIX)),
        )
    }

    /// Extract settings from an assembled figment
    ///
    /// # Errors
    ///
    /// Returns an error if a required key is missing.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let settings: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;
        Ok(settings)
    }

    /// Effective region: settings, then `AWS_DEFAULT_REGION`, then `us-east-1`
    #[must_use]
    pub fn region(&self) -> String {
        self.region_name
            .clone()
            .filter(|r| !r.is_empty())
            .or_else(|| env::var("AWS_DEFAULT_REGION").ok().filter(|r| !r.is_empty()))
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }

    /// Redirect URI registered with the OIDC provider
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!("http://{}/authorization-code/callback", self.app_domain)
    }
}
