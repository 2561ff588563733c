use gbq_common::env;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cloud Storage XML API endpoint.
pub const DEFAULT_GCS_ENDPOINT: &str = "https://storage.googleapis.com";

/// Region used for request signing. Cloud Storage accepts "auto".
pub const DEFAULT_GCS_REGION: &str = "auto";

#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub region: String,
    /// HMAC key id. When both keys are absent the default AWS credential
    /// chain is consulted instead.
    pub access_key: Option<String>,
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
    pub path_style: bool,
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "***"))
            .field("path_style", &self.path_style)
            .finish()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_GCS_ENDPOINT.to_string(),
            region: DEFAULT_GCS_REGION.to_string(),
            access_key: None,
            secret_key: None,
            path_style: true,
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> gbq_common::Result<Self> {
        env::load_dotenv();

        let config = Self {
            endpoint: env::string_or("GCS_ENDPOINT", DEFAULT_GCS_ENDPOINT),
            region: env::string_or("GCS_REGION", DEFAULT_GCS_REGION),
            access_key: env::first_of(&["GCS_HMAC_ACCESS_KEY", "AWS_ACCESS_KEY_ID"]),
            secret_key: env::first_of(&["GCS_HMAC_SECRET", "AWS_SECRET_ACCESS_KEY"]),
            path_style: env::flag_or("GCS_PATH_STYLE", true)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// HMAC credentials for a specific endpoint, e.g. a local emulator.
    pub fn with_hmac(
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_key: Some(access_key.into()),
            secret_key: Some(secret_key.into()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> gbq_common::Result<()> {
        if self.endpoint.is_empty() {
            return Err(gbq_common::ConfigError::Missing("GCS_ENDPOINT".to_string()));
        }

        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err(gbq_common::ConfigError::invalid(
                "GCS_HMAC_ACCESS_KEY and GCS_HMAC_SECRET must be set together",
            ));
        }

        Ok(())
    }
}
