//! OAuth bearer tokens for the BigQuery API

use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::WarehouseError;

/// Refresh tokens this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

enum Source {
    /// A token handed in through configuration, used as is.
    Static(String),
    /// Tokens minted by the metadata server for the attached service account.
    Metadata {
        url: String,
        cached: Mutex<Option<CachedToken>>,
    },
}

pub struct TokenSource {
    source: Source,
}

impl TokenSource {
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            source: Source::Static(token.into()),
        }
    }

    pub fn metadata(url: impl Into<String>) -> Self {
        Self {
            source: Source::Metadata {
                url: url.into(),
                cached: Mutex::new(None),
            },
        }
    }

    pub async fn token(&self, http: &Client) -> Result<String, WarehouseError> {
        match &self.source {
            Source::Static(token) => Ok(token.clone()),
            Source::Metadata { url, cached } => {
                let mut cached = cached.lock().await;
                if let Some(token) = cached.as_ref() {
                    if Instant::now() < token.refresh_at {
                        return Ok(token.value.clone());
                    }
                }

                let fresh = fetch_metadata_token(http, url).await?;
                let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(EXPIRY_MARGIN);
                debug!(expires_in = fresh.expires_in, "Fetched access token from metadata server");

                *cached = Some(CachedToken {
                    value: fresh.access_token.clone(),
                    refresh_at: Instant::now() + lifetime,
                });
                Ok(fresh.access_token)
            },
        }
    }
}

async fn fetch_metadata_token(http: &Client, url: &str) -> Result<MetadataToken, WarehouseError> {
    let response = http
        .get(url)
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .map_err(|e| WarehouseError::Auth(format!("metadata server unreachable: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(WarehouseError::Auth(format!(
            "metadata server returned {}: {}",
            status.as_u16(),
            body.trim()
        )));
    }

    response
        .json::<MetadataToken>()
        .await
        .map_err(|e| WarehouseError::Auth(format!("malformed metadata token response: {}", e)))
}
