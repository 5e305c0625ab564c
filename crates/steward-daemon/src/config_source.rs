//! HTTP configuration source.
//!
//! The DAO's domain configuration lives in three hosted JSON documents:
//! the parameters document and the two contributor pool documents. This
//! module fetches all three and assembles them into one
//! [`DaoConfig`] snapshot; the refresh loop in [`crate::loops`] swaps
//! the assembled snapshot into the shared handle.

use steward_core::config::{ConfigError, Contributor, DaoConfig, DaoParameters};
use tracing::debug;

use crate::settings::ConfigSourceSection;

/// Fetches and assembles DAO configuration from hosted documents.
pub struct HttpConfigSource {
    http: reqwest::Client,
    parameters_url: String,
    leaders_url: String,
    active_url: String,
}

impl HttpConfigSource {
    /// Creates a source from the configured document URLs.
    #[must_use]
    pub fn new(http: reqwest::Client, section: &ConfigSourceSection) -> Self {
        Self {
            http,
            parameters_url: section.parameters_url.clone(),
            leaders_url: section.leaders_url.clone(),
            active_url: section.active_url.clone(),
        }
    }

    /// Fetches all three documents and assembles a snapshot.
    ///
    /// All three fetches must succeed; a refresh never mixes documents
    /// from different generations with the previous snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error when any document cannot be fetched, decoded,
    /// or assembled into a valid snapshot.
    pub async fn load(&self) -> Result<DaoConfig, ConfigLoadError> {
        let parameters: DaoParameters = self.fetch(&self.parameters_url).await?;
        let leaders: Vec<Contributor> = self.fetch(&self.leaders_url).await?;
        let active: Vec<Contributor> = self.fetch(&self.active_url).await?;
        debug!(
            leaders = leaders.len(),
            active = active.len(),
            "fetched configuration documents"
        );
        Ok(DaoConfig::from_documents(parameters, leaders, active)?)
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, ConfigLoadError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|error| ConfigLoadError::Transport {
                url: url.to_string(),
                message: error.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConfigLoadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response
            .json()
            .await
            .map_err(|error| ConfigLoadError::Decode {
                url: url.to_string(),
                message: error.to_string(),
            })
    }
}

/// Configuration fetch or assembly error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    /// A document fetch never completed.
    #[error("failed to fetch {url}: {message}")]
    Transport {
        /// Document URL.
        url: String,
        /// Transport error message.
        message: String,
    },

    /// A document fetch returned a non-success status.
    #[error("fetching {url} returned status {status}")]
    Status {
        /// Document URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// A document could not be decoded.
    #[error("failed to decode {url}: {message}")]
    Decode {
        /// Document URL.
        url: String,
        /// Decode error message.
        message: String,
    },

    /// The documents did not assemble into a valid snapshot.
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}
