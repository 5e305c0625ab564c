//! Daemon settings.
//!
//! Settings cover the daemon's own plumbing: where to listen, where the
//! external systems live, how often the timers fire, and which
//! environment variables carry secrets. The DAO's domain configuration
//! (payout tiers, contributor pools, governance labels) is not here; it
//! is fetched over HTTP and refreshed on an interval, see
//! [`crate::config_source`].
//!
//! Secrets themselves never appear in the settings file, only the names
//! of the environment variables holding them.

use std::path::Path;

use secrecy::SecretString;
use serde::Deserialize;

/// Top-level daemon settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct DaemonSettings {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerSection,

    /// Webhook settings.
    #[serde(default)]
    pub webhook: WebhookSection,

    /// Configuration source settings.
    pub config_source: ConfigSourceSection,

    /// Board API settings.
    #[serde(default)]
    pub board: BoardSection,

    /// Treasury node settings.
    pub treasury: TreasurySection,

    /// Governance hub settings.
    pub governance: GovernanceSection,

    /// Reconciliation loop settings.
    #[serde(default)]
    pub reconcile: ReconcileSection,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// Listen address for the webhook server.
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// Webhook settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookSection {
    /// Environment variable holding the delivery signing secret.
    #[serde(default = "default_webhook_secret_env")]
    pub secret_env: String,
}

impl Default for WebhookSection {
    fn default() -> Self {
        Self {
            secret_env: default_webhook_secret_env(),
        }
    }
}

/// Where the three DAO configuration documents live.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigSourceSection {
    /// URL of the DAO parameters document.
    pub parameters_url: String,

    /// URL of the leaders contributor pool document.
    pub leaders_url: String,

    /// URL of the active contributor pool document.
    pub active_url: String,

    /// Refresh interval in seconds.
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
}

/// Board API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BoardSection {
    /// GraphQL endpoint URL.
    #[serde(default = "default_graphql_url")]
    pub graphql_url: String,

    /// REST base URL (issue comments).
    #[serde(default = "default_rest_url")]
    pub rest_url: String,

    /// Environment variable holding the API token.
    #[serde(default = "default_board_token_env")]
    pub token_env: String,
}

impl Default for BoardSection {
    fn default() -> Self {
        Self {
            graphql_url: default_graphql_url(),
            rest_url: default_rest_url(),
            token_env: default_board_token_env(),
        }
    }
}

/// Treasury node settings.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TreasurySection {
    /// JSON-RPC endpoint of the signing node.
    pub rpc_url: String,

    /// Manager account the node signs transactions from.
    pub from_address: String,
}

/// Governance hub settings.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct GovernanceSection {
    /// Hub base URL (message envelope + GraphQL endpoints).
    pub hub_url: String,

    /// Content-addressed storage gateway base URL.
    #[serde(default = "default_ipfs_gateway")]
    pub ipfs_gateway_url: String,

    /// Address this daemon authors proposals as.
    pub author_address: String,
}

/// Reconciliation loop settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileSection {
    /// Pass interval in seconds.
    #[serde(default = "default_reconcile_secs")]
    pub interval_secs: u64,
}

impl Default for ReconcileSection {
    fn default() -> Self {
        Self {
            interval_secs: default_reconcile_secs(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_webhook_secret_env() -> String {
    "WEBHOOK_SECRET".to_string()
}

const fn default_refresh_secs() -> u64 {
    600
}

fn default_graphql_url() -> String {
    "https://api.github.com/graphql".to_string()
}

fn default_rest_url() -> String {
    "https://api.github.com".to_string()
}

fn default_board_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_ipfs_gateway() -> String {
    "https://ipfs.io".to_string()
}

const fn default_reconcile_secs() -> u64 {
    60
}

impl DaemonSettings {
    /// Loads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a
    /// required endpoint is missing.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses settings from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or a required endpoint
    /// is missing.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        let required = [
            ("config_source.parameters_url", &self.config_source.parameters_url),
            ("config_source.leaders_url", &self.config_source.leaders_url),
            ("config_source.active_url", &self.config_source.active_url),
            ("treasury.rpc_url", &self.treasury.rpc_url),
            ("treasury.from_address", &self.treasury.from_address),
            ("governance.hub_url", &self.governance.hub_url),
            ("governance.author_address", &self.governance.author_address),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(SettingsError::Validation(format!("{name} must be set")));
            }
        }
        Ok(())
    }
}

/// Resolves a secret from the named environment variable.
///
/// # Errors
///
/// Returns an error when the variable is unset or empty; secrets fail
/// closed rather than defaulting.
pub fn secret_from_env(env_var: &str) -> Result<SecretString, SettingsError> {
    match std::env::var(env_var) {
        Ok(value) if !value.trim().is_empty() => Ok(SecretString::from(value)),
        _ => Err(SettingsError::MissingSecret {
            env_var: env_var.to_string(),
        }),
    }
}

/// Settings error.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// I/O error reading the settings file.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    /// Validation error.
    #[error("settings validation failed: {0}")]
    Validation(String),

    /// A secret environment variable is unset or empty.
    #[error("secret environment variable {env_var} is unset or empty")]
    MissingSecret {
        /// The variable that was expected.
        env_var: String,
    },
}
