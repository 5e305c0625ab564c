//! DAO configuration snapshots.
//!
//! Configuration is assembled from three independently versioned JSON
//! documents fetched over plain HTTP: the DAO parameters document and the
//! two contributor pool lists ("leaders" and "active"). The assembled
//! [`DaoConfig`] is immutable; a refresh produces a whole new snapshot
//! which is swapped into the shared [`ConfigHandle`] by reference.
//! In-flight handlers keep the `Arc` they cloned at event start, so they
//! always see one fully-loaded version and never a torn read.
//!
//! Shape mismatches in the contributor documents surface as downstream
//! lookup failures, not load failures. The parameters document is
//! validated at load time for the invariants the resolvers rely on: the
//! payout tier table must carry a `0` floor entry (see
//! [`ConfigError::MissingFloorTier`]) and token decimals must stay
//! within the range amount formatting can represent.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

/// Default choices for governance proposals when a label rule omits them.
fn default_choices() -> Vec<String> {
    vec!["For".to_string(), "Against".to_string(), "Abstain".to_string()]
}

/// Default voting duration: five days.
const fn default_duration_secs() -> i64 {
    432_000
}

/// Largest token decimals whose base (`10^decimals`) still fits in a
/// `u128` for amount formatting.
const MAX_TOKEN_DECIMALS: u32 = 38;

fn default_approval_field() -> String {
    "Approval".to_string()
}

const fn default_decimals() -> u32 {
    18
}

/// One contributor record from a pool document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    /// Board handle (login) of the contributor.
    #[serde(rename = "username")]
    pub handle: String,

    /// On-chain wallet address receiving payouts.
    #[serde(rename = "wallet-address")]
    pub wallet: String,
}

/// Voting parameters attached to one governance label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GovernanceLabelRule {
    /// Seconds between "now" and the opening of the voting window.
    #[serde(default)]
    pub start_offset_secs: i64,

    /// Length of the voting window in seconds.
    #[serde(default = "default_duration_secs")]
    pub duration_secs: i64,

    /// Proposal choices, first choice is the approving one.
    #[serde(default = "default_choices")]
    pub choices: Vec<String>,

    /// Whether removing the label cancels the open proposal.
    #[serde(default)]
    pub cancelable: bool,
}

impl Default for GovernanceLabelRule {
    fn default() -> Self {
        Self {
            start_offset_secs: 0,
            duration_secs: default_duration_secs(),
            choices: default_choices(),
            cancelable: false,
        }
    }
}

/// Token presentation info used when formatting comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Token symbol (e.g. "DAO").
    pub symbol: String,

    /// Token decimals for base-unit formatting.
    #[serde(default = "default_decimals")]
    pub decimals: u32,
}

/// Board coordinates: which organization project is tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardLocator {
    /// Organization login that owns the project.
    pub org: String,

    /// Project number within the organization.
    pub project_number: u64,
}

/// Raw shape of the DAO parameters document.
///
/// Field names follow the document's kebab-case convention.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DaoParameters {
    /// Organization login that owns the tracked project.
    pub github_owner: String,

    /// Tracked project number.
    pub github_project_number: u64,

    /// Minimum-weight threshold to payout amount, as the document carries
    /// it (amounts may be decimal strings or plain integers).
    pub weight_payouts: BTreeMap<String, serde_json::Value>,

    /// Governance label name to voting parameters.
    #[serde(default)]
    pub governance_labels: HashMap<String, GovernanceLabelRule>,

    /// Governance space identifier (e.g. "gitvern.eth").
    #[serde(default)]
    pub governance_space: String,

    /// Treasury section.
    pub treasury: TreasurySection,

    /// Token presentation info.
    pub token: TokenInfo,

    /// Network section.
    pub network: NetworkSection,

    /// Name of the board field the reconciler writes approval scores to.
    #[serde(default = "default_approval_field")]
    pub approval_field: String,
}

/// Treasury section of the parameters document.
#[derive(Debug, Clone, Deserialize)]
pub struct TreasurySection {
    /// Treasury distributor contract address.
    pub contract: String,
}

/// Network section of the parameters document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NetworkSection {
    /// Block explorer base URL for transaction links.
    pub explorer_url: String,
}

/// One immutable, fully-loaded DAO configuration snapshot.
#[derive(Debug, Clone)]
pub struct DaoConfig {
    /// Board coordinates.
    pub board: BoardLocator,

    /// Ascending minimum-weight threshold to payout amount in base units.
    /// Always contains a `0` floor entry.
    pub payout_tiers: BTreeMap<u64, u128>,

    /// Leaders contributor pool; takes precedence on lookup ties.
    pub leaders: Vec<Contributor>,

    /// Active contributor pool.
    pub active: Vec<Contributor>,

    /// Governance label name to voting parameters.
    pub governance_labels: HashMap<String, GovernanceLabelRule>,

    /// Governance space identifier.
    pub space: String,

    /// Treasury distributor contract address.
    pub treasury_contract: String,

    /// Token presentation info.
    pub token: TokenInfo,

    /// Block explorer base URL.
    pub explorer_url: String,

    /// Name of the board field the reconciler writes into.
    pub approval_field: String,
}

impl DaoConfig {
    /// Assembles a configuration snapshot from the three fetched
    /// documents.
    ///
    /// # Errors
    ///
    /// Returns an error if a payout tier key or amount cannot be parsed,
    /// or if the tier table lacks the required `0` floor entry.
    pub fn from_documents(
        parameters: DaoParameters,
        leaders: Vec<Contributor>,
        active: Vec<Contributor>,
    ) -> Result<Self, ConfigError> {
        let mut payout_tiers = BTreeMap::new();
        for (key, value) in &parameters.weight_payouts {
            let threshold: u64 = key.parse().map_err(|_| ConfigError::InvalidPayoutTier {
                key: key.clone(),
                reason: "threshold is not an unsigned integer".to_string(),
            })?;
            let amount = parse_amount(value).ok_or_else(|| ConfigError::InvalidPayoutTier {
                key: key.clone(),
                reason: "amount is not an unsigned integer".to_string(),
            })?;
            payout_tiers.insert(threshold, amount);
        }

        if !payout_tiers.contains_key(&0) {
            return Err(ConfigError::MissingFloorTier);
        }
        if parameters.token.decimals > MAX_TOKEN_DECIMALS {
            return Err(ConfigError::InvalidTokenDecimals {
                decimals: parameters.token.decimals,
            });
        }

        Ok(Self {
            board: BoardLocator {
                org: parameters.github_owner,
                project_number: parameters.github_project_number,
            },
            payout_tiers,
            leaders,
            active,
            governance_labels: parameters.governance_labels,
            space: parameters.governance_space,
            treasury_contract: parameters.treasury.contract,
            token: parameters.token,
            explorer_url: parameters.network.explorer_url,
            approval_field: parameters.approval_field,
        })
    }

    /// Resolves a contributor handle to a wallet address.
    ///
    /// Leaders take precedence over the active pool; within a pool the
    /// first match wins. Absence is `None`, never an error, so callers
    /// can abort their action and log without issuing a payout.
    #[must_use]
    pub fn resolve_wallet(&self, handle: &str) -> Option<&str> {
        crate::directory::resolve_wallet(&self.leaders, &self.active, handle)
    }

    /// Looks up the voting parameters for a governance label.
    #[must_use]
    pub fn governance_label(&self, label: &str) -> Option<&GovernanceLabelRule> {
        self.governance_labels.get(label)
    }
}

fn parse_amount(value: &serde_json::Value) -> Option<u128> {
    match value {
        serde_json::Value::String(s) => s.parse().ok(),
        serde_json::Value::Number(n) => n.as_u128(),
        _ => None,
    }
}

/// Shared handle to the latest configuration snapshot.
///
/// Readers clone the inner `Arc` once at event start and keep reading
/// that snapshot for the duration of the handler; `replace` swaps the
/// reference wholesale so no reader ever observes a partially-loaded
/// configuration.
#[derive(Debug)]
pub struct ConfigHandle {
    inner: RwLock<Arc<DaoConfig>>,
}

impl ConfigHandle {
    /// Creates a handle holding an initial snapshot.
    #[must_use]
    pub fn new(initial: DaoConfig) -> Self {
        Self {
            inner: RwLock::new(Arc::new(initial)),
        }
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<DaoConfig> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replaces the snapshot wholesale.
    pub fn replace(&self, next: DaoConfig) {
        let next = Arc::new(next);
        match self.inner.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

/// Configuration assembly error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A payout tier entry could not be parsed.
    #[error("invalid payout tier entry {key:?}: {reason}")]
    InvalidPayoutTier {
        /// The offending threshold key.
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The payout tier table lacks the `0` floor entry.
    ///
    /// Tier `0` is the implicit floor of the step function; the resolver
    /// relies on it existing rather than defending at call time.
    #[error("payout tier table has no 0 floor entry")]
    MissingFloorTier,

    /// Token decimals exceed what amount formatting can represent.
    ///
    /// Amount formatting computes `10^decimals` in a `u128`; anything
    /// above [`MAX_TOKEN_DECIMALS`] would overflow, so the document is
    /// rejected at load time rather than defended at call time.
    #[error("token decimals {decimals} exceed the supported maximum of {MAX_TOKEN_DECIMALS}")]
    InvalidTokenDecimals {
        /// The offending decimals value.
        decimals: u32,
    },
}
