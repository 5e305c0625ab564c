//! Governance gateway seam.
//!
//! The governance system is an off-chain voting ledger reached through
//! a hub: proposals are submitted and cancelled with signed message
//! envelopes, queried back over GraphQL, and each proposal's full
//! payload lives in content-addressed off-chain storage. A proposal is
//! linked to its originating work item through embedded metadata, which
//! the reconciliation loop later joins back to the board.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Proposal lifecycle state as the hub reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalState {
    /// Voting has not opened yet.
    Pending,
    /// Voting is open.
    Active,
    /// Voting has concluded.
    Closed,
    /// Any state this core does not act on.
    #[serde(other)]
    Unknown,
}

/// Metadata embedded in a proposal linking it to its originating issue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalMetadata {
    /// Opaque issue id.
    #[serde(default)]
    pub issue_id: String,
    /// Issue number within its repository.
    #[serde(default)]
    pub issue_number: u64,
    /// Originating repository name.
    #[serde(default)]
    pub repo: String,
}

impl ProposalMetadata {
    /// Extracts linkage metadata from a fetched payload blob.
    ///
    /// Looks for a `metadata` object first and falls back to the blob
    /// itself; any parse failure degrades to empty metadata rather than
    /// propagating.
    #[must_use]
    pub fn from_value(value: &serde_json::Value) -> Self {
        let candidate = value.get("metadata").unwrap_or(value);
        serde_json::from_value(candidate.clone()).unwrap_or_default()
    }

    /// Whether this metadata actually references an issue.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.issue_number != 0
    }
}

/// One governance proposal as returned by the hub query.
#[derive(Debug, Clone, Deserialize)]
pub struct Proposal {
    /// Proposal id.
    pub id: String,
    /// Proposal title.
    #[serde(default)]
    pub title: String,
    /// Proposal body.
    #[serde(default)]
    pub body: String,
    /// Choice list; the first choice is the approving one.
    #[serde(default)]
    pub choices: Vec<String>,
    /// Voting window start (Unix seconds).
    #[serde(default)]
    pub start: i64,
    /// Voting window end (Unix seconds).
    #[serde(default)]
    pub end: i64,
    /// Lifecycle state.
    pub state: ProposalState,
    /// Per-choice score vector, aligned with `choices`.
    #[serde(default)]
    pub scores: Vec<f64>,
    /// Total score across choices.
    #[serde(default)]
    pub scores_total: f64,
    /// Content id of the full payload in off-chain storage.
    #[serde(default)]
    pub ipfs: Option<String>,
}

/// A new proposal to submit.
#[derive(Debug, Clone, Serialize)]
pub struct ProposalDraft {
    /// Governance space identifier.
    pub space: String,
    /// Proposal title, passed through from the issue.
    pub title: String,
    /// Proposal body, passed through from the issue.
    pub body: String,
    /// Choice list from the label rule.
    pub choices: Vec<String>,
    /// Voting window start (Unix seconds).
    pub start: i64,
    /// Voting window end (Unix seconds).
    pub end: i64,
    /// Chain height used as the vote-counting reference point.
    pub snapshot_height: u64,
    /// Voting strategies from the space configuration.
    pub strategies: Vec<serde_json::Value>,
    /// Plugins from the space configuration.
    pub plugins: serde_json::Value,
    /// Board linkage metadata.
    pub metadata: ProposalMetadata,
}

/// Governance space configuration: strategies, plugins, members.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpaceConfig {
    /// Space identifier.
    #[serde(default)]
    pub id: String,
    /// Voting strategies.
    #[serde(default)]
    pub strategies: Vec<serde_json::Value>,
    /// Space plugins.
    #[serde(default)]
    pub plugins: serde_json::Value,
}

/// Errors surfaced by the governance gateway.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GovernanceError {
    /// The hub rejected the request.
    #[error("governance hub error: {message}")]
    Hub {
        /// Error message from the hub.
        message: String,
        /// HTTP status code, if available.
        status: Option<u16>,
    },

    /// The request never completed.
    #[error("governance transport error: {0}")]
    Transport(String),

    /// The response did not match the expected shape.
    #[error("malformed governance response: {0}")]
    Decode(String),
}

/// Narrow interface to the off-chain governance system.
///
/// All operations are scoped to the configured space and this system's
/// own signing identity.
#[async_trait]
pub trait GovernanceGateway: Send + Sync {
    /// Submits a new proposal and returns a receipt identifier.
    ///
    /// # Errors
    ///
    /// Returns a [`GovernanceError`] when the hub rejects the envelope.
    async fn submit_proposal(&self, draft: &ProposalDraft) -> Result<String, GovernanceError>;

    /// Requests cancellation of an open proposal.
    ///
    /// # Errors
    ///
    /// Returns a [`GovernanceError`] when the hub rejects the request.
    async fn cancel_proposal(&self, proposal_id: &str) -> Result<String, GovernanceError>;

    /// Queries all proposals authored by this system's identity,
    /// ordered by lifecycle state.
    ///
    /// # Errors
    ///
    /// Returns a [`GovernanceError`] when the query fails.
    async fn query_proposals(&self) -> Result<Vec<Proposal>, GovernanceError>;

    /// Fetches the space configuration (strategies, plugins).
    ///
    /// # Errors
    ///
    /// Returns a [`GovernanceError`] when the query fails.
    async fn query_space(&self) -> Result<SpaceConfig, GovernanceError>;

    /// Fetches a proposal's full payload from content-addressed
    /// storage.
    ///
    /// # Errors
    ///
    /// Returns a [`GovernanceError`] when the blob cannot be fetched.
    /// Callers treat unparseable blobs as empty metadata, not errors.
    async fn fetch_metadata(&self, content_id: &str)
        -> Result<serde_json::Value, GovernanceError>;
}

/// In-memory governance hub for tests.
#[derive(Debug, Default)]
pub struct MockGovernance {
    proposals: Mutex<Vec<Proposal>>,
    metadata: Mutex<HashMap<String, serde_json::Value>>,
    submitted: Mutex<Vec<ProposalDraft>>,
    cancelled: Mutex<Vec<String>>,
    space: Mutex<SpaceConfig>,
    counter: AtomicU64,
    fail_submit: AtomicBool,
    fail_cancel: AtomicBool,
}

impl MockGovernance {
    /// Creates an empty mock hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a proposal to the query result, with its stored payload.
    pub fn add_proposal(&self, proposal: Proposal, payload: serde_json::Value) {
        if let Some(cid) = proposal.ipfs.clone() {
            lock(&self.metadata).insert(cid, payload);
        }
        lock(&self.proposals).push(proposal);
    }

    /// Sets the space configuration served by `query_space`.
    pub fn set_space(&self, space: SpaceConfig) {
        *lock(&self.space) = space;
    }

    /// Makes every subsequent submission fail.
    pub fn fail_submissions(&self) {
        self.fail_submit.store(true, Ordering::SeqCst);
    }

    /// Makes every subsequent cancellation fail.
    pub fn fail_cancellations(&self) {
        self.fail_cancel.store(true, Ordering::SeqCst);
    }

    /// Returns all submitted drafts.
    #[must_use]
    pub fn submitted(&self) -> Vec<ProposalDraft> {
        lock(&self.submitted).clone()
    }

    /// Returns all cancelled proposal ids.
    #[must_use]
    pub fn cancelled(&self) -> Vec<String> {
        lock(&self.cancelled).clone()
    }
}

#[async_trait]
impl GovernanceGateway for MockGovernance {
    async fn submit_proposal(&self, draft: &ProposalDraft) -> Result<String, GovernanceError> {
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(GovernanceError::Hub {
                message: "mock submission rejected".to_string(),
                status: Some(422),
            });
        }
        lock(&self.submitted).push(draft.clone());
        let nonce = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("proposal-{nonce}"))
    }

    async fn cancel_proposal(&self, proposal_id: &str) -> Result<String, GovernanceError> {
        if self.fail_cancel.load(Ordering::SeqCst) {
            return Err(GovernanceError::Hub {
                message: "mock cancellation rejected".to_string(),
                status: Some(422),
            });
        }
        lock(&self.cancelled).push(proposal_id.to_string());
        let nonce = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("receipt-{nonce}"))
    }

    async fn query_proposals(&self) -> Result<Vec<Proposal>, GovernanceError> {
        Ok(lock(&self.proposals).clone())
    }

    async fn query_space(&self) -> Result<SpaceConfig, GovernanceError> {
        Ok(lock(&self.space).clone())
    }

    async fn fetch_metadata(
        &self,
        content_id: &str,
    ) -> Result<serde_json::Value, GovernanceError> {
        lock(&self.metadata)
            .get(content_id)
            .cloned()
            .ok_or_else(|| GovernanceError::Transport(format!("no blob for {content_id}")))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn metadata_extracts_from_nested_and_flat_blobs() {
        let nested = json!({
            "title": "Fund the thing",
            "metadata": { "issue_id": "I_1", "issue_number": 41, "repo": "core" }
        });
        let metadata = ProposalMetadata::from_value(&nested);
        assert_eq!(metadata.issue_number, 41);
        assert_eq!(metadata.repo, "core");
        assert!(metadata.is_linked());

        let flat = json!({ "issue_id": "I_1", "issue_number": 7, "repo": "core" });
        assert_eq!(ProposalMetadata::from_value(&flat).issue_number, 7);
    }

    #[test]
    fn unparseable_blob_degrades_to_empty_metadata() {
        let metadata = ProposalMetadata::from_value(&json!("not an object"));
        assert_eq!(metadata, ProposalMetadata::default());
        assert!(!metadata.is_linked());
    }

    #[test]
    fn unknown_proposal_states_deserialize_to_unknown() {
        let state: ProposalState = serde_json::from_value(json!("archived")).unwrap();
        assert_eq!(state, ProposalState::Unknown);
        let state: ProposalState = serde_json::from_value(json!("closed")).unwrap();
        assert_eq!(state, ProposalState::Closed);
    }
}
