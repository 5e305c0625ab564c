//! Production governance gateway.
//!
//! Talks to a Snapshot-style hub: proposal submission and cancellation
//! go through the hub's message envelope endpoint, queries go through
//! its GraphQL endpoint, and full proposal payloads are fetched from a
//! content-addressed storage gateway. The governance space comes from
//! the live DAO configuration.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use steward_core::config::ConfigHandle;
use steward_core::governance::{
    GovernanceError, GovernanceGateway, Proposal, ProposalDraft, SpaceConfig,
};
use tracing::debug;

/// Governance gateway backed by a Snapshot-style hub.
pub struct SnapshotHub {
    http: reqwest::Client,
    hub_url: String,
    ipfs_gateway_url: String,
    author: String,
    config: Arc<ConfigHandle>,
}

impl SnapshotHub {
    /// Creates a gateway using the given shared HTTP client.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        hub_url: String,
        ipfs_gateway_url: String,
        author: String,
        config: Arc<ConfigHandle>,
    ) -> Self {
        Self {
            http,
            hub_url,
            ipfs_gateway_url,
            author,
            config,
        }
    }

    /// Posts one message envelope to the hub and returns the receipt
    /// identifier.
    async fn post_message(
        &self,
        space: &str,
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<String, GovernanceError> {
        let message = json!({
            "space": space,
            "type": kind,
            "timestamp": Utc::now().timestamp().to_string(),
            "payload": payload,
        });
        let envelope = json!({
            "address": self.author,
            "msg": message.to_string(),
        });

        let response = self
            .http
            .post(format!("{}/api/message", self.hub_url))
            .json(&envelope)
            .send()
            .await
            .map_err(|error| GovernanceError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GovernanceError::Hub {
                message,
                status: Some(status.as_u16()),
            });
        }

        let receipt: HubReceipt = response
            .json()
            .await
            .map_err(|error| GovernanceError::Decode(error.to_string()))?;
        receipt
            .id
            .or(receipt.ipfs_hash)
            .ok_or_else(|| GovernanceError::Decode("hub receipt carried no id".to_string()))
    }

    async fn graphql<T: serde::de::DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, GovernanceError> {
        let response = self
            .http
            .post(format!("{}/graphql", self.hub_url))
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|error| GovernanceError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GovernanceError::Hub {
                message,
                status: Some(status.as_u16()),
            });
        }

        let envelope: GraphQlEnvelope<T> = response
            .json()
            .await
            .map_err(|error| GovernanceError::Decode(error.to_string()))?;

        if let Some(error) = envelope.errors.first() {
            return Err(GovernanceError::Hub {
                message: error.message.clone(),
                status: None,
            });
        }
        envelope.data.ok_or_else(|| {
            GovernanceError::Decode("GraphQL response carried neither data nor errors".to_string())
        })
    }
}

#[async_trait]
impl GovernanceGateway for SnapshotHub {
    async fn submit_proposal(&self, draft: &ProposalDraft) -> Result<String, GovernanceError> {
        debug!(space = %draft.space, title = %draft.title, "submitting proposal");
        let payload = json!({
            "name": draft.title,
            "body": draft.body,
            "choices": draft.choices,
            "start": draft.start,
            "end": draft.end,
            "snapshot": draft.snapshot_height,
            "metadata": {
                "strategies": draft.strategies,
                "plugins": draft.plugins,
                "issue_id": draft.metadata.issue_id,
                "issue_number": draft.metadata.issue_number,
                "repo": draft.metadata.repo,
            },
        });
        self.post_message(&draft.space, "proposal", payload).await
    }

    async fn cancel_proposal(&self, proposal_id: &str) -> Result<String, GovernanceError> {
        debug!(%proposal_id, "cancelling proposal");
        let space = self.config.current().space.clone();
        self.post_message(&space, "delete-proposal", json!({ "proposal": proposal_id }))
            .await
    }

    async fn query_proposals(&self) -> Result<Vec<Proposal>, GovernanceError> {
        let space = self.config.current().space.clone();
        let data: ProposalsData = self
            .graphql(
                PROPOSALS_QUERY,
                json!({ "space": space, "author": self.author }),
            )
            .await?;
        Ok(data.proposals)
    }

    async fn query_space(&self) -> Result<SpaceConfig, GovernanceError> {
        let space = self.config.current().space.clone();
        let data: SpaceData = self.graphql(SPACE_QUERY, json!({ "id": space })).await?;
        Ok(data.space.unwrap_or_default())
    }

    async fn fetch_metadata(
        &self,
        content_id: &str,
    ) -> Result<serde_json::Value, GovernanceError> {
        let response = self
            .http
            .get(format!("{}/ipfs/{content_id}", self.ipfs_gateway_url))
            .send()
            .await
            .map_err(|error| GovernanceError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GovernanceError::Hub {
                message: format!("storage gateway returned {status} for {content_id}"),
                status: Some(status.as_u16()),
            });
        }
        response
            .json()
            .await
            .map_err(|error| GovernanceError::Decode(error.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct HubReceipt {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "ipfsHash")]
    ipfs_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphQlEnvelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ProposalsData {
    #[serde(default)]
    proposals: Vec<Proposal>,
}

#[derive(Debug, Deserialize)]
struct SpaceData {
    space: Option<SpaceConfig>,
}

const PROPOSALS_QUERY: &str = r#"
query($space: String!, $author: String!) {
  proposals(where: { space: $space, author: $author }, orderBy: "state") {
    id
    title
    body
    choices
    start
    end
    state
    scores
    scores_total
    ipfs
  }
}
"#;

const SPACE_QUERY: &str = r"
query($id: String!) {
  space(id: $id) {
    id
    strategies { name params }
    plugins
  }
}
";
