//! Production board gateway.
//!
//! Talks to the board's GraphQL endpoint for the project query and the
//! field mutation, and to its REST endpoint for issue comments. All
//! response decoding into typed records happens in `steward-core`; this
//! module only moves bytes and unwraps the GraphQL envelope.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use steward_core::board::{BoardError, BoardGateway, FieldUpdate};
use steward_core::config::BoardLocator;
use steward_core::project::ProjectQueryResponse;
use tracing::debug;

const USER_AGENT: &str = concat!("dao-steward/", env!("CARGO_PKG_VERSION"));

/// Board gateway backed by the GitHub GraphQL and REST APIs.
pub struct GithubBoard {
    http: reqwest::Client,
    graphql_url: String,
    rest_url: String,
    token: SecretString,
}

impl GithubBoard {
    /// Creates a gateway using the given shared HTTP client.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        graphql_url: String,
        rest_url: String,
        token: SecretString,
    ) -> Self {
        Self {
            http,
            graphql_url,
            rest_url,
            token,
        }
    }

    async fn graphql<T: serde::de::DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, BoardError> {
        let response = self
            .http
            .post(&self.graphql_url)
            .bearer_auth(self.token.expose_secret())
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|error| BoardError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BoardError::Api {
                message,
                status: Some(status.as_u16()),
            });
        }

        let envelope: GraphQlEnvelope<T> = response
            .json()
            .await
            .map_err(|error| BoardError::Decode(error.to_string()))?;

        if let Some(error) = envelope.errors.first() {
            return Err(BoardError::Api {
                message: error.message.clone(),
                status: None,
            });
        }
        envelope.data.ok_or_else(|| {
            BoardError::Decode("GraphQL response carried neither data nor errors".to_string())
        })
    }
}

#[async_trait]
impl BoardGateway for GithubBoard {
    async fn fetch_project(
        &self,
        locator: &BoardLocator,
    ) -> Result<ProjectQueryResponse, BoardError> {
        debug!(org = %locator.org, number = locator.project_number, "fetching board project");
        self.graphql(
            PROJECT_QUERY,
            json!({ "org": locator.org, "number": locator.project_number }),
        )
        .await
    }

    async fn update_item_field(&self, update: &FieldUpdate) -> Result<(), BoardError> {
        debug!(item = %update.item_id, field = %update.field_id, "updating board field");
        let _ack: serde_json::Value = self
            .graphql(
                FIELD_MUTATION,
                json!({
                    "projectId": update.project_id,
                    "itemId": update.item_id,
                    "fieldId": update.field_id,
                    "value": update.value,
                }),
            )
            .await?;
        Ok(())
    }

    async fn post_issue_comment(
        &self,
        org: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<(), BoardError> {
        let url = format!("{}/repos/{org}/{repo}/issues/{number}/comments", self.rest_url);
        let response = self
            .http
            .post(url)
            .bearer_auth(self.token.expose_secret())
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .json(&json!({ "body": body }))
            .send()
            .await
            .map_err(|error| BoardError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BoardError::Api {
                message,
                status: Some(status.as_u16()),
            });
        }
        Ok(())
    }
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

/// Full project read: metadata, items with issue content and field
/// values, and field descriptors with their settings blobs. Page sizes
/// match the board's documented connection limits.
const PROJECT_QUERY: &str = r"
query($org: String!, $number: Int!) {
  organization(login: $org) {
    projectV2(number: $number) {
      id
      number
      title
      description: shortDescription
      closed
      items(first: 100) {
        edges {
          node {
            id
            content {
              ... on Issue {
                number
                title
                body
                state
                repository { name }
                assignees(last: 3) { edges { node { login } } }
                labels(last: 20) { edges { node { name } } }
              }
            }
            fieldValues(last: 20) {
              edges {
                node {
                  ... on ProjectV2ItemFieldValueCommon {
                    value: text
                    projectField: field {
                      ... on ProjectV2FieldCommon { name }
                    }
                  }
                }
              }
            }
          }
        }
      }
      fields(last: 20) {
        edges {
          node {
            ... on ProjectV2FieldCommon {
              id
              name
              settings
            }
          }
        }
      }
    }
  }
}
";

const FIELD_MUTATION: &str = r"
mutation($projectId: ID!, $itemId: ID!, $fieldId: ID!, $value: String!) {
  updateProjectV2ItemFieldValue(
    input: { projectId: $projectId, itemId: $itemId, fieldId: $fieldId, value: { text: $value } }
  ) {
    projectV2Item { id }
  }
}
";
