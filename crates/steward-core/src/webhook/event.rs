//! Typed issue lifecycle events.

use serde::Deserialize;

use super::WebhookError;
use crate::project::ItemState;

/// Issue lifecycle actions this core acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueAction {
    /// Issue opened; an explicit no-op placeholder.
    Opened,
    /// An assignee was added.
    Assigned,
    /// An assignee was removed.
    Unassigned,
    /// The issue was closed.
    Closed,
    /// A label was added.
    Labeled,
    /// A label was removed.
    Unlabeled,
}

/// One parsed issue lifecycle event.
#[derive(Debug, Clone)]
pub struct IssueEvent {
    /// The action that occurred.
    pub action: IssueAction,
    /// Originating repository name.
    pub repo: String,
    /// Issue number within its repository.
    pub number: u64,
    /// Opaque issue id, embedded in proposal metadata.
    pub issue_id: String,
    /// Issue title at event time.
    pub title: String,
    /// Issue body at event time.
    pub body: String,
    /// Issue state at event time.
    pub state: ItemState,
    /// The affected assignee for assign/unassign events.
    ///
    /// For unassignment this is the *removed* assignee, which by the
    /// time the board is reloaded no longer appears on the item itself.
    pub assignee: Option<String>,
    /// The affected label for label events.
    pub label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    action: String,
    issue: EnvelopeIssue,
    repository: EnvelopeRepository,
    #[serde(default)]
    assignee: Option<EnvelopeActor>,
    #[serde(default)]
    label: Option<EnvelopeLabel>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeIssue {
    node_id: String,
    number: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: Option<String>,
    state: ItemState,
}

#[derive(Debug, Deserialize)]
struct EnvelopeRepository {
    name: String,
}

#[derive(Debug, Deserialize)]
struct EnvelopeActor {
    login: String,
}

#[derive(Debug, Deserialize)]
struct EnvelopeLabel {
    name: String,
}

impl IssueEvent {
    /// Parses a delivery into a typed event.
    ///
    /// Returns `Ok(None)` for event kinds other than `issues` and for
    /// actions this core does not consume; both are ignored, not
    /// errors.
    ///
    /// # Errors
    ///
    /// Returns a [`WebhookError`] when an `issues` payload cannot be
    /// parsed.
    pub fn from_delivery(event_kind: &str, body: &[u8]) -> Result<Option<Self>, WebhookError> {
        if event_kind != "issues" {
            return Ok(None);
        }

        let envelope: Envelope = serde_json::from_slice(body)?;
        let action = match envelope.action.as_str() {
            "opened" => IssueAction::Opened,
            "assigned" => IssueAction::Assigned,
            "unassigned" => IssueAction::Unassigned,
            "closed" => IssueAction::Closed,
            "labeled" => IssueAction::Labeled,
            "unlabeled" => IssueAction::Unlabeled,
            _ => return Ok(None),
        };

        Ok(Some(Self {
            action,
            repo: envelope.repository.name,
            number: envelope.issue.number,
            issue_id: envelope.issue.node_id,
            title: envelope.issue.title,
            body: envelope.issue.body.unwrap_or_default(),
            state: envelope.issue.state,
            assignee: envelope.assignee.map(|actor| actor.login),
            label: envelope.label.map(|label| label.name),
        }))
    }
}
