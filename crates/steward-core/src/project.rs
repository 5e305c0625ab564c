//! Project snapshot loading.
//!
//! The board query returns a deeply nested, paginated GraphQL payload.
//! This module declares explicit typed records for that payload and a
//! pure mapping step that flattens it into a [`ProjectSnapshot`]: one
//! flat, ordered list of [`WorkItem`]s with resolved field values plus
//! the board's field descriptors. Keeping the mapping at the system
//! boundary isolates the core logic from response shape drift.
//!
//! Snapshots are reconstructed fresh on every board query and never
//! cached across events; a work item has no persisted identity beyond
//! the board's own item id.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::board::{BoardError, BoardGateway};
use crate::config::BoardLocator;

/// Name of the board field whose encoded options blob maps status ids
/// to display names.
const STATUS_FIELD: &str = "Status";

/// Name of the numeric weight field used for payout eligibility.
const WEIGHT_FIELD: &str = "Weight";

// =============================================================================
// Raw query records
// =============================================================================

/// Top level of the board project query response.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectQueryResponse {
    /// The organization that owns the project.
    pub organization: OrganizationNode,
}

/// Organization wrapper node.
#[derive(Debug, Clone, Deserialize)]
pub struct OrganizationNode {
    /// The queried project.
    #[serde(rename = "projectV2")]
    pub project: ProjectNode,
}

/// Raw project node.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectNode {
    /// Opaque project id, required by field mutations.
    pub id: String,
    /// Project number within the organization.
    pub number: u64,
    /// Project title.
    pub title: String,
    /// Optional project description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the project is closed.
    #[serde(default)]
    pub closed: bool,
    /// Paginated item edges.
    #[serde(default)]
    pub items: Connection<ItemNode>,
    /// Paginated field descriptor edges.
    #[serde(default)]
    pub fields: Connection<FieldNode>,
}

/// Generic paginated connection.
#[derive(Debug, Clone, Deserialize)]
pub struct Connection<T> {
    /// Edge list in source order.
    #[serde(default = "Vec::new")]
    pub edges: Vec<Edge<T>>,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self { edges: Vec::new() }
    }
}

/// Generic connection edge.
#[derive(Debug, Clone, Deserialize)]
pub struct Edge<T> {
    /// The wrapped node.
    pub node: T,
}

/// Raw project item node.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemNode {
    /// Opaque item id, required by field mutations.
    pub id: String,
    /// Issue content; absent for draft cards, which are skipped.
    #[serde(default)]
    pub content: Option<IssueContent>,
    /// Field value edges for this item.
    #[serde(rename = "fieldValues", default)]
    pub field_values: Connection<FieldValueNode>,
}

/// Issue content embedded in an item node.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueContent {
    /// Issue number within its repository.
    pub number: u64,
    /// Issue title.
    #[serde(default)]
    pub title: String,
    /// Issue body.
    #[serde(default)]
    pub body: String,
    /// Issue lifecycle state.
    pub state: ItemState,
    /// Originating repository.
    pub repository: RepositoryNode,
    /// Assignee edges in source order.
    #[serde(default)]
    pub assignees: Connection<AssigneeNode>,
    /// Label edges in source order.
    #[serde(default)]
    pub labels: Connection<LabelNode>,
}

/// Repository reference.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryNode {
    /// Repository name.
    pub name: String,
}

/// Assignee node.
#[derive(Debug, Clone, Deserialize)]
pub struct AssigneeNode {
    /// Assignee login.
    pub login: String,
}

/// Label node.
#[derive(Debug, Clone, Deserialize)]
pub struct LabelNode {
    /// Label name.
    pub name: String,
}

/// Raw field value node on an item.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldValueNode {
    /// Encoded value; for the status field this is an option id.
    #[serde(default)]
    pub value: Option<String>,
    /// The field this value belongs to.
    #[serde(rename = "projectField", default)]
    pub field: Option<FieldRef>,
}

/// Field reference on a field value node.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldRef {
    /// Field name.
    pub name: String,
}

/// Raw field descriptor node.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldNode {
    /// Opaque field id, required by field mutations.
    pub id: String,
    /// Field name.
    pub name: String,
    /// Encoded settings blob; for the status field this carries the
    /// option list as a JSON string.
    #[serde(default)]
    pub settings: Option<String>,
}

/// Issue lifecycle state.
///
/// The board query reports `OPEN`/`CLOSED`; webhook payloads report
/// `open`/`closed`. Both spellings deserialize to the same variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemState {
    /// The issue is open.
    #[serde(rename = "OPEN", alias = "open")]
    Open,
    /// The issue is closed.
    #[serde(rename = "CLOSED", alias = "closed")]
    Closed,
}

// =============================================================================
// Snapshot
// =============================================================================

/// Project metadata carried on a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectInfo {
    /// Opaque project id.
    pub id: String,
    /// Project number.
    pub number: u64,
    /// Project title.
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Whether the project is closed.
    pub closed: bool,
}

/// One board field descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct FieldDescriptor {
    /// Opaque field id.
    pub id: String,
    /// Field name.
    pub name: String,
}

/// One board entry bound to exactly one tracked issue.
///
/// `repo` plus `number` uniquely identifies a work item within one
/// snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct WorkItem {
    /// Opaque board item id.
    pub item_id: String,
    /// Issue number within its repository.
    pub number: u64,
    /// Originating repository name.
    pub repo: String,
    /// Issue title.
    pub title: String,
    /// Issue body.
    pub body: String,
    /// Issue lifecycle state.
    pub state: ItemState,
    /// Assignee handles in source order; only the first is used.
    pub assignees: Vec<String>,
    /// Label names in source order.
    pub labels: Vec<String>,
    /// Resolved field name to value mapping.
    pub fields: BTreeMap<String, String>,
}

impl WorkItem {
    /// Returns the numeric weight, or `0` when the field is absent or
    /// not numeric.
    #[must_use]
    pub fn weight(&self) -> f64 {
        self.fields
            .get(WEIGHT_FIELD)
            .and_then(|value| value.parse().ok())
            .unwrap_or(0.0)
    }

    /// Whether the named field currently holds a non-empty value.
    #[must_use]
    pub fn has_field_value(&self, name: &str) -> bool {
        self.fields.get(name).is_some_and(|value| !value.is_empty())
    }
}

/// Flat, ordered view of one board project query.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectSnapshot {
    /// Project metadata.
    pub project: ProjectInfo,
    /// Work items in board order.
    pub items: Vec<WorkItem>,
    /// Field descriptors in board order.
    pub fields: Vec<FieldDescriptor>,
}

impl ProjectSnapshot {
    /// Maps one fetched query response into a flat snapshot.
    ///
    /// Resolves the status field's encoded option list before mapping
    /// item field values; a missing or garbled settings blob silently
    /// yields an empty status map. Items without issue content (draft
    /// cards) are skipped. Source order of assignees, labels, and
    /// fields is preserved.
    #[must_use]
    pub fn from_response(response: ProjectQueryResponse) -> Self {
        let project = response.organization.project;
        let statuses = status_options(&project.fields);

        let fields = project
            .fields
            .edges
            .iter()
            .map(|edge| FieldDescriptor {
                id: edge.node.id.clone(),
                name: edge.node.name.clone(),
            })
            .collect();

        let items = project
            .items
            .edges
            .into_iter()
            .filter_map(|edge| map_item(edge.node, &statuses))
            .collect();

        Self {
            project: ProjectInfo {
                id: project.id,
                number: project.number,
                title: project.title,
                description: project.description,
                closed: project.closed,
            },
            items,
            fields,
        }
    }

    /// Finds the work item for `repo` + issue `number`.
    #[must_use]
    pub fn find_item(&self, repo: &str, number: u64) -> Option<&WorkItem> {
        self.items
            .iter()
            .find(|item| item.number == number && item.repo == repo)
    }

    /// Finds a work item by issue number alone, as embedded proposal
    /// metadata carries.
    #[must_use]
    pub fn find_item_by_number(&self, number: u64) -> Option<&WorkItem> {
        self.items.iter().find(|item| item.number == number)
    }

    /// Returns the field id for a field name.
    #[must_use]
    pub fn field_id(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.id.as_str())
    }
}

/// Fetches the board project and maps it into a snapshot.
///
/// # Errors
///
/// Fetch failures propagate to the caller uncaught; the caller decides
/// whether to abort the triggering event.
pub async fn load_snapshot(
    board: &dyn BoardGateway,
    locator: &BoardLocator,
) -> Result<ProjectSnapshot, BoardError> {
    let response = board.fetch_project(locator).await?;
    Ok(ProjectSnapshot::from_response(response))
}

/// Shape of the status field's settings blob.
#[derive(Debug, Deserialize)]
struct StatusSettings {
    #[serde(default)]
    options: Vec<StatusOption>,
}

#[derive(Debug, Deserialize)]
struct StatusOption {
    id: String,
    name: String,
}

fn status_options(fields: &Connection<FieldNode>) -> HashMap<String, String> {
    let Some(settings) = fields
        .edges
        .iter()
        .find(|edge| edge.node.name == STATUS_FIELD)
        .and_then(|edge| edge.node.settings.as_deref())
    else {
        return HashMap::new();
    };

    match serde_json::from_str::<StatusSettings>(settings) {
        Ok(parsed) => parsed
            .options
            .into_iter()
            .map(|option| (option.id, option.name))
            .collect(),
        Err(error) => {
            debug!(%error, "unparseable status settings blob, using empty status map");
            HashMap::new()
        },
    }
}

fn map_item(item: ItemNode, statuses: &HashMap<String, String>) -> Option<WorkItem> {
    let content = item.content?;

    let mut fields = BTreeMap::new();
    for edge in item.field_values.edges {
        let Some(field) = edge.node.field else { continue };
        let Some(value) = edge.node.value else { continue };
        if field.name == STATUS_FIELD {
            // Unknown option ids stay unmapped, as if the field were
            // absent.
            if let Some(name) = statuses.get(&value) {
                fields.insert(field.name, name.clone());
            }
        } else {
            fields.insert(field.name, value);
        }
    }

    Some(WorkItem {
        item_id: item.id,
        number: content.number,
        repo: content.repository.name,
        title: content.title,
        body: content.body,
        state: content.state,
        assignees: content
            .assignees
            .edges
            .into_iter()
            .map(|edge| edge.node.login)
            .collect(),
        labels: content
            .labels
            .edges
            .into_iter()
            .map(|edge| edge.node.name)
            .collect(),
        fields,
    })
}
