//! Board gateway seam.
//!
//! The board is reached through a narrow GraphQL-style interface: one
//! read returning the nested project payload, one write updating a
//! single field on a single item, and one REST-style side effect posting
//! an issue comment. The production implementation lives in the daemon
//! crate; [`MockBoard`] backs tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::config::BoardLocator;
use crate::project::ProjectQueryResponse;

/// One field update: sets `field_id` on `item_id` to `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldUpdate {
    /// Opaque project id.
    pub project_id: String,
    /// Opaque item id.
    pub item_id: String,
    /// Opaque field id.
    pub field_id: String,
    /// New field value.
    pub value: String,
}

/// Errors surfaced by the board gateway.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BoardError {
    /// The board API rejected the request.
    #[error("board API error: {message}")]
    Api {
        /// Error message from the API.
        message: String,
        /// HTTP status code, if available.
        status: Option<u16>,
    },

    /// The request never completed.
    #[error("board transport error: {0}")]
    Transport(String),

    /// The response did not match the expected shape.
    #[error("malformed board response: {0}")]
    Decode(String),
}

/// Narrow interface to the work-tracking board.
#[async_trait]
pub trait BoardGateway: Send + Sync {
    /// Fetches the tracked project with its items and field descriptors.
    ///
    /// # Errors
    ///
    /// Returns a [`BoardError`] when the query fails or the response
    /// cannot be decoded.
    async fn fetch_project(&self, locator: &BoardLocator)
        -> Result<ProjectQueryResponse, BoardError>;

    /// Updates one field on one item.
    ///
    /// # Errors
    ///
    /// Returns a [`BoardError`] when the mutation fails.
    async fn update_item_field(&self, update: &FieldUpdate) -> Result<(), BoardError>;

    /// Posts a comment on the originating issue.
    ///
    /// # Errors
    ///
    /// Returns a [`BoardError`] when the write fails.
    async fn post_issue_comment(
        &self,
        org: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<(), BoardError>;
}

/// One recorded issue comment on a [`MockBoard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedComment {
    /// Organization login.
    pub org: String,
    /// Repository name.
    pub repo: String,
    /// Issue number.
    pub number: u64,
    /// Comment body.
    pub body: String,
}

/// In-memory board for tests.
///
/// Serves one canned query response and records every mutation.
#[derive(Debug, Default)]
pub struct MockBoard {
    response: Mutex<Option<serde_json::Value>>,
    updates: Mutex<Vec<FieldUpdate>>,
    comments: Mutex<Vec<RecordedComment>>,
    fail_comments: AtomicBool,
}

impl MockBoard {
    /// Creates a mock serving the given raw query response.
    #[must_use]
    pub fn new(response: serde_json::Value) -> Self {
        Self {
            response: Mutex::new(Some(response)),
            updates: Mutex::new(Vec::new()),
            comments: Mutex::new(Vec::new()),
            fail_comments: AtomicBool::new(false),
        }
    }

    /// Creates a mock with no project; every fetch fails.
    #[must_use]
    pub fn failing() -> Self {
        Self::default()
    }

    /// Makes every subsequent comment post fail.
    pub fn fail_comments(&self) {
        self.fail_comments.store(true, Ordering::SeqCst);
    }

    /// Replaces the canned response.
    pub fn set_response(&self, response: serde_json::Value) {
        *lock(&self.response) = Some(response);
    }

    /// Returns all recorded field updates.
    #[must_use]
    pub fn recorded_updates(&self) -> Vec<FieldUpdate> {
        lock(&self.updates).clone()
    }

    /// Returns all recorded issue comments.
    #[must_use]
    pub fn recorded_comments(&self) -> Vec<RecordedComment> {
        lock(&self.comments).clone()
    }
}

#[async_trait]
impl BoardGateway for MockBoard {
    async fn fetch_project(
        &self,
        _locator: &BoardLocator,
    ) -> Result<ProjectQueryResponse, BoardError> {
        let Some(response) = lock(&self.response).clone() else {
            return Err(BoardError::Transport("mock board has no project".to_string()));
        };
        serde_json::from_value(response).map_err(|error| BoardError::Decode(error.to_string()))
    }

    async fn update_item_field(&self, update: &FieldUpdate) -> Result<(), BoardError> {
        lock(&self.updates).push(update.clone());
        Ok(())
    }

    async fn post_issue_comment(
        &self,
        org: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<(), BoardError> {
        if self.fail_comments.load(Ordering::SeqCst) {
            return Err(BoardError::Api {
                message: "mock comment rejected".to_string(),
                status: Some(422),
            });
        }
        lock(&self.comments).push(RecordedComment {
            org: org.to_string(),
            repo: repo.to_string(),
            number,
            body: body.to_string(),
        });
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
