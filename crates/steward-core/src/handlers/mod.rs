//! Event-triggered lifecycle handlers.
//!
//! Each webhook event runs one handler invocation with no shared
//! mutable state beyond the configuration snapshot it reads at entry.
//! Handlers are terminal boundaries: every failure mode is logged and
//! reported as an outcome, and nothing re-throws past a handler
//! invocation except a board fetch failure, which the dispatching
//! caller decides how to surface.

mod governance;
mod issue;

pub use governance::{GovernanceOutcome, handle_label_event};
pub use issue::{IssueOutcome, handle_issue_event};
