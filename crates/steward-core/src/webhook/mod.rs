//! Webhook transport boundary.
//!
//! The webhook surface is a thin wrapper, not design-bearing: it
//! verifies the delivery signature, parses the raw payload into a typed
//! [`IssueEvent`], and hands it to the lifecycle handlers. Unknown event
//! kinds and actions are ignored rather than rejected.

mod error;
mod event;
mod signature;

pub use error::WebhookError;
pub use event::{IssueAction, IssueEvent};
pub use signature::verify_signature;

/// Header carrying the HMAC-SHA256 delivery signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Header naming the delivered event kind.
pub const EVENT_HEADER: &str = "x-github-event";
