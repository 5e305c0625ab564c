//! Webhook-specific error types.

use thiserror::Error;

/// Errors that can occur while accepting a webhook delivery.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WebhookError {
    /// The delivery carried no signature header.
    #[error("missing delivery signature")]
    MissingSignature,

    /// The signature header could not be decoded.
    #[error("malformed delivery signature: {0}")]
    MalformedSignature(String),

    /// The signature did not match the payload.
    #[error("delivery signature mismatch")]
    SignatureMismatch,

    /// The payload could not be parsed.
    #[error("malformed webhook payload: {0}")]
    Payload(#[from] serde_json::Error),
}
