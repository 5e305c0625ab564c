//! steward-daemon - DAO reconciliation daemon library.
//!
//! Thin I/O shell around [`steward_core`]: the webhook server, the
//! reqwest-based gateway implementations for the three external
//! systems, the HTTP configuration source, and the timer loops driving
//! configuration refresh and proposal reconciliation.
//!
//! # Modules
//!
//! - [`settings`]: TOML daemon settings (listen address, endpoint URLs,
//!   intervals, secret environment variable names)
//! - [`github`]: GitHub GraphQL/REST implementation of the board
//!   gateway
//! - [`treasury_rpc`]: JSON-RPC implementation of the treasury gateway
//! - [`snapshot_hub`]: Snapshot-style hub implementation of the
//!   governance gateway
//! - [`config_source`]: HTTP fetch and assembly of the three DAO
//!   configuration documents
//! - [`server`]: axum router with the webhook, `/work`, and `/healthz`
//!   endpoints
//! - [`loops`]: interval tasks for configuration refresh and
//!   reconciliation passes

pub mod config_source;
pub mod github;
pub mod loops;
pub mod server;
pub mod settings;
pub mod snapshot_hub;
pub mod treasury_rpc;
