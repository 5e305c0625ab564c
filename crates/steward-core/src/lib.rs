//! steward-core - DAO board/treasury/governance reconciliation logic.
//!
//! This library keeps three independently-consistent external systems in
//! agreement about work items and proposals: an issue/work-tracking board
//! (GitHub Projects-style GraphQL), an on-chain token treasury, and an
//! off-chain governance-voting ledger. There is no shared database and no
//! transaction boundary spanning the three; agreement is reached through
//! webhook-driven lifecycle handlers plus a periodic pull-based
//! reconciliation loop guarded against duplicate writes.
//!
//! # Modules
//!
//! - [`config`]: Immutable DAO configuration snapshots (payout tiers,
//!   contributor pools, governance label rules) with atomic replacement
//! - [`project`]: Typed mapping of the board's nested GraphQL payload into
//!   a flat [`project::ProjectSnapshot`] of work items and fields
//! - [`payout`]: Step-function payout tier resolver
//! - [`directory`]: Contributor handle to wallet address lookup
//! - [`board`], [`treasury`], [`governance`]: Gateway trait seams for the
//!   three external systems, each with a mock implementation for tests
//! - [`webhook`]: Typed issue lifecycle events and HMAC-SHA256 signature
//!   verification for the webhook transport
//! - [`handlers`]: Event-triggered issue and governance lifecycle handlers
//! - [`reconcile`]: Periodic proposal reconciliation loop folding voting
//!   outcomes back into the board exactly once per proposal closure
//!
//! # Concurrency
//!
//! Every webhook event and every reconciliation tick runs as an
//! independent task. The only cross-task shared value is the
//! [`config::ConfigHandle`], which is replaced atomically by reference on
//! refresh so in-flight handlers always observe one self-consistent (if
//! possibly stale) snapshot. No ordering guarantees are provided across
//! events; idempotency for treasury actions is delegated to the treasury
//! system itself.

pub mod board;
pub mod config;
pub mod context;
pub mod directory;
pub mod governance;
pub mod handlers;
pub mod payout;
pub mod project;
pub mod reconcile;
pub mod treasury;
pub mod webhook;

pub use context::AppContext;
