//! Shared application context.

use std::sync::Arc;

use crate::board::BoardGateway;
use crate::config::ConfigHandle;
use crate::governance::GovernanceGateway;
use crate::treasury::TreasuryGateway;

/// Explicit context constructed once at startup and passed into every
/// handler and loop invocation.
///
/// The configuration handle is the only cross-task shared mutable
/// value; the gateways are stateless connectors. Cloning the context is
/// cheap (reference counts only), which lets each webhook event and
/// each reconciliation task carry its own copy.
#[derive(Clone)]
pub struct AppContext {
    /// Latest configuration snapshot.
    pub config: Arc<ConfigHandle>,
    /// Board (work-tracking) gateway.
    pub board: Arc<dyn BoardGateway>,
    /// On-chain treasury gateway.
    pub treasury: Arc<dyn TreasuryGateway>,
    /// Off-chain governance gateway.
    pub governance: Arc<dyn GovernanceGateway>,
}

impl AppContext {
    /// Builds a context from its collaborators.
    #[must_use]
    pub fn new(
        config: Arc<ConfigHandle>,
        board: Arc<dyn BoardGateway>,
        treasury: Arc<dyn TreasuryGateway>,
        governance: Arc<dyn GovernanceGateway>,
    ) -> Self {
        Self {
            config,
            board,
            treasury,
            governance,
        }
    }
}
