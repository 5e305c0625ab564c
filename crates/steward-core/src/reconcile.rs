//! Proposal reconciliation loop.
//!
//! Runs on a fixed interval, independent of webhook events. Each pass
//! pulls every proposal authored by this system's identity, joins the
//! closed ones back to board work items through their embedded linkage
//! metadata, and writes the approval weight into the configured board
//! field. The field's presence is the idempotency marker: once it is
//! non-empty for a work item it is never written again, so a proposal
//! whose outcome has been recorded is skipped permanently.
//!
//! Per-proposal writes run in a bounded task group with explicit
//! completion accounting, so a caller knows when a pass has truly
//! finished and what it did.

use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::board::FieldUpdate;
use crate::context::AppContext;
use crate::governance::{GovernanceError, Proposal, ProposalMetadata, ProposalState};
use crate::project::load_snapshot;

/// Upper bound on concurrently reconciling proposals per pass.
pub const MAX_CONCURRENT_WRITES: usize = 4;

/// Completion accounting for one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Proposals returned by the query.
    pub scanned: usize,
    /// Proposals in the closed state.
    pub closed: usize,
    /// Approval scores written this pass.
    pub written: usize,
    /// Closed proposals skipped because their field is already
    /// populated.
    pub skipped: usize,
    /// Closed proposals that could not be reconciled this pass.
    pub failed: usize,
}

/// Outcome of reconciling one closed proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteResult {
    Written,
    Skipped,
    Failed,
}

/// Computes the approval weight of a score vector.
///
/// First-choice score minus the sum of all other choice scores.
#[must_use]
pub fn approval_weight(scores: &[f64]) -> f64 {
    let Some((first, rest)) = scores.split_first() else {
        return 0.0;
    };
    first - rest.iter().sum::<f64>()
}

/// Runs one reconciliation pass.
///
/// # Errors
///
/// Returns an error only when the proposal query itself fails;
/// per-proposal failures are logged and counted in the report.
pub async fn run_once(ctx: &AppContext) -> Result<ReconcileReport, GovernanceError> {
    let proposals = ctx.governance.query_proposals().await?;

    let mut report = ReconcileReport {
        scanned: proposals.len(),
        ..ReconcileReport::default()
    };

    let mut tasks: JoinSet<WriteResult> = JoinSet::new();
    for proposal in proposals
        .into_iter()
        .filter(|proposal| proposal.state == ProposalState::Closed)
    {
        report.closed += 1;
        if tasks.len() >= MAX_CONCURRENT_WRITES {
            if let Some(joined) = tasks.join_next().await {
                tally(&mut report, joined);
            }
        }
        let ctx = ctx.clone();
        tasks.spawn(async move { reconcile_proposal(&ctx, proposal).await });
    }
    while let Some(joined) = tasks.join_next().await {
        tally(&mut report, joined);
    }

    Ok(report)
}

fn tally(report: &mut ReconcileReport, joined: Result<WriteResult, tokio::task::JoinError>) {
    match joined {
        Ok(WriteResult::Written) => report.written += 1,
        Ok(WriteResult::Skipped) => report.skipped += 1,
        Ok(WriteResult::Failed) => report.failed += 1,
        Err(error) => {
            error!(%error, "reconcile task panicked");
            report.failed += 1;
        },
    }
}

async fn reconcile_proposal(ctx: &AppContext, proposal: Proposal) -> WriteResult {
    let metadata = match proposal.ipfs.as_deref() {
        Some(cid) => match ctx.governance.fetch_metadata(cid).await {
            Ok(payload) => ProposalMetadata::from_value(&payload),
            Err(error) => {
                debug!(%error, proposal = %proposal.id, "metadata fetch failed, treating as empty");
                ProposalMetadata::default()
            },
        },
        None => ProposalMetadata::default(),
    };
    if !metadata.is_linked() {
        warn!(proposal = %proposal.id, "closed proposal carries no issue linkage");
        return WriteResult::Failed;
    }

    let config = ctx.config.current();
    let snapshot = match load_snapshot(ctx.board.as_ref(), &config.board).await {
        Ok(snapshot) => snapshot,
        Err(error) => {
            error!(%error, proposal = %proposal.id, "board query failed during reconciliation");
            return WriteResult::Failed;
        },
    };

    let Some(item) = snapshot.find_item_by_number(metadata.issue_number) else {
        warn!(
            proposal = %proposal.id,
            number = metadata.issue_number,
            "no work item matches proposal metadata"
        );
        return WriteResult::Failed;
    };

    if item.has_field_value(&config.approval_field) {
        debug!(proposal = %proposal.id, "approval already recorded, skipping");
        return WriteResult::Skipped;
    }

    let Some(field_id) = snapshot.field_id(&config.approval_field) else {
        warn!(field = %config.approval_field, "approval field not present on the board");
        return WriteResult::Failed;
    };

    let approval = approval_weight(&proposal.scores);
    let update = FieldUpdate {
        project_id: snapshot.project.id.clone(),
        item_id: item.item_id.clone(),
        field_id: field_id.to_string(),
        value: format_approval(approval),
    };

    match ctx.board.update_item_field(&update).await {
        Ok(()) => {
            debug!(
                proposal = %proposal.id,
                number = metadata.issue_number,
                approval,
                "approval recorded"
            );
            WriteResult::Written
        },
        Err(error) => {
            error!(%error, proposal = %proposal.id, "failed to write approval field");
            WriteResult::Failed
        },
    }
}

fn format_approval(approval: f64) -> String {
    if approval.fract() == 0.0 {
        format!("{approval:.0}")
    } else {
        approval.to_string()
    }
}
