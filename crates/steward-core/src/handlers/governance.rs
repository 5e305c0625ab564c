//! Governance lifecycle handler.
//!
//! Maps label transitions to governance-proposal creation and
//! cancellation. Both directions are fire-and-forget toward the
//! governance system: failures are logged, never retried, and there is
//! no local state change to roll back.

use chrono::Utc;
use tracing::{error, info};

use crate::config::GovernanceLabelRule;
use crate::context::AppContext;
use crate::governance::{ProposalDraft, ProposalMetadata, ProposalState};
use crate::project::ItemState;
use crate::webhook::{IssueAction, IssueEvent};

/// Terminal outcome of one governance handler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GovernanceOutcome {
    /// The action or label is not one this handler consumes.
    Ignored,
    /// The issue is not open.
    Ineligible,
    /// The removed label is configured but not cancelable.
    NotCancelable,
    /// No open proposal carries this issue's linkage metadata.
    NoMatchingProposal,
    /// An outbound governance call failed; logged, not retried.
    Failed,
    /// A proposal was submitted.
    Submitted {
        /// Hub receipt identifier.
        receipt: String,
    },
    /// A proposal cancellation was requested.
    Cancelled {
        /// Hub receipt identifier.
        receipt: String,
    },
}

/// Handles one label transition.
pub async fn handle_label_event(ctx: &AppContext, event: &IssueEvent) -> GovernanceOutcome {
    match event.action {
        IssueAction::Labeled => submit(ctx, event).await,
        IssueAction::Unlabeled => cancel(ctx, event).await,
        _ => GovernanceOutcome::Ignored,
    }
}

/// Computes the voting window from the rule's offsets relative to
/// `now`.
#[must_use]
pub fn voting_window(rule: &GovernanceLabelRule, now: i64) -> (i64, i64) {
    let start = now + rule.start_offset_secs;
    (start, start + rule.duration_secs)
}

async fn submit(ctx: &AppContext, event: &IssueEvent) -> GovernanceOutcome {
    let config = ctx.config.current();
    let Some((label, rule)) = configured_rule(&config, event) else {
        return GovernanceOutcome::Ignored;
    };
    if event.state != ItemState::Open {
        info!(%label, repo = %event.repo, number = event.number, "issue not open, no proposal");
        return GovernanceOutcome::Ineligible;
    }

    let (start, end) = voting_window(rule, Utc::now().timestamp());

    let height = match ctx.treasury.block_height().await {
        Ok(height) => height,
        Err(error) => {
            error!(%error, "failed to fetch chain height for proposal snapshot");
            return GovernanceOutcome::Failed;
        },
    };
    let space = match ctx.governance.query_space().await {
        Ok(space) => space,
        Err(error) => {
            error!(%error, "failed to fetch governance space configuration");
            return GovernanceOutcome::Failed;
        },
    };

    let draft = ProposalDraft {
        space: config.space.clone(),
        title: event.title.clone(),
        body: event.body.clone(),
        choices: rule.choices.clone(),
        start,
        end,
        snapshot_height: height,
        strategies: space.strategies,
        plugins: space.plugins,
        metadata: ProposalMetadata {
            issue_id: event.issue_id.clone(),
            issue_number: event.number,
            repo: event.repo.clone(),
        },
    };

    match ctx.governance.submit_proposal(&draft).await {
        Ok(receipt) => {
            info!(%label, %receipt, number = event.number, "proposal submitted");
            GovernanceOutcome::Submitted { receipt }
        },
        Err(error) => {
            error!(%error, %label, "failed to submit proposal");
            GovernanceOutcome::Failed
        },
    }
}

async fn cancel(ctx: &AppContext, event: &IssueEvent) -> GovernanceOutcome {
    let config = ctx.config.current();
    let Some((label, rule)) = configured_rule(&config, event) else {
        return GovernanceOutcome::Ignored;
    };
    if !rule.cancelable {
        info!(%label, "label is not cancelable, leaving proposal open");
        return GovernanceOutcome::NotCancelable;
    }
    if event.state != ItemState::Open {
        info!(%label, repo = %event.repo, number = event.number, "issue not open, no cancellation");
        return GovernanceOutcome::Ineligible;
    }

    let proposals = match ctx.governance.query_proposals().await {
        Ok(proposals) => proposals,
        Err(error) => {
            error!(%error, "failed to query proposals for cancellation");
            return GovernanceOutcome::Failed;
        },
    };

    // Join open proposals back to this issue through their embedded
    // linkage metadata. No match fails closed: logged, no cancellation
    // is guessed.
    for proposal in proposals
        .iter()
        .filter(|proposal| proposal.state == ProposalState::Active)
    {
        let Some(cid) = proposal.ipfs.as_deref() else {
            continue;
        };
        let metadata = match ctx.governance.fetch_metadata(cid).await {
            Ok(payload) => ProposalMetadata::from_value(&payload),
            Err(_) => continue,
        };
        if metadata.issue_id == event.issue_id {
            return match ctx.governance.cancel_proposal(&proposal.id).await {
                Ok(receipt) => {
                    info!(%label, proposal = %proposal.id, %receipt, "proposal cancelled");
                    GovernanceOutcome::Cancelled { receipt }
                },
                Err(error) => {
                    error!(%error, proposal = %proposal.id, "failed to cancel proposal");
                    GovernanceOutcome::Failed
                },
            };
        }
    }

    error!(
        %label,
        repo = %event.repo,
        number = event.number,
        "no open proposal matches the unlabeled issue"
    );
    GovernanceOutcome::NoMatchingProposal
}

fn configured_rule<'a>(
    config: &'a crate::config::DaoConfig,
    event: &'a IssueEvent,
) -> Option<(&'a str, &'a GovernanceLabelRule)> {
    let label = event.label.as_deref()?;
    config
        .governance_label(label)
        .map(|rule| (label, rule))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::board::MockBoard;
    use crate::config::{ConfigHandle, DaoConfig, DaoParameters};
    use crate::governance::{MockGovernance, Proposal, SpaceConfig};
    use crate::treasury::MockTreasury;

    fn config(cancelable: bool) -> DaoConfig {
        let parameters: DaoParameters = serde_json::from_value(json!({
            "github-owner": "gitvern",
            "github-project-number": 1,
            "weight-payouts": { "0": "0" },
            "governance-space": "gitvern.eth",
            "governance-labels": {
                "dao-vote": {
                    "start-offset-secs": 3600,
                    "duration-secs": 86400,
                    "cancelable": cancelable
                }
            },
            "treasury": { "contract": "0xc0ffee" },
            "token": { "symbol": "DAO" },
            "network": { "explorer-url": "https://explorer.test" }
        }))
        .unwrap();
        DaoConfig::from_documents(parameters, vec![], vec![]).unwrap()
    }

    fn context(cancelable: bool) -> (AppContext, Arc<MockGovernance>, Arc<MockTreasury>) {
        let governance = Arc::new(MockGovernance::new());
        governance.set_space(SpaceConfig {
            id: "gitvern.eth".to_string(),
            strategies: vec![json!({ "name": "erc20-balance-of" })],
            plugins: json!({}),
        });
        let treasury = Arc::new(MockTreasury::new());
        treasury.set_height(1_234_567);
        let ctx = AppContext::new(
            Arc::new(ConfigHandle::new(config(cancelable))),
            Arc::new(MockBoard::failing()),
            Arc::clone(&treasury) as _,
            Arc::clone(&governance) as _,
        );
        (ctx, governance, treasury)
    }

    fn event(action: IssueAction, label: &str, state: ItemState) -> IssueEvent {
        IssueEvent {
            action,
            repo: "core".to_string(),
            number: 41,
            issue_id: "I_41".to_string(),
            title: "Fund the thing".to_string(),
            body: "Proposal details".to_string(),
            state,
            assignee: None,
            label: Some(label.to_string()),
        }
    }

    fn active_proposal(id: &str, issue_id: &str) -> (Proposal, serde_json::Value) {
        let proposal: Proposal = serde_json::from_value(json!({
            "id": id,
            "title": "Fund the thing",
            "state": "active",
            "ipfs": format!("Qm{id}")
        }))
        .unwrap();
        let payload = json!({ "metadata": {
            "issue_id": issue_id, "issue_number": 41, "repo": "core"
        }});
        (proposal, payload)
    }

    #[tokio::test]
    async fn labeling_an_open_issue_submits_a_linked_proposal() {
        let (ctx, governance, _treasury) = context(true);

        let outcome =
            handle_label_event(&ctx, &event(IssueAction::Labeled, "dao-vote", ItemState::Open))
                .await;

        assert!(matches!(outcome, GovernanceOutcome::Submitted { .. }));
        let drafts = governance.submitted();
        assert_eq!(drafts.len(), 1);
        let draft = &drafts[0];
        assert_eq!(draft.space, "gitvern.eth");
        assert_eq!(draft.title, "Fund the thing");
        assert_eq!(draft.snapshot_height, 1_234_567);
        assert_eq!(draft.end - draft.start, 86_400);
        assert_eq!(draft.metadata.issue_number, 41);
        assert_eq!(draft.metadata.issue_id, "I_41");
        assert_eq!(draft.strategies.len(), 1);
    }

    #[tokio::test]
    async fn unconfigured_labels_are_ignored() {
        let (ctx, governance, _treasury) = context(true);
        let outcome =
            handle_label_event(&ctx, &event(IssueAction::Labeled, "bug", ItemState::Open)).await;
        assert_eq!(outcome, GovernanceOutcome::Ignored);
        assert!(governance.submitted().is_empty());
    }

    #[tokio::test]
    async fn closed_issues_get_no_proposal() {
        let (ctx, governance, _treasury) = context(true);
        let outcome =
            handle_label_event(&ctx, &event(IssueAction::Labeled, "dao-vote", ItemState::Closed))
                .await;
        assert_eq!(outcome, GovernanceOutcome::Ineligible);
        assert!(governance.submitted().is_empty());
    }

    #[tokio::test]
    async fn unlabeling_cancels_the_linked_open_proposal() {
        let (ctx, governance, _treasury) = context(true);
        let (other, other_payload) = active_proposal("p-other", "I_99");
        governance.add_proposal(other, other_payload);
        let (linked, linked_payload) = active_proposal("p-linked", "I_41");
        governance.add_proposal(linked, linked_payload);

        let outcome = handle_label_event(
            &ctx,
            &event(IssueAction::Unlabeled, "dao-vote", ItemState::Open),
        )
        .await;

        assert!(matches!(outcome, GovernanceOutcome::Cancelled { .. }));
        assert_eq!(governance.cancelled(), vec!["p-linked".to_string()]);
    }

    #[tokio::test]
    async fn non_cancelable_labels_never_cancel() {
        let (ctx, governance, _treasury) = context(false);
        let (linked, payload) = active_proposal("p-linked", "I_41");
        governance.add_proposal(linked, payload);

        let outcome = handle_label_event(
            &ctx,
            &event(IssueAction::Unlabeled, "dao-vote", ItemState::Open),
        )
        .await;

        assert_eq!(outcome, GovernanceOutcome::NotCancelable);
        assert!(governance.cancelled().is_empty());
    }

    #[tokio::test]
    async fn unlabel_with_no_matching_proposal_fails_closed() {
        let (ctx, governance, _treasury) = context(true);
        let (other, payload) = active_proposal("p-other", "I_99");
        governance.add_proposal(other, payload);

        let outcome = handle_label_event(
            &ctx,
            &event(IssueAction::Unlabeled, "dao-vote", ItemState::Open),
        )
        .await;

        assert_eq!(outcome, GovernanceOutcome::NoMatchingProposal);
        assert!(governance.cancelled().is_empty());
    }

    #[tokio::test]
    async fn cancellation_failure_is_terminal() {
        let (ctx, governance, _treasury) = context(true);
        let (linked, payload) = active_proposal("p-linked", "I_41");
        governance.add_proposal(linked, payload);
        governance.fail_cancellations();

        let outcome = handle_label_event(
            &ctx,
            &event(IssueAction::Unlabeled, "dao-vote", ItemState::Open),
        )
        .await;

        assert_eq!(outcome, GovernanceOutcome::Failed);
        assert!(governance.cancelled().is_empty());
    }

    #[tokio::test]
    async fn submission_failure_is_terminal() {
        let (ctx, governance, _treasury) = context(true);
        governance.fail_submissions();

        let outcome =
            handle_label_event(&ctx, &event(IssueAction::Labeled, "dao-vote", ItemState::Open))
                .await;

        assert_eq!(outcome, GovernanceOutcome::Failed);
    }

    #[test]
    fn window_offsets_are_relative_to_now() {
        let rule = GovernanceLabelRule {
            start_offset_secs: 600,
            duration_secs: 3600,
            ..GovernanceLabelRule::default()
        };
        assert_eq!(voting_window(&rule, 1_000_000), (1_000_600, 1_004_200));
    }
}
