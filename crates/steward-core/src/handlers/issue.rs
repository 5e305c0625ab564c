//! Issue lifecycle handler.
//!
//! Maps board-item state transitions to treasury actions. The three
//! transitions (assigned, unassigned, closed) are structurally
//! identical: eligibility predicate, tier and wallet resolution,
//! gateway call, result comment, logs. They differ only in the required
//! item state, which side supplies the assignee, and the treasury verb,
//! so they execute as one parameterized transition.

use tracing::{debug, error, info, warn};

use crate::board::BoardError;
use crate::context::AppContext;
use crate::payout::resolve_payout;
use crate::project::{ItemState, WorkItem, load_snapshot};
use crate::treasury::{TreasuryVerb, format_amount};
use crate::webhook::{IssueAction, IssueEvent};

/// Terminal outcome of one issue handler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueOutcome {
    /// The action is not one this handler consumes.
    Ignored,
    /// No work item matched the triggering issue; a data-consistency
    /// gap between the event source and the board, treated as
    /// non-fatal.
    NoMatchingItem,
    /// The eligibility predicate failed; not an error.
    Ineligible,
    /// No wallet address is on record for the assignee.
    WalletNotFound,
    /// The treasury rejected or never received the transaction.
    TreasuryFailed,
    /// The treasury action completed.
    Completed {
        /// External transaction identifier.
        tx: String,
    },
}

/// Which side of the event supplies the assignee to act on.
#[derive(Debug, Clone, Copy)]
enum AssigneeSource {
    /// First assignee currently on the item.
    CurrentItem,
    /// The assignee carried by the event payload. Used for
    /// unassignment, where the item's assignee list has already changed
    /// by the time the board is reloaded.
    EventPayload,
}

/// Handles one issue lifecycle event.
///
/// # Errors
///
/// A board fetch failure propagates uncaught; the caller decides
/// whether to abort the triggering event. Every other failure mode is
/// logged here and reported as an [`IssueOutcome`].
pub async fn handle_issue_event(
    ctx: &AppContext,
    event: &IssueEvent,
) -> Result<IssueOutcome, BoardError> {
    match event.action {
        IssueAction::Opened => {
            // Placeholder transition: acknowledged, nothing to do.
            debug!(repo = %event.repo, number = event.number, "issue opened");
            Ok(IssueOutcome::Ignored)
        },
        IssueAction::Assigned => {
            run_transition(
                ctx,
                event,
                TreasuryVerb::Assign,
                ItemState::Open,
                AssigneeSource::CurrentItem,
            )
            .await
        },
        IssueAction::Unassigned => {
            run_transition(
                ctx,
                event,
                TreasuryVerb::Reverse,
                ItemState::Open,
                AssigneeSource::EventPayload,
            )
            .await
        },
        IssueAction::Closed => {
            run_transition(
                ctx,
                event,
                TreasuryVerb::Release,
                ItemState::Closed,
                AssigneeSource::CurrentItem,
            )
            .await
        },
        IssueAction::Labeled | IssueAction::Unlabeled => Ok(IssueOutcome::Ignored),
    }
}

/// The single parameterized transition shared by all three verbs.
async fn run_transition(
    ctx: &AppContext,
    event: &IssueEvent,
    verb: TreasuryVerb,
    required_state: ItemState,
    assignee_source: AssigneeSource,
) -> Result<IssueOutcome, BoardError> {
    let config = ctx.config.current();
    let snapshot = load_snapshot(ctx.board.as_ref(), &config.board).await?;

    let Some(item) = snapshot.find_item(&event.repo, event.number) else {
        error!(
            repo = %event.repo,
            number = event.number,
            "no matching work item for issue event"
        );
        return Ok(IssueOutcome::NoMatchingItem);
    };

    let assignee = match assignee_source {
        AssigneeSource::CurrentItem => item.assignees.first().cloned(),
        AssigneeSource::EventPayload => event.assignee.clone(),
    };

    if !eligible(item, required_state, assignee.as_deref()) {
        info!(
            title = %item.title,
            %verb,
            "work item does not qualify for token distribution"
        );
        return Ok(IssueOutcome::Ineligible);
    }
    // The predicate guarantees an assignee.
    let Some(assignee) = assignee else {
        return Ok(IssueOutcome::Ineligible);
    };

    info!(title = %item.title, weight = item.weight(), "processing work item");

    let amount = resolve_payout(&config.payout_tiers, item.weight());
    let Some(wallet) = config.resolve_wallet(&assignee) else {
        error!(handle = %assignee, "no wallet address on record for assignee");
        return Ok(IssueOutcome::WalletNotFound);
    };

    let formatted = format_amount(amount, config.token.decimals);
    info!(
        %verb,
        handle = %assignee,
        amount = %formatted,
        symbol = %config.token.symbol,
        "executing treasury action"
    );

    let tx = match ctx.treasury.execute(verb, wallet, amount).await {
        Ok(tx) => tx,
        Err(error) => {
            error!(%error, %verb, "error sending treasury transaction");
            return Ok(IssueOutcome::TreasuryFailed);
        },
    };
    info!(%tx, "treasury transaction submitted");

    let body = comment_body(
        &assignee,
        verb,
        &formatted,
        &config.token.symbol,
        &config.explorer_url,
        &tx,
    );
    if let Err(error) = ctx
        .board
        .post_issue_comment(&config.board.org, &event.repo, event.number, &body)
        .await
    {
        // The treasury action already happened; a lost comment is
        // log-only.
        warn!(%error, "failed to post result comment");
    }

    Ok(IssueOutcome::Completed { tx })
}

fn eligible(item: &WorkItem, required_state: ItemState, assignee: Option<&str>) -> bool {
    item.state == required_state && item.weight() > 0.0 && assignee.is_some()
}

fn comment_body(
    handle: &str,
    verb: TreasuryVerb,
    amount: &str,
    symbol: &str,
    explorer_url: &str,
    tx: &str,
) -> String {
    format!(
        "Reward to @{handle} with {noun} of {amount} {symbol} {past}: [{tx}]({explorer_url}/tx/{tx})",
        noun = verb.comment_noun(),
        past = verb.past_tense(),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::board::MockBoard;
    use crate::config::{ConfigHandle, Contributor, DaoConfig, DaoParameters};
    use crate::governance::MockGovernance;
    use crate::treasury::MockTreasury;
    use crate::webhook::IssueAction;

    fn config() -> DaoConfig {
        let parameters: DaoParameters = serde_json::from_value(json!({
            "github-owner": "gitvern",
            "github-project-number": 1,
            "weight-payouts": { "0": "0", "1": "100", "3": "250", "8": "700" },
            "treasury": { "contract": "0xc0ffee" },
            "token": { "symbol": "DAO", "decimals": 0 },
            "network": { "explorer-url": "https://explorer.test" }
        }))
        .unwrap();
        DaoConfig::from_documents(
            parameters,
            vec![Contributor {
                handle: "alice".to_string(),
                wallet: "0xa11ce".to_string(),
            }],
            vec![],
        )
        .unwrap()
    }

    fn board_response(state: &str, weight: &str, assignees: &[&str]) -> serde_json::Value {
        let assignee_edges: Vec<_> = assignees
            .iter()
            .map(|login| json!({ "node": { "login": login } }))
            .collect();
        json!({
            "organization": {
                "projectV2": {
                    "id": "PRJ_1",
                    "number": 1,
                    "title": "DAO Budget",
                    "closed": false,
                    "items": { "edges": [
                        { "node": {
                            "id": "ITEM_1",
                            "content": {
                                "number": 41,
                                "title": "Implement thing",
                                "body": "",
                                "state": state,
                                "repository": { "name": "core" },
                                "assignees": { "edges": assignee_edges },
                                "labels": { "edges": [] }
                            },
                            "fieldValues": { "edges": [
                                { "node": { "value": weight, "projectField": { "name": "Weight" } } }
                            ]}
                        }}
                    ]},
                    "fields": { "edges": [] }
                }
            }
        })
    }

    fn context(board_json: serde_json::Value) -> (AppContext, Arc<MockBoard>, Arc<MockTreasury>) {
        let board = Arc::new(MockBoard::new(board_json));
        let treasury = Arc::new(MockTreasury::new());
        let ctx = AppContext::new(
            Arc::new(ConfigHandle::new(config())),
            Arc::clone(&board) as _,
            Arc::clone(&treasury) as _,
            Arc::new(MockGovernance::new()),
        );
        (ctx, board, treasury)
    }

    fn event(action: IssueAction, assignee: Option<&str>) -> IssueEvent {
        IssueEvent {
            action,
            repo: "core".to_string(),
            number: 41,
            issue_id: "I_41".to_string(),
            title: "Implement thing".to_string(),
            body: String::new(),
            state: ItemState::Open,
            assignee: assignee.map(str::to_string),
            label: None,
        }
    }

    #[tokio::test]
    async fn assignment_pays_the_resolved_tier_and_comments() {
        let (ctx, board, treasury) = context(board_response("OPEN", "5", &["alice"]));

        let outcome = handle_issue_event(&ctx, &event(IssueAction::Assigned, None))
            .await
            .unwrap();

        let tx = match outcome {
            IssueOutcome::Completed { tx } => tx,
            other => panic!("expected completion, got {other:?}"),
        };

        let calls = treasury.recorded_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].verb, TreasuryVerb::Assign);
        assert_eq!(calls[0].wallet, "0xa11ce");
        assert_eq!(calls[0].amount, 250);

        let comments = board.recorded_comments();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].repo, "core");
        assert_eq!(comments[0].number, 41);
        assert!(comments[0].body.contains("@alice"));
        assert!(comments[0].body.contains("250 DAO assigned"));
        assert!(comments[0].body.contains(&format!("https://explorer.test/tx/{tx}")));
    }

    #[tokio::test]
    async fn assignment_on_closed_item_never_reaches_the_treasury() {
        let (ctx, _board, treasury) = context(board_response("CLOSED", "5", &["alice"]));

        let outcome = handle_issue_event(&ctx, &event(IssueAction::Assigned, None))
            .await
            .unwrap();

        assert_eq!(outcome, IssueOutcome::Ineligible);
        assert!(treasury.recorded_calls().is_empty());
    }

    #[tokio::test]
    async fn zero_weight_is_ineligible() {
        let (ctx, _board, treasury) = context(board_response("OPEN", "0", &["alice"]));
        let outcome = handle_issue_event(&ctx, &event(IssueAction::Assigned, None))
            .await
            .unwrap();
        assert_eq!(outcome, IssueOutcome::Ineligible);
        assert!(treasury.recorded_calls().is_empty());
    }

    #[tokio::test]
    async fn unassignment_reverses_against_the_removed_assignee() {
        // Board already shows no assignees; the event payload names the
        // removed one.
        let (ctx, _board, treasury) = context(board_response("OPEN", "5", &[]));

        let outcome = handle_issue_event(&ctx, &event(IssueAction::Unassigned, Some("alice")))
            .await
            .unwrap();

        assert!(matches!(outcome, IssueOutcome::Completed { .. }));
        let calls = treasury.recorded_calls();
        assert_eq!(calls[0].verb, TreasuryVerb::Reverse);
        assert_eq!(calls[0].wallet, "0xa11ce");
    }

    #[tokio::test]
    async fn closed_item_releases_to_current_assignee() {
        let (ctx, _board, treasury) = context(board_response("CLOSED", "8", &["alice"]));

        let outcome = handle_issue_event(&ctx, &event(IssueAction::Closed, None))
            .await
            .unwrap();

        assert!(matches!(outcome, IssueOutcome::Completed { .. }));
        let calls = treasury.recorded_calls();
        assert_eq!(calls[0].verb, TreasuryVerb::Release);
        assert_eq!(calls[0].amount, 700);
    }

    #[tokio::test]
    async fn missing_wallet_aborts_without_transaction_or_comment() {
        let (ctx, board, treasury) = context(board_response("OPEN", "5", &["mallory"]));

        let outcome = handle_issue_event(&ctx, &event(IssueAction::Assigned, None))
            .await
            .unwrap();

        assert_eq!(outcome, IssueOutcome::WalletNotFound);
        assert!(treasury.recorded_calls().is_empty());
        assert!(board.recorded_comments().is_empty());
    }

    #[tokio::test]
    async fn unknown_issue_is_a_lookup_miss() {
        let (ctx, _board, treasury) = context(board_response("OPEN", "5", &["alice"]));
        let mut missing = event(IssueAction::Assigned, None);
        missing.number = 999;

        let outcome = handle_issue_event(&ctx, &missing).await.unwrap();

        assert_eq!(outcome, IssueOutcome::NoMatchingItem);
        assert!(treasury.recorded_calls().is_empty());
    }

    #[tokio::test]
    async fn treasury_failure_aborts_without_comment() {
        let (ctx, board, treasury) = context(board_response("OPEN", "5", &["alice"]));
        treasury.fail_transactions();

        let outcome = handle_issue_event(&ctx, &event(IssueAction::Assigned, None))
            .await
            .unwrap();

        assert_eq!(outcome, IssueOutcome::TreasuryFailed);
        assert!(board.recorded_comments().is_empty());
    }

    #[tokio::test]
    async fn lost_comment_does_not_fail_a_completed_payout() {
        let (ctx, board, treasury) = context(board_response("OPEN", "5", &["alice"]));
        board.fail_comments();

        let outcome = handle_issue_event(&ctx, &event(IssueAction::Assigned, None))
            .await
            .unwrap();

        // The treasury action already happened; the comment is log-only.
        assert!(matches!(outcome, IssueOutcome::Completed { .. }));
        let calls = treasury.recorded_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].verb, TreasuryVerb::Assign);
        assert!(board.recorded_comments().is_empty());
    }

    #[tokio::test]
    async fn board_fetch_failure_propagates() {
        let board = Arc::new(MockBoard::failing());
        let ctx = AppContext::new(
            Arc::new(ConfigHandle::new(config())),
            board as _,
            Arc::new(MockTreasury::new()),
            Arc::new(MockGovernance::new()),
        );

        let result = handle_issue_event(&ctx, &event(IssueAction::Assigned, None)).await;
        assert!(result.is_err());
    }
}
