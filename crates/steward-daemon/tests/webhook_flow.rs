//! End-to-end webhook flow against the router with mock gateways.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use hmac::{Hmac, Mac};
use secrecy::SecretString;
use serde_json::json;
use sha2::Sha256;
use steward_core::AppContext;
use steward_core::board::MockBoard;
use steward_core::config::{ConfigHandle, Contributor, DaoConfig, DaoParameters};
use steward_core::governance::MockGovernance;
use steward_core::treasury::{MockTreasury, TreasuryVerb};
use steward_daemon::server::{ServerState, router};
use tower::ServiceExt;

const SECRET: &str = "top-secret";

fn dao_config() -> DaoConfig {
    let parameters: DaoParameters = serde_json::from_value(json!({
        "github-owner": "gitvern",
        "github-project-number": 1,
        "weight-payouts": { "0": "0", "3": "150000000000000000000" },
        "governance-space": "gitvern.eth",
        "governance-labels": { "dao-vote": { "cancelable": true } },
        "treasury": { "contract": "0x00000000000000000000000000000000000000aa" },
        "token": { "symbol": "DAO" },
        "network": { "explorer-url": "https://explorer.test" }
    }))
    .expect("valid parameters document");

    DaoConfig::from_documents(
        parameters,
        vec![Contributor {
            handle: "alice".to_string(),
            wallet: "0x00000000000000000000000000000000000000a1".to_string(),
        }],
        vec![],
    )
    .expect("valid config")
}

fn board_response() -> serde_json::Value {
    json!({
        "organization": {
            "projectV2": {
                "id": "PRJ_1",
                "number": 1,
                "title": "DAO Budget",
                "description": null,
                "closed": false,
                "items": { "edges": [
                    {
                        "node": {
                            "id": "ITEM_1",
                            "content": {
                                "number": 41,
                                "title": "Implement thing",
                                "body": "Details",
                                "state": "OPEN",
                                "repository": { "name": "core" },
                                "assignees": { "edges": [ { "node": { "login": "alice" } } ] },
                                "labels": { "edges": [] }
                            },
                            "fieldValues": { "edges": [
                                { "node": { "value": "5", "projectField": { "name": "Weight" } } }
                            ]}
                        }
                    }
                ]},
                "fields": { "edges": [
                    { "node": { "id": "F_WEIGHT", "name": "Weight", "settings": null } },
                    { "node": { "id": "F_APPROVAL", "name": "Approval", "settings": null } }
                ]}
            }
        }
    })
}

struct Harness {
    state: ServerState,
    board: Arc<MockBoard>,
    treasury: Arc<MockTreasury>,
}

fn harness() -> Harness {
    let config = Arc::new(ConfigHandle::new(dao_config()));
    let board = Arc::new(MockBoard::new(board_response()));
    let treasury = Arc::new(MockTreasury::new());
    let governance = Arc::new(MockGovernance::new());
    let board_gateway: Arc<dyn steward_core::board::BoardGateway> = board.clone();
    let treasury_gateway: Arc<dyn steward_core::treasury::TreasuryGateway> = treasury.clone();
    let ctx = AppContext::new(config, board_gateway, treasury_gateway, governance);
    Harness {
        state: ServerState {
            ctx,
            webhook_secret: Arc::new(SecretString::from(SECRET.to_string())),
        },
        board,
        treasury,
    }
}

fn sign(body: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).expect("hmac accepts any key length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

fn delivery(body: &serde_json::Value, signature: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("x-github-event", "issues")
        .header("x-hub-signature-256", signature)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

fn assigned_payload() -> serde_json::Value {
    json!({
        "action": "assigned",
        "issue": {
            "node_id": "I_41",
            "number": 41,
            "title": "Implement thing",
            "body": "Details",
            "state": "open"
        },
        "repository": { "name": "core" },
        "assignee": { "login": "alice" }
    })
}

#[tokio::test]
async fn signed_assignment_reaches_the_treasury() {
    let harness = harness();
    let app = router(harness.state.clone());

    let body = assigned_payload();
    let signature = sign(body.to_string().as_bytes());
    let response = app.oneshot(delivery(&body, &signature)).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let calls = harness.treasury.recorded_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].verb, TreasuryVerb::Assign);
    assert_eq!(calls[0].wallet, "0x00000000000000000000000000000000000000a1");
    assert_eq!(calls[0].amount, 150_000_000_000_000_000_000);

    // The payout is announced on the originating issue.
    let comments = harness.board.recorded_comments();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].org, "gitvern");
    assert_eq!(comments[0].repo, "core");
    assert_eq!(comments[0].number, 41);
    assert!(comments[0].body.contains("@alice"));
    assert!(comments[0].body.contains("150 DAO"));
}

#[tokio::test]
async fn bad_signature_is_rejected_before_any_side_effect() {
    let harness = harness();
    let app = router(harness.state.clone());

    let body = assigned_payload();
    let response = app
        .oneshot(delivery(&body, "sha256=0000"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(harness.treasury.recorded_calls().is_empty());
}

#[tokio::test]
async fn missing_signature_is_rejected() {
    let harness = harness();
    let app = router(harness.state);

    let body = assigned_payload();
    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("x-github-event", "issues")
        .body(Body::from(body.to_string()))
        .expect("valid request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn foreign_event_kinds_are_acknowledged_empty() {
    let harness = harness();
    let app = router(harness.state);

    let body = json!({ "zen": "Design for failure." });
    let signature = sign(body.to_string().as_bytes());
    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("x-github-event", "ping")
        .header("x-hub-signature-256", signature)
        .body(Body::from(body.to_string()))
        .expect("valid request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn unparseable_issues_payload_is_a_client_error() {
    let harness = harness();
    let app = router(harness.state);

    let body = json!({ "action": "assigned" });
    let signature = sign(body.to_string().as_bytes());
    let response = app.oneshot(delivery(&body, &signature)).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn work_route_serves_the_board_snapshot() {
    let harness = harness();
    let app = router(harness.state);

    let request = Request::builder()
        .uri("/work")
        .body(Body::empty())
        .expect("valid request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let snapshot: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
    assert_eq!(snapshot["project"]["id"], "PRJ_1");
    assert_eq!(snapshot["items"][0]["number"], 41);
}

#[tokio::test]
async fn healthz_is_always_up() {
    let harness = harness();
    let app = router(harness.state);

    let request = Request::builder()
        .uri("/healthz")
        .body(Body::empty())
        .expect("valid request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}
