use agora_governance::{DrainConfig, GovernanceController};
use agora_nullables::{NullClock, NullStore};
use agora_rpc::{router, RpcState, USER_ID_HEADER};
use agora_types::Clock;
use agora_utils::GovernanceMetrics;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const START: u64 = 1_700_000_000;
const HOUR: u64 = 3_600;

struct TestApp {
    router: Router,
    clock: Arc<NullClock>,
}

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(NullStore::new());
        let clock = Arc::new(NullClock::new(START));
        let gov = Arc::new(GovernanceController::new(
            store,
            clock.clone() as Arc<dyn Clock>,
            DrainConfig::default(),
        ));
        let metrics = Arc::new(GovernanceMetrics::new().unwrap());
        Self {
            router: router(RpcState::new(gov, metrics)),
            clock,
        }
    }

    async fn raw(&self, method: &str, uri: &str, user: Option<u64>, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user.to_string());
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn call(&self, method: &str, uri: &str, user: Option<u64>, body: Option<Value>) -> (StatusCode, Value) {
        let (status, bytes) = self.raw(method, uri, user, body).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    /// DAO 1 with admin 1 and approved members 2..=members.
    async fn dao_with_members(&self, members: u64) -> u64 {
        let (status, body) = self
            .call("POST", "/daos", Some(1), Some(json!({"name": "commons"})))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let dao = body["data"]["id"].as_u64().unwrap();
        for user in 2..=members {
            let (status, _) = self
                .call("POST", &format!("/daos/{dao}/join"), Some(user), None)
                .await;
            assert_eq!(status, StatusCode::OK);
            let (status, body) = self
                .call(
                    "PUT",
                    &format!("/daos/{dao}/members/{user}"),
                    Some(1),
                    Some(json!({"action": "approve"})),
                )
                .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["data"]["status"], "approved");
        }
        dao
    }
}

#[tokio::test]
async fn health_uses_success_envelope() {
    let app = TestApp::new();
    let (status, body) = app.call("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn missing_identity_is_unauthorized() {
    let app = TestApp::new();
    let (status, body) = app
        .call("POST", "/daos", None, Some(json!({"name": "commons"})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn malformed_path_is_bad_request() {
    let app = TestApp::new();
    let (status, body) = app.call("GET", "/daos/not-a-number", Some(1), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn unknown_dao_is_not_found() {
    let app = TestApp::new();
    let (status, body) = app.call("GET", "/daos/42", Some(1), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn dao_view_counts_active_members() {
    let app = TestApp::new();
    let dao = app.dao_with_members(3).await;
    let (_, pending) = app
        .call("POST", &format!("/daos/{dao}/join"), Some(9), None)
        .await;
    assert_eq!(pending["data"]["status"], "pending");

    let (status, body) = app.call("GET", &format!("/daos/{dao}"), Some(9), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "commons");
    assert_eq!(body["data"]["activeMemberCount"], 3);
}

#[tokio::test]
async fn quorum_settings_require_elder_or_admin() {
    let app = TestApp::new();
    let dao = app.dao_with_members(3).await;
    let uri = format!("/daos/{dao}/quorum");

    let (status, body) = app
        .call("PUT", &uri, Some(2), Some(json!({"quorumPercentage": 30})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, body) = app
        .call("PUT", &uri, Some(1), Some(json!({"quorumPercentage": 80})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = app
        .call("PUT", &uri, Some(1), Some(json!({"quorumPercentage": 30})))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.call("GET", &uri, Some(3), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["quorumPercentage"], 30);
    assert_eq!(body["data"]["activeMemberCount"], 3);
    assert_eq!(body["data"]["requiredQuorum"], 1);

    let (status, _) = app.call("GET", &uri, Some(77), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn delegation_cap_reports_details() {
    let app = TestApp::new();
    let dao = app.dao_with_members(4).await;
    let uri = format!("/daos/{dao}/delegate");

    let (status, body) = app
        .call("POST", &uri, Some(2), Some(json!({"delegateId": 4, "scope": "all"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let delegation = body["data"]["id"].as_u64().unwrap();

    let (status, body) = app
        .call("POST", &uri, Some(3), Some(json!({"delegateId": 4, "scope": "all"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "DELEGATION_CAP_EXCEEDED");
    assert_eq!(
        body["error"]["details"],
        json!({"currentDelegations": 1, "maxAllowed": 1, "capPercentage": 10})
    );

    let (_, listed) = app
        .call("GET", &format!("/daos/{dao}/delegations"), Some(2), None)
        .await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .call("DELETE", &format!("/daos/{dao}/delegate/{delegation}"), Some(3), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call("DELETE", &format!("/daos/{dao}/delegate/{delegation}"), Some(2), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isActive"], false);
}

#[tokio::test]
async fn proposal_flows_from_vote_to_queue() {
    let app = TestApp::new();
    let dao = app.dao_with_members(4).await;

    let (status, body) = app
        .call(
            "POST",
            &format!("/daos/{dao}/proposals"),
            Some(2),
            Some(json!({
                "title": "Fund the garden",
                "voteEndTime": START + 72 * HOUR,
                "executionType": "treasury_transfer",
                "executionData": "{\"amount\":100}",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let proposal = body["data"]["id"].as_u64().unwrap();

    for (user, choice) in [(1, "yes"), (2, "yes"), (3, "no")] {
        let (status, _) = app
            .call(
                "POST",
                &format!("/proposals/{proposal}/vote"),
                Some(user),
                Some(json!({"choice": choice})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app
        .call(
            "POST",
            &format!("/proposals/{proposal}/vote"),
            Some(3),
            Some(json!({"choice": "yes"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "ALREADY_VOTED");
    assert_eq!(body["error"]["details"]["userId"], 3);

    let check = format!("/proposals/{proposal}/check-quorum");
    let (status, body) = app.call("POST", &check, Some(3), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VOTING_IN_PROGRESS");
    assert_eq!(body["error"]["details"]["totalVotes"], 3);

    let (status, _) = app.call("POST", &check, Some(99), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    app.clock.advance(73 * HOUR);
    let (status, body) = app.call("POST", &check, Some(3), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "passed");
    assert_eq!(body["data"]["yesVotes"], 2);

    let execute = format!("/proposals/{proposal}/execute");
    let (status, _) = app.call("POST", &execute, Some(2), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.call("POST", &execute, Some(1), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["delayHours"], 48);
    assert_eq!(body["data"]["newlyQueued"], true);
    assert_eq!(
        body["data"]["entry"]["scheduledFor"],
        START + 73 * HOUR + 48 * HOUR
    );

    let (status, body) = app.call("POST", &execute, Some(1), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["newlyQueued"], false);

    let (status, body) = app
        .call("GET", &format!("/daos/{dao}/execution-queue"), Some(1), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["status"], "pending");

    let (status, body) = app
        .call("GET", &format!("/proposals/{proposal}"), Some(4), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "queued");
    assert_eq!(body["data"]["ballots"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn metrics_endpoint_exports_counters() {
    let app = TestApp::new();
    let dao = app.dao_with_members(2).await;
    app.call("GET", &format!("/daos/{dao}"), Some(1), None).await;

    let (status, bytes) = app.raw("GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("agora_http_requests_total"));
    assert!(text.contains("/daos/:dao_id"));
}

#[tokio::test]
async fn refused_member_update_changes_nothing() {
    let app = TestApp::new();
    let dao = app.dao_with_members(2).await;
    let (status, _) = app
        .call(
            "PUT",
            &format!("/daos/{dao}/members/2"),
            Some(1),
            Some(json!({"role": "moderator"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    app.call("POST", &format!("/daos/{dao}/join"), Some(3), None).await;

    let (status, body) = app
        .call(
            "PUT",
            &format!("/daos/{dao}/members/3"),
            Some(2),
            Some(json!({"action": "approve", "role": "elder"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (_, body) = app
        .call("GET", &format!("/daos/{dao}/members"), Some(1), None)
        .await;
    let members = body["data"].as_array().unwrap();
    let target = members.iter().find(|m| m["userId"] == 3).unwrap();
    assert_eq!(target["status"], "pending");
    assert_eq!(target["role"], "member");

    let (status, body) = app
        .call("PUT", &format!("/daos/{dao}/members/3"), Some(1), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}
