//! Quota store integration tests
//!
//! Exercise the remote PostgREST backend against a wiremock server and the
//! composite's fallback behavior when the remote store misbehaves.

use crate::common;
use chrono::{Duration, Utc};
use prensa_gateway::core::identity::{Plan, PlanLookup, VisitorIdentity};
use prensa_gateway::core::policy;
use prensa_gateway::storage::QuotaBackend;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn anonymous(fingerprint: &str) -> VisitorIdentity {
    VisitorIdentity::Anonymous {
        fingerprint: fingerprint.to_string(),
    }
}

fn free_user(user_id: &str) -> VisitorIdentity {
    VisitorIdentity::Authenticated {
        user_id: user_id.to_string(),
        plan: Plan::Free,
    }
}

#[tokio::test]
async fn test_remote_read_returns_live_anonymous_record() {
    let server = MockServer::start().await;
    let expires_at = Utc::now() + Duration::hours(20);

    Mock::given(method("GET"))
        .and(path("/rest/v1/visitors_queries"))
        .and(query_param("fingerprint", "eq.fp-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 1,
            "fingerprint": "fp-abc",
            "ip_address": "203.0.113.7",
            "query_count": 2,
            "last_query_at": Utc::now().to_rfc3339(),
            "expires_at": expires_at.to_rfc3339(),
        }])))
        .mount(&server)
        .await;

    let store = common::remote_store(&server.uri());
    let usage = store.read(&anonymous("fp-abc")).await.unwrap().unwrap();

    assert_eq!(usage.query_count, 2);
    assert_eq!(usage.ip_address.as_deref(), Some("203.0.113.7"));
    assert!(!usage.is_expired(Utc::now()));
}

#[tokio::test]
async fn test_remote_read_no_rows_is_absent_not_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/visitors_queries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = common::remote_store(&server.uri());
    assert!(store.read(&anonymous("fp-new")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_remote_permission_error_falls_back_to_local() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // Remote store rejects everything with a permission error.
    Mock::given(method("GET"))
        .and(path("/rest/v1/visitors_queries"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "JWT expired"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/visitors_queries"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let store = common::fallback_store(&server.uri(), &dir);
    let identity = anonymous("fp-abc");

    // Increment lands in the local document, read comes back from it:
    // the caller sees consistent local state, never an error.
    assert!(store.increment(&identity, &common::recorded_query()).await);
    let usage = store.read(&identity).await.unwrap();
    assert_eq!(usage.query_count, 1);
}

#[tokio::test]
async fn test_remote_increment_inserts_first_row_with_ip() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/visitors_queries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ip"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ip": "198.51.100.9"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/visitors_queries"))
        .and(body_partial_json(json!({
            "fingerprint": "fp-abc",
            "ip_address": "198.51.100.9",
            "query_count": 1,
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let store = common::remote_store(&server.uri());
    store
        .increment(&anonymous("fp-abc"), &common::recorded_query())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_remote_increment_updates_existing_row() {
    let server = MockServer::start().await;
    let expires_at = Utc::now() + Duration::hours(10);

    Mock::given(method("GET"))
        .and(path("/rest/v1/visitors_queries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 7,
            "fingerprint": "fp-abc",
            "query_count": 1,
            "expires_at": expires_at.to_rfc3339(),
        }])))
        .mount(&server)
        .await;
    // count+1 and a refreshed last_query_at; expires_at is not in the patch.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/visitors_queries"))
        .and(query_param("id", "eq.7"))
        .and(body_partial_json(json!({"query_count": 2})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let store = common::remote_store(&server.uri());
    store
        .increment(&anonymous("fp-abc"), &common::recorded_query())
        .await
        .unwrap();

    let patches: Vec<_> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == "PATCH")
        .collect();
    let body: serde_json::Value = serde_json::from_slice(&patches[0].body).unwrap();
    assert!(body.get("expires_at").is_none());
}

#[tokio::test]
async fn test_authenticated_read_counts_rows_since_day_start() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/user_queries"))
        .and(query_param("user_id", "eq.user-9"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"id": 1}, {"id": 2}, {"id": 3}])),
        )
        .mount(&server)
        .await;

    let store = common::remote_store(&server.uri());
    let usage = store.read(&free_user("user-9")).await.unwrap().unwrap();
    assert_eq!(usage.query_count, 3);
}

#[tokio::test]
async fn test_authenticated_increment_inserts_query_row() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/user_queries"))
        .and(body_partial_json(json!({
            "user_id": "user-9",
            "organizacion": "ACME",
            "tema": "lanzamiento de producto",
            "fecha": "2026-08-01",
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let store = common::remote_store(&server.uri());
    store
        .increment(&free_user("user-9"), &common::recorded_query())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_plan_lookup_reads_plan_type() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/user_plans"))
        .and(query_param("user_id", "eq.user-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"plan_type": "pro"}])))
        .mount(&server)
        .await;

    let store = common::remote_store(&server.uri());
    assert_eq!(store.plan_for("user-9").await.unwrap(), Some(Plan::Pro));
}

#[tokio::test]
async fn test_anonymous_visitor_exhausts_quota_after_three_queries() {
    let dir = TempDir::new().unwrap();
    let store = common::local_only_store(&dir);
    let identity = anonymous("fp-fresh");

    let usage = store.read(&identity).await;
    let decision = policy::evaluate(usage.as_ref(), &identity);
    assert!(decision.can_query);
    assert_eq!(decision.remaining_queries, 3);

    for _ in 0..3 {
        assert!(store.increment(&identity, &common::recorded_query()).await);
    }

    let usage = store.read(&identity).await;
    let decision = policy::evaluate(usage.as_ref(), &identity);
    assert!(!decision.can_query);
    assert_eq!(decision.remaining_queries, 0);
    assert_eq!(decision.queries_used, 3);
}
