//! Shared test fixtures

use async_trait::async_trait;
use prensa_gateway::config::{LocalStoreConfig, QuotaStoreConfig, WebhookConfig};
use prensa_gateway::core::analysis::AnalysisRequest;
use prensa_gateway::core::identity::{
    AuthSession, FingerprintProvider, FreePlanOnly, IdentityResolver, Plan, PlanLookup,
    SessionProvider,
};
use prensa_gateway::core::orchestrator::QueryOrchestrator;
use prensa_gateway::storage::{LocalStore, QuotaBackend, QuotaStore, RecordedQuery, RemoteStore};
use prensa_gateway::Result;
use std::sync::Arc;
use tempfile::TempDir;

/// Fingerprint provider returning a fixed value
pub struct FixedFingerprint(pub String);

#[async_trait]
impl FingerprintProvider for FixedFingerprint {
    async fn fingerprint(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Session provider returning a fixed session (or none)
pub struct FixedSession(pub Option<String>);

#[async_trait]
impl SessionProvider for FixedSession {
    async fn current_session(&self) -> Option<AuthSession> {
        self.0.clone().map(|user_id| AuthSession { user_id })
    }
}

/// Plan lookup returning a fixed plan for every user
pub struct FixedPlan(pub Plan);

#[async_trait]
impl PlanLookup for FixedPlan {
    async fn plan_for(&self, _user_id: &str) -> Result<Option<Plan>> {
        Ok(Some(self.0))
    }
}

/// Resolver for a fixed anonymous fingerprint
pub fn anonymous_resolver(fingerprint: &str) -> IdentityResolver {
    IdentityResolver::new(
        Arc::new(FixedFingerprint(fingerprint.to_string())),
        Arc::new(FixedSession(None)),
        Arc::new(FreePlanOnly),
    )
}

/// Resolver for a fixed signed-in user on the free tier
pub fn free_user_resolver(user_id: &str) -> IdentityResolver {
    IdentityResolver::new(
        Arc::new(FixedFingerprint("unused".to_string())),
        Arc::new(FixedSession(Some(user_id.to_string()))),
        Arc::new(FreePlanOnly),
    )
}

/// Resolver for a fixed signed-in user on the pro tier
pub fn pro_user_resolver(user_id: &str) -> IdentityResolver {
    IdentityResolver::new(
        Arc::new(FixedFingerprint("unused".to_string())),
        Arc::new(FixedSession(Some(user_id.to_string()))),
        Arc::new(FixedPlan(Plan::Pro)),
    )
}

/// Local quota backend writing under `dir`
pub fn local_store(dir: &TempDir) -> Arc<LocalStore> {
    Arc::new(LocalStore::new(&LocalStoreConfig {
        path: dir.path().join("quota.json"),
    }))
}

/// Local-only composite store writing under `dir`
pub fn local_only_store(dir: &TempDir) -> QuotaStore {
    QuotaStore::new(None, local_store(dir))
}

/// Remote backend pointed at a wiremock server.
///
/// The IP echo URL is routed to the same server so tests never hit the
/// network; an unmounted `/ip` path falls back to `"unknown"`.
pub fn remote_store(mock_uri: &str) -> RemoteStore {
    let config = QuotaStoreConfig {
        url: mock_uri.to_string(),
        anon_key: "test-anon-key".to_string(),
        ip_echo_url: format!("{}/ip", mock_uri),
    };
    RemoteStore::new(&config, reqwest::Client::new())
}

/// Composite store with a remote backend and a local fallback under `dir`
pub fn fallback_store(mock_uri: &str, dir: &TempDir) -> QuotaStore {
    QuotaStore::new(
        Some(Arc::new(remote_store(mock_uri)) as Arc<dyn QuotaBackend>),
        local_store(dir),
    )
}

/// Orchestrator over an explicit resolver/store, submitting to `webhook_url`
pub fn orchestrator(
    resolver: IdentityResolver,
    store: QuotaStore,
    webhook_url: &str,
    timeout_secs: u64,
) -> QueryOrchestrator {
    QueryOrchestrator::new(
        resolver,
        store,
        reqwest::Client::new(),
        WebhookConfig {
            url: webhook_url.to_string(),
            timeout_secs,
        },
    )
}

/// A typical analysis request
pub fn analysis_request() -> AnalysisRequest {
    AnalysisRequest {
        organizacion: "ACME".to_string(),
        tema: "lanzamiento de producto".to_string(),
        fecha: "2026-08-01".to_string(),
    }
}

/// The recorded-query shape of [`analysis_request`]
pub fn recorded_query() -> RecordedQuery {
    RecordedQuery {
        organizacion: "ACME".to_string(),
        tema: "lanzamiento de producto".to_string(),
        fecha: "2026-08-01".to_string(),
    }
}
