//! Query orchestration
//!
//! The request-time workflow around one analysis submission:
//! quota check → webhook call → usage recording, with timeout handling
//! and failure classification. Per attempt the state machine is
//! `Idle → QuotaChecking → {Blocked | Submitting} → {Succeeded | Failed}
//! → Idle`; the terminal outcome is the return value and the phase is
//! observable while an attempt is in flight.
//!
//! Quota is evaluated against the freshest count on every attempt (no
//! decision is cached across attempts), and usage is recorded only after
//! a confirmed successful response, so blocked and failed submissions
//! never consume quota.

use crate::config::{Config, WebhookConfig};
use crate::core::analysis::{normalize_payload, AnalysisRequest, AnalysisResult};
use crate::core::identity::{
    DeviceFingerprint, EnvSession, FreePlanOnly, IdentityResolver, PlanLookup, VisitorIdentity,
};
use crate::core::policy::{self, QuotaDecision};
use crate::storage::{LocalStore, QuotaBackend, QuotaStore, RecordedQuery, RemoteStore};
use crate::utils::error::{Result, SubmissionError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Where an in-flight submission attempt currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionPhase {
    /// No attempt in flight
    Idle,
    /// Resolving identity and evaluating quota
    QuotaChecking,
    /// Quota denied; caller should present the upgrade/sign-in prompt
    Blocked,
    /// Webhook request in flight
    Submitting,
    /// Response confirmed and usage recorded
    Succeeded,
    /// Submission failed; see the returned classification
    Failed,
}

/// Terminal result of one submission attempt
#[derive(Debug)]
pub enum SubmissionOutcome {
    /// Quota denied. Nothing was sent and nothing was recorded; the
    /// decision carries what to show in the upgrade prompt.
    Blocked(QuotaDecision),
    /// Analysis completed and usage recorded
    Completed {
        /// The normalized analysis payload
        result: AnalysisResult,
        /// Fresh decision after recording, for the remaining-queries banner
        decision: QuotaDecision,
    },
    /// Submission failed; quota untouched
    Failed(SubmissionError),
}

/// Wire body of the analysis webhook request
#[derive(Debug, Serialize)]
struct WebhookBody<'a> {
    organizacion: &'a str,
    tema: &'a str,
    fecha: &'a str,
    id_sesion: String,
    user_id: Option<&'a str>,
}

/// Drives one analysis submission end to end.
///
/// Callers must not start a second `submit` while one is in
/// [`SubmissionPhase::Submitting`]; the orchestrator exposes the phase but
/// deliberately does not serialize callers itself.
pub struct QueryOrchestrator {
    resolver: IdentityResolver,
    store: QuotaStore,
    client: reqwest::Client,
    webhook: WebhookConfig,
    session_id: Uuid,
    phase: RwLock<SubmissionPhase>,
}

impl QueryOrchestrator {
    /// Create an orchestrator over explicit collaborators
    pub fn new(
        resolver: IdentityResolver,
        store: QuotaStore,
        client: reqwest::Client,
        webhook: WebhookConfig,
    ) -> Self {
        Self {
            resolver,
            store,
            client,
            webhook,
            session_id: Uuid::new_v4(),
            phase: RwLock::new(SubmissionPhase::Idle),
        }
    }

    /// Wire up the full default stack from configuration: device
    /// fingerprinting, env-based session, and the remote store (when
    /// configured) doubling as the plan lookup.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("prensa-gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let local = Arc::new(LocalStore::new(&config.local_store));

        let remote: Option<Arc<dyn QuotaBackend>>;
        let plans: Arc<dyn PlanLookup>;
        if config.store.is_configured() {
            let backend = Arc::new(RemoteStore::new(&config.store, client.clone()));
            remote = Some(backend.clone());
            plans = backend;
        } else {
            remote = None;
            plans = Arc::new(FreePlanOnly);
        }

        let resolver = IdentityResolver::new(
            Arc::new(DeviceFingerprint),
            Arc::new(EnvSession),
            plans,
        );

        Ok(Self::new(
            resolver,
            QuotaStore::new(remote, local),
            client,
            config.webhook.clone(),
        ))
    }

    /// The per-process session id sent with every webhook request
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// The current phase of the submission state machine
    pub async fn phase(&self) -> SubmissionPhase {
        *self.phase.read().await
    }

    async fn set_phase(&self, phase: SubmissionPhase) {
        *self.phase.write().await = phase;
    }

    /// Evaluate quota for the current visitor without submitting anything
    pub async fn check_quota(&self) -> QuotaDecision {
        let identity = self.resolver.resolve().await;
        self.decision_for(&identity).await
    }

    /// Fresh decision for `identity`; usage is not even read for pro
    async fn decision_for(&self, identity: &VisitorIdentity) -> QuotaDecision {
        let usage = if identity.is_pro() {
            None
        } else {
            self.store.read(identity).await
        };
        let decision = policy::evaluate(usage.as_ref(), identity);
        debug!(
            key = identity.key(),
            can_query = decision.can_query,
            remaining = decision.remaining_queries,
            "Quota decision"
        );
        decision
    }

    /// Run one submission attempt end to end
    pub async fn submit(&self, request: &AnalysisRequest) -> SubmissionOutcome {
        self.set_phase(SubmissionPhase::QuotaChecking).await;

        let identity = self.resolver.resolve().await;
        let decision = self.decision_for(&identity).await;

        if !decision.can_query {
            info!(
                key = identity.key(),
                used = decision.queries_used,
                "Submission blocked by quota"
            );
            self.set_phase(SubmissionPhase::Blocked).await;
            self.set_phase(SubmissionPhase::Idle).await;
            return SubmissionOutcome::Blocked(decision);
        }

        self.set_phase(SubmissionPhase::Submitting).await;

        match self.dispatch(&identity, request).await {
            Ok(result) => {
                self.set_phase(SubmissionPhase::Succeeded).await;

                // Recording happens only here, after the response was
                // confirmed parseable; a lost write is absorbed by the
                // store and only under-counts.
                let recorded = self
                    .store
                    .increment(&identity, &RecordedQuery::from(request))
                    .await;
                if !recorded {
                    warn!(key = identity.key(), "Query completed but was not recorded");
                }

                let decision = self.decision_for(&identity).await;
                self.set_phase(SubmissionPhase::Idle).await;
                SubmissionOutcome::Completed { result, decision }
            }
            Err(err) => {
                warn!(key = identity.key(), error = %err, "Submission failed");
                self.set_phase(SubmissionPhase::Failed).await;
                self.set_phase(SubmissionPhase::Idle).await;
                SubmissionOutcome::Failed(err)
            }
        }
    }

    /// POST the analysis request and normalize the response
    async fn dispatch(
        &self,
        identity: &VisitorIdentity,
        request: &AnalysisRequest,
    ) -> std::result::Result<AnalysisResult, SubmissionError> {
        let body = WebhookBody {
            organizacion: &request.organizacion,
            tema: &request.tema,
            fecha: &request.fecha,
            id_sesion: self.session_id.to_string(),
            user_id: match identity {
                VisitorIdentity::Authenticated { user_id, .. } => Some(user_id),
                VisitorIdentity::Anonymous { .. } => None,
            },
        };

        debug!(url = %self.webhook.url, "Dispatching analysis request");

        let response = self
            .client
            .post(&self.webhook.url)
            .timeout(Duration::from_secs(self.webhook.timeout_secs))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| SubmissionError::from_transport(e, self.webhook.timeout_secs))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(SubmissionError::ServerStatus(status.as_u16()));
        }
        if !status.is_success() {
            return Err(SubmissionError::Unexpected(format!(
                "webhook returned status {}",
                status
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| SubmissionError::from_transport(e, self.webhook.timeout_secs))?;

        normalize_payload(&text)
    }
}

impl From<&AnalysisRequest> for RecordedQuery {
    fn from(request: &AnalysisRequest) -> Self {
        Self {
            organizacion: request.organizacion.clone(),
            tema: request.tema.clone(),
            fecha: request.fecha.clone(),
        }
    }
}
