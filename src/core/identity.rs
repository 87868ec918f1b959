//! Visitor identity resolution
//!
//! Distinguishes anonymous visitors (identified by a stable device
//! fingerprint) from signed-in users (identified by the account id the
//! auth collaborator reports). All collaborators are injected traits so
//! the resolver is testable with substitutes.

use crate::utils::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::env;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Subscription plan of an authenticated user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    /// Free tier
    Free,
    /// Paid, unlimited tier
    Pro,
}

impl Plan {
    /// Parse a `plan_type` column value. Anything that is not exactly
    /// `"pro"` is treated as free (never fail open to pro).
    pub fn from_plan_type(value: &str) -> Self {
        if value == "pro" {
            Plan::Pro
        } else {
            Plan::Free
        }
    }
}

/// Who is asking: an anonymous browser/device, or a signed-in account
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitorIdentity {
    /// Anonymous visitor, keyed by device fingerprint
    Anonymous {
        /// Stable, opaque, device-derived identifier
        fingerprint: String,
    },
    /// Signed-in user, keyed by account id
    Authenticated {
        /// Account id from the auth collaborator
        user_id: String,
        /// Subscription plan
        plan: Plan,
    },
}

impl VisitorIdentity {
    /// The storage key for this identity (fingerprint or user id)
    pub fn key(&self) -> &str {
        match self {
            VisitorIdentity::Anonymous { fingerprint } => fingerprint,
            VisitorIdentity::Authenticated { user_id, .. } => user_id,
        }
    }

    /// Whether this identity is on the unlimited plan
    pub fn is_pro(&self) -> bool {
        matches!(
            self,
            VisitorIdentity::Authenticated { plan: Plan::Pro, .. }
        )
    }
}

/// Active session as reported by the auth collaborator
#[derive(Debug, Clone)]
pub struct AuthSession {
    /// Account id of the signed-in user
    pub user_id: String,
}

/// Source of the stable per-device fingerprint
#[async_trait]
pub trait FingerprintProvider: Send + Sync {
    /// Compute or fetch the device fingerprint
    async fn fingerprint(&self) -> Result<String>;
}

/// Source of the current authentication session, if any
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// The active session, or `None` for anonymous visitors
    async fn current_session(&self) -> Option<AuthSession>;
}

/// Lookup of a user's subscription plan
#[async_trait]
pub trait PlanLookup: Send + Sync {
    /// The plan for `user_id`, or `None` when no row exists
    async fn plan_for(&self, user_id: &str) -> Result<Option<Plan>>;
}

/// Resolves the caller's identity once per request.
///
/// The fingerprint is computed at most once per process and cached; plan
/// lookups happen on every resolve so an upgrade takes effect without a
/// restart.
pub struct IdentityResolver {
    fingerprints: Arc<dyn FingerprintProvider>,
    sessions: Arc<dyn SessionProvider>,
    plans: Arc<dyn PlanLookup>,
    cached_fingerprint: OnceCell<String>,
}

impl IdentityResolver {
    /// Create a resolver over the given collaborators
    pub fn new(
        fingerprints: Arc<dyn FingerprintProvider>,
        sessions: Arc<dyn SessionProvider>,
        plans: Arc<dyn PlanLookup>,
    ) -> Self {
        Self {
            fingerprints,
            sessions,
            plans,
            cached_fingerprint: OnceCell::new(),
        }
    }

    /// Resolve the current visitor identity.
    ///
    /// Never fails: a missing identity is not an error, anonymous is the
    /// base state, and a failed plan lookup degrades to the free tier.
    pub async fn resolve(&self) -> VisitorIdentity {
        if let Some(session) = self.sessions.current_session().await {
            let plan = match self.plans.plan_for(&session.user_id).await {
                Ok(Some(plan)) => plan,
                Ok(None) => Plan::Free,
                Err(e) => {
                    warn!("Plan lookup failed, defaulting to free: {}", e);
                    Plan::Free
                }
            };
            debug!(user_id = %session.user_id, ?plan, "Resolved authenticated identity");
            return VisitorIdentity::Authenticated {
                user_id: session.user_id,
                plan,
            };
        }

        let fingerprint = self
            .cached_fingerprint
            .get_or_init(|| async {
                match self.fingerprints.fingerprint().await {
                    Ok(fp) => fp,
                    Err(e) => {
                        // Still hand out a per-process identity; quota then
                        // effectively resets on restart for this visitor.
                        warn!("Fingerprint provider failed, using ephemeral id: {}", e);
                        uuid::Uuid::new_v4().simple().to_string()
                    }
                }
            })
            .await
            .clone();

        debug!(%fingerprint, "Resolved anonymous identity");
        VisitorIdentity::Anonymous { fingerprint }
    }
}

/// Default fingerprint provider: hashes stable device material.
///
/// Reads the machine id where available and mixes in hostname/user
/// environment values. Collisions are possible but rare; the result is an
/// opaque identifier, not a cryptographic credential.
#[derive(Debug, Default)]
pub struct DeviceFingerprint;

#[async_trait]
impl FingerprintProvider for DeviceFingerprint {
    async fn fingerprint(&self) -> Result<String> {
        let mut hasher = Sha256::new();

        if let Ok(machine_id) = tokio::fs::read_to_string("/etc/machine-id").await {
            hasher.update(machine_id.trim().as_bytes());
        }
        for var in ["HOSTNAME", "COMPUTERNAME", "USER", "USERNAME"] {
            if let Ok(value) = env::var(var) {
                hasher.update(value.as_bytes());
            }
        }

        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        Ok(hex[..32].to_string())
    }
}

/// Session provider for flows with no auth integration: always anonymous
#[derive(Debug, Default)]
pub struct NoSession;

#[async_trait]
impl SessionProvider for NoSession {
    async fn current_session(&self) -> Option<AuthSession> {
        None
    }
}

/// Session provider backed by the `PRENSA_USER_ID` environment variable.
///
/// Stand-in for the out-of-scope auth collaborator when driving the core
/// from the CLI.
#[derive(Debug, Default)]
pub struct EnvSession;

#[async_trait]
impl SessionProvider for EnvSession {
    async fn current_session(&self) -> Option<AuthSession> {
        env::var("PRENSA_USER_ID")
            .ok()
            .filter(|id| !id.is_empty())
            .map(|user_id| AuthSession { user_id })
    }
}

/// Plan lookup that knows nothing: everyone is on the free tier.
///
/// Used in local-only mode, where there is no plan table to consult.
#[derive(Debug, Default)]
pub struct FreePlanOnly;

#[async_trait]
impl PlanLookup for FreePlanOnly {
    async fn plan_for(&self, _user_id: &str) -> Result<Option<Plan>> {
        Ok(None)
    }
}
