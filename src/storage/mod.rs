//! Quota storage layer
//!
//! Persistence for per-identity usage counts, with two backends behind one
//! strategy trait: the remote shared datastore (authoritative, multi-device)
//! and a device-local JSON document (fallback, single-device). The
//! [`QuotaStore`] composite owns the ordered fallback policy and absorbs
//! every backend error: quota storage is best-effort and the product fails
//! open, never closed.

/// Device-local fallback backend
pub mod local;
/// Remote (Supabase/PostgREST) backend
pub mod remote;

pub use local::LocalStore;
pub use remote::RemoteStore;

use crate::core::identity::VisitorIdentity;
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Accumulated usage for one identity within its current window.
///
/// At most one live record exists per identity; a record past `expires_at`
/// is treated as absent and lazily superseded rather than deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    /// Queries recorded in this window, never decremented
    pub query_count: u32,
    /// Start of the window
    pub window_start: DateTime<Utc>,
    /// End of the window; fixed when the window is created
    pub expires_at: DateTime<Utc>,
    /// Best-effort origin address, anonymous records only
    pub ip_address: Option<String>,
}

impl UsageRecord {
    /// Whether the record's window has ended at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Metadata stored alongside a recorded query
#[derive(Debug, Clone)]
pub struct RecordedQuery {
    /// Organization the analysis was about
    pub organizacion: String,
    /// Topic of the press release
    pub tema: String,
    /// Publication date (ISO date string)
    pub fecha: String,
}

/// One persistence strategy for usage records.
///
/// Backends report their failures; deciding what a failure means (fall
/// back, fail open) is the composite's job, not theirs.
#[async_trait]
pub trait QuotaBackend: Send + Sync {
    /// The live usage record for `identity`, or `None` when the identity
    /// has no usage in the current window
    async fn read(&self, identity: &VisitorIdentity) -> Result<Option<UsageRecord>>;

    /// Record one query for `identity`: create the window record on first
    /// use, otherwise increase its count by exactly one
    async fn increment(&self, identity: &VisitorIdentity, query: &RecordedQuery) -> Result<()>;
}

/// Ordered-fallback composite over the remote and local backends.
///
/// Remote first when available; any remote failure (permission errors,
/// network, misconfiguration) falls back to the local backend for that
/// call. "No rows" is not a failure. Errors never propagate to callers:
/// an unrecoverable read yields `None` (no prior usage) and an
/// unrecoverable increment reports `false`.
pub struct QuotaStore {
    remote: Option<Arc<dyn QuotaBackend>>,
    local: Arc<dyn QuotaBackend>,
}

impl QuotaStore {
    /// Create a store over an optional remote backend and the local
    /// fallback. `None` for the remote means local-only mode.
    pub fn new(remote: Option<Arc<dyn QuotaBackend>>, local: Arc<dyn QuotaBackend>) -> Self {
        Self { remote, local }
    }

    /// Read the live usage record for `identity`. Infallible by design.
    pub async fn read(&self, identity: &VisitorIdentity) -> Option<UsageRecord> {
        if let Some(remote) = &self.remote {
            match remote.read(identity).await {
                Ok(usage) => return usage,
                Err(e) => {
                    warn!("Remote quota read failed, falling back to local store: {}", e);
                }
            }
        }

        match self.local.read(identity).await {
            Ok(usage) => usage,
            Err(e) => {
                // Fail open: no usable state means no recorded usage.
                warn!("Local quota read failed, treating as no prior usage: {}", e);
                None
            }
        }
    }

    /// Record one query for `identity`. Returns whether any backend
    /// accepted the write.
    pub async fn increment(&self, identity: &VisitorIdentity, query: &RecordedQuery) -> bool {
        if let Some(remote) = &self.remote {
            match remote.increment(identity, query).await {
                Ok(()) => {
                    debug!(key = identity.key(), "Recorded query in remote store");
                    return true;
                }
                Err(e) => {
                    warn!(
                        "Remote quota increment failed, falling back to local store: {}",
                        e
                    );
                }
            }
        }

        match self.local.increment(identity, query).await {
            Ok(()) => {
                debug!(key = identity.key(), "Recorded query in local store");
                true
            }
            Err(e) => {
                warn!("Local quota increment failed, query not recorded: {}", e);
                false
            }
        }
    }
}
