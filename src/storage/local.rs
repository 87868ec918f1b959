//! Device-local quota fallback
//!
//! A single JSON document holding `{query_count, last_query_at, expires_at}`
//! for this device, used whenever the remote store is unreachable or not
//! configured. Single-device by nature: concurrent processes writing the
//! same document can lose an update (known, accepted limitation; the
//! remote store is the authoritative multi-device path).

use super::{QuotaBackend, RecordedQuery, UsageRecord};
use crate::config::LocalStoreConfig;
use crate::core::identity::VisitorIdentity;
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, warn};

/// Window length for the local store, matching the anonymous remote path
const WINDOW_HOURS: i64 = 24;

/// On-disk shape of the usage document
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LocalUsage {
    query_count: u32,
    last_query_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Local JSON-document quota backend
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    /// Create a store writing at the configured path
    pub fn new(config: &LocalStoreConfig) -> Self {
        Self {
            path: config.path.clone(),
        }
    }

    /// Load the stored document, if any.
    ///
    /// A missing file means no usage. An unreadable or unparseable file is
    /// treated the same way (fail open), with a warning; the next write
    /// replaces it.
    async fn load(&self) -> Option<LocalUsage> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Could not read local quota document: {}", e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(usage) => Some(usage),
            Err(e) => {
                warn!("Discarding corrupt local quota document: {}", e);
                None
            }
        }
    }

    async fn save(&self, usage: &LocalUsage) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let raw = serde_json::to_string_pretty(usage)?;
        fs::write(&self.path, raw).await?;
        Ok(())
    }
}

#[async_trait]
impl QuotaBackend for LocalStore {
    async fn read(&self, _identity: &VisitorIdentity) -> Result<Option<UsageRecord>> {
        let now = Utc::now();
        let usage = match self.load().await {
            Some(usage) if now <= usage.expires_at => usage,
            // Expired documents are superseded lazily on the next write.
            _ => return Ok(None),
        };

        Ok(Some(UsageRecord {
            query_count: usage.query_count,
            window_start: usage.expires_at - Duration::hours(WINDOW_HOURS),
            expires_at: usage.expires_at,
            ip_address: None,
        }))
    }

    async fn increment(&self, _identity: &VisitorIdentity, _query: &RecordedQuery) -> Result<()> {
        let now = Utc::now();

        // Keep the live window's expiry when incrementing; only an expired
        // (or absent) document starts a fresh window.
        let usage = match self.load().await {
            Some(prev) if now < prev.expires_at => LocalUsage {
                query_count: prev.query_count + 1,
                last_query_at: now,
                expires_at: prev.expires_at,
            },
            _ => LocalUsage {
                query_count: 1,
                last_query_at: now,
                expires_at: now + Duration::hours(WINDOW_HOURS),
            },
        };

        self.save(&usage).await?;
        debug!(
            count = usage.query_count,
            expires_at = %usage.expires_at,
            "Local quota document updated"
        );
        Ok(())
    }
}
