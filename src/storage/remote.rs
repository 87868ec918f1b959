//! Remote quota backend (Supabase/PostgREST)
//!
//! Consumes three collaborator tables over plain REST:
//!
//! - `visitors_queries`: one live row per anonymous fingerprint with a
//!   rolling 24 h `expires_at` window and an in-row counter;
//! - `user_queries`: one row per authenticated query, counted at read time
//!   from the start of the current UTC day (calendar-day window; the
//!   asymmetry with the anonymous path is deliberate product behavior);
//! - `user_plans`: `plan_type` per user id.
//!
//! Every non-success status is surfaced as a store error so the composite
//! can fall back to the local document; an empty result set is not an
//! error. The check-then-insert on the anonymous path is not transactional;
//! a duplicate live row is possible under concurrency, and reads order by
//! `expires_at` descending so the race undercounts rather than blocks.

use super::{QuotaBackend, RecordedQuery, UsageRecord};
use crate::config::QuotaStoreConfig;
use crate::core::identity::{Plan, PlanLookup, VisitorIdentity};
use crate::utils::error::{GatewayError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration as StdDuration;
use tracing::{debug, warn};

/// Rolling window length for anonymous visitors
const ANONYMOUS_WINDOW_HOURS: i64 = 24;

/// Timeout for the best-effort IP echo lookup
const IP_ECHO_TIMEOUT_SECS: u64 = 5;

/// Live row of the `visitors_queries` table
#[derive(Debug, Clone, Deserialize)]
struct VisitorQueryRow {
    id: serde_json::Value,
    #[serde(default)]
    query_count: Option<u32>,
    #[serde(default)]
    ip_address: Option<String>,
    expires_at: DateTime<Utc>,
}

/// Insert shape for `visitors_queries`
#[derive(Debug, Serialize)]
struct NewVisitorQueryRow<'a> {
    fingerprint: &'a str,
    ip_address: &'a str,
    query_count: u32,
    last_query_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Update shape for `visitors_queries`
#[derive(Debug, Serialize)]
struct VisitorQueryUpdate {
    query_count: u32,
    last_query_at: DateTime<Utc>,
}

/// Insert shape for `user_queries`
#[derive(Debug, Serialize)]
struct NewUserQueryRow<'a> {
    user_id: &'a str,
    organizacion: &'a str,
    tema: &'a str,
    fecha: &'a str,
    created_at: DateTime<Utc>,
}

/// Row of the `user_plans` table
#[derive(Debug, Deserialize)]
struct UserPlanRow {
    plan_type: String,
}

/// Response of the IP echo service
#[derive(Debug, Deserialize)]
struct IpEchoResponse {
    ip: String,
}

/// Remote quota backend over the PostgREST API
#[derive(Debug, Clone)]
pub struct RemoteStore {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    ip_echo_url: String,
}

impl RemoteStore {
    /// Create a backend over the configured project
    pub fn new(config: &QuotaStoreConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            ip_echo_url: config.ip_echo_url.clone(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
    }

    /// Map a non-success status to a store error.
    ///
    /// Permission and configuration problems (401/403/404/406) land here
    /// like any other failure; the composite turns them into a local
    /// fallback instead of a user-visible error.
    fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(GatewayError::store(format!(
                "remote store returned status {}",
                status
            )))
        }
    }

    /// The live `visitors_queries` row for `fingerprint`, if any
    async fn live_visitor_row(&self, fingerprint: &str) -> Result<Option<VisitorQueryRow>> {
        let response = self
            .authed(self.client.get(self.table_url("visitors_queries")))
            .query(&[
                ("select", "*".to_string()),
                ("fingerprint", format!("eq.{}", fingerprint)),
                ("expires_at", format!("gte.{}", Utc::now().to_rfc3339())),
                ("order", "expires_at.desc".to_string()),
                ("limit", "1".to_string()),
            ])
            .send()
            .await?;

        let rows: Vec<VisitorQueryRow> = Self::ensure_success(response)?.json().await?;
        Ok(rows.into_iter().next())
    }

    /// Count of `user_queries` rows for `user_id` since UTC midnight
    async fn user_queries_today(&self, user_id: &str) -> Result<u32> {
        let day_start = start_of_utc_day();
        let response = self
            .authed(self.client.get(self.table_url("user_queries")))
            .query(&[
                ("select", "id".to_string()),
                ("user_id", format!("eq.{}", user_id)),
                ("created_at", format!("gte.{}", day_start.to_rfc3339())),
            ])
            .send()
            .await?;

        let rows: Vec<serde_json::Value> = Self::ensure_success(response)?.json().await?;
        Ok(rows.len() as u32)
    }

    /// Best-effort external address for anonymous rows
    async fn client_ip(&self) -> String {
        let lookup = self
            .client
            .get(&self.ip_echo_url)
            .timeout(StdDuration::from_secs(IP_ECHO_TIMEOUT_SECS))
            .send()
            .await;

        match lookup {
            Ok(response) => match response.json::<IpEchoResponse>().await {
                Ok(echo) => echo.ip,
                Err(_) => "unknown".to_string(),
            },
            Err(e) => {
                debug!("IP echo lookup failed: {}", e);
                "unknown".to_string()
            }
        }
    }

    async fn increment_anonymous(&self, fingerprint: &str) -> Result<()> {
        let now = Utc::now();

        match self.live_visitor_row(fingerprint).await? {
            None => {
                let ip = self.client_ip().await;
                let row = NewVisitorQueryRow {
                    fingerprint,
                    ip_address: &ip,
                    query_count: 1,
                    last_query_at: now,
                    expires_at: now + Duration::hours(ANONYMOUS_WINDOW_HOURS),
                };
                let response = self
                    .authed(self.client.post(self.table_url("visitors_queries")))
                    .header("Prefer", "return=minimal")
                    .json(&row)
                    .send()
                    .await?;
                Self::ensure_success(response)?;
                debug!(%fingerprint, "Created anonymous usage row");
            }
            Some(existing) => {
                // The window's expires_at is left untouched; only the
                // counter and last_query_at move.
                let update = VisitorQueryUpdate {
                    query_count: existing.query_count.unwrap_or(0) + 1,
                    last_query_at: now,
                };
                let response = self
                    .authed(self.client.patch(self.table_url("visitors_queries")))
                    .query(&[("id", format!("eq.{}", id_as_string(&existing.id)))])
                    .header("Prefer", "return=minimal")
                    .json(&update)
                    .send()
                    .await?;
                Self::ensure_success(response)?;
                debug!(
                    %fingerprint,
                    count = update.query_count,
                    "Updated anonymous usage row"
                );
            }
        }

        Ok(())
    }

    async fn increment_authenticated(&self, user_id: &str, query: &RecordedQuery) -> Result<()> {
        let row = NewUserQueryRow {
            user_id,
            organizacion: &query.organizacion,
            tema: &query.tema,
            fecha: &query.fecha,
            created_at: Utc::now(),
        };
        let response = self
            .authed(self.client.post(self.table_url("user_queries")))
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await?;
        Self::ensure_success(response)?;
        debug!(%user_id, "Recorded authenticated query row");
        Ok(())
    }
}

#[async_trait]
impl QuotaBackend for RemoteStore {
    async fn read(&self, identity: &VisitorIdentity) -> Result<Option<UsageRecord>> {
        match identity {
            VisitorIdentity::Anonymous { fingerprint } => {
                let row = self.live_visitor_row(fingerprint).await?;
                Ok(row.map(|row| UsageRecord {
                    query_count: row.query_count.unwrap_or(0),
                    window_start: row.expires_at - Duration::hours(ANONYMOUS_WINDOW_HOURS),
                    expires_at: row.expires_at,
                    ip_address: row.ip_address,
                }))
            }
            VisitorIdentity::Authenticated { user_id, .. } => {
                let count = self.user_queries_today(user_id).await?;
                if count == 0 {
                    return Ok(None);
                }
                let day_start = start_of_utc_day();
                Ok(Some(UsageRecord {
                    query_count: count,
                    window_start: day_start,
                    expires_at: day_start + Duration::hours(24),
                    ip_address: None,
                }))
            }
        }
    }

    async fn increment(&self, identity: &VisitorIdentity, query: &RecordedQuery) -> Result<()> {
        match identity {
            VisitorIdentity::Anonymous { fingerprint } => {
                self.increment_anonymous(fingerprint).await
            }
            VisitorIdentity::Authenticated { user_id, .. } => {
                self.increment_authenticated(user_id, query).await
            }
        }
    }
}

#[async_trait]
impl PlanLookup for RemoteStore {
    async fn plan_for(&self, user_id: &str) -> Result<Option<Plan>> {
        let response = self
            .authed(self.client.get(self.table_url("user_plans")))
            .query(&[
                ("select", "plan_type".to_string()),
                ("user_id", format!("eq.{}", user_id)),
                ("limit", "1".to_string()),
            ])
            .send()
            .await?;

        let rows: Vec<UserPlanRow> = match Self::ensure_success(response) {
            Ok(response) => response.json().await?,
            Err(e) => {
                // The resolver defaults to free on any lookup problem.
                warn!("Plan lookup rejected by remote store: {}", e);
                return Err(e);
            }
        };

        Ok(rows
            .into_iter()
            .next()
            .map(|row| Plan::from_plan_type(&row.plan_type)))
    }
}

/// Start of the current UTC calendar day
fn start_of_utc_day() -> DateTime<Utc> {
    Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// PostgREST filter values must not carry JSON string quotes
fn id_as_string(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
