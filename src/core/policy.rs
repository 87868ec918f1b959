//! Quota policy engine
//!
//! Pure tier arithmetic: raw usage count + identity in, decision out. No
//! I/O and no mutation, which is what keeps the tiering rules testable on
//! their own.

use crate::core::identity::{Plan, VisitorIdentity};
use crate::storage::UsageRecord;
use serde::Serialize;

/// Daily query limit for anonymous visitors
pub const ANONYMOUS_DAILY_LIMIT: u32 = 3;

/// Daily query limit for free authenticated users
pub const FREE_DAILY_LIMIT: u32 = 10;

/// Sentinel for the unlimited tier in `remaining_queries`
pub const UNLIMITED: i64 = -1;

/// Outcome of a quota check. Derived fresh on every check, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaDecision {
    /// Whether a query may be submitted now
    pub can_query: bool,
    /// Queries already used in the current window
    pub queries_used: u32,
    /// The tier's limit; `None` means unlimited
    pub limit: Option<u32>,
    /// Queries left in the window; [`UNLIMITED`] for the pro tier
    pub remaining_queries: i64,
}

impl QuotaDecision {
    /// Whether this decision comes from the unlimited tier
    pub fn is_unlimited(&self) -> bool {
        self.remaining_queries == UNLIMITED
    }
}

/// The per-window limit for an identity, `None` for unlimited
pub fn tier_limit(identity: &VisitorIdentity) -> Option<u32> {
    match identity {
        VisitorIdentity::Anonymous { .. } => Some(ANONYMOUS_DAILY_LIMIT),
        VisitorIdentity::Authenticated {
            plan: Plan::Free, ..
        } => Some(FREE_DAILY_LIMIT),
        VisitorIdentity::Authenticated { plan: Plan::Pro, .. } => None,
    }
}

/// Evaluate the quota decision for `identity` given its usage record.
///
/// Pro users bypass usage entirely: callers are expected not to read it
/// for them, and this function ignores it if they did.
pub fn evaluate(usage: Option<&UsageRecord>, identity: &VisitorIdentity) -> QuotaDecision {
    let limit = match tier_limit(identity) {
        Some(limit) => limit,
        None => {
            return QuotaDecision {
                can_query: true,
                queries_used: 0,
                limit: None,
                remaining_queries: UNLIMITED,
            };
        }
    };

    let queries_used = usage.map(|u| u.query_count).unwrap_or(0);
    let remaining = limit.saturating_sub(queries_used);

    QuotaDecision {
        can_query: remaining > 0,
        queries_used,
        limit: Some(limit),
        remaining_queries: i64::from(remaining),
    }
}
