//! Core gateway logic
//!
//! - **identity**: who is asking (anonymous fingerprint vs account)
//! - **policy**: pure quota tier arithmetic
//! - **analysis**: webhook request/response models and normalization
//! - **orchestrator**: the check → submit → record workflow

pub mod analysis;
pub mod identity;
pub mod orchestrator;
pub mod policy;

pub use analysis::{AnalysisRequest, AnalysisResult};
pub use identity::{IdentityResolver, Plan, VisitorIdentity};
pub use orchestrator::{QueryOrchestrator, SubmissionOutcome, SubmissionPhase};
pub use policy::QuotaDecision;
