//! # prensa-gateway
//!
//! Core of the "¿Funcionó mi nota de prensa?" freemium front end: the
//! query-quota gate and the analysis submission workflow. The surrounding
//! UI, the auth provider, and the analysis backend are external
//! collaborators; this crate owns the part with design substance: capping
//! how many analyses a visitor can run per rolling day, with a dual-path
//! persistence scheme (remote datastore primary, device-local fallback)
//! and distinct tiers for anonymous, free and pro visitors.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use prensa_gateway::config::Config;
//! use prensa_gateway::core::analysis::AnalysisRequest;
//! use prensa_gateway::core::orchestrator::{QueryOrchestrator, SubmissionOutcome};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let orchestrator = QueryOrchestrator::from_config(&config)?;
//!
//!     let request = AnalysisRequest {
//!         organizacion: "ACME".into(),
//!         tema: "lanzamiento de producto".into(),
//!         fecha: "2026-08-01".into(),
//!     };
//!
//!     match orchestrator.submit(&request).await {
//!         SubmissionOutcome::Completed { result, decision } => {
//!             println!("{} (quedan {})", result.resultado_global, decision.remaining_queries);
//!         }
//!         SubmissionOutcome::Blocked(decision) => {
//!             println!("Límite alcanzado ({} consultas)", decision.queries_used);
//!         }
//!         SubmissionOutcome::Failed(err) => {
//!             eprintln!("{}", err.user_message());
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Failure posture
//!
//! Quota storage is best-effort and fails open: a misconfigured or
//! unreachable remote store degrades to the local document, and an
//! unrecoverable storage error reads as "no prior usage" rather than
//! blocking a legitimate visitor. Submission failures are classified
//! (timeout, network, server, malformed) and never consume quota.

pub mod config;
pub mod core;
pub mod storage;
pub mod utils;

pub use config::Config;
pub use core::analysis::{AnalysisRequest, AnalysisResult};
pub use core::identity::{Plan, VisitorIdentity};
pub use core::orchestrator::{QueryOrchestrator, SubmissionOutcome, SubmissionPhase};
pub use core::policy::QuotaDecision;
pub use storage::{QuotaBackend, QuotaStore, UsageRecord};
pub use utils::error::{GatewayError, Result, SubmissionError};
