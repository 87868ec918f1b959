//! Utility modules for the gateway core
//!
//! - **error**: error types and submission-failure classification
//! - **logging**: tracing subscriber setup

pub mod error;
pub mod logging;

pub use error::{GatewayError, Result, SubmissionError};
