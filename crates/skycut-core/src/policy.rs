//! Policy layer injected by the embedding application.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::Job;
use crate::Result;

/// Application-supplied decisions about UWS jobs.
///
/// The engine never infers intent from a policy: it dispatches through
/// `dispatch` and stores exactly the values the validators return.
/// Returning the job's current value from a validator means "unchanged".
/// Implementations must be safe under concurrent invocation and must not
/// hold locks across calls.
#[async_trait]
pub trait Policy<P: Send + Sync>: Send + Sync {
    /// Check the parameter shape beyond what deserialization enforces.
    ///
    /// Returns an `UnsupportedParameter` error for semantically
    /// inadmissible parameters (unsupported cardinalities and the like).
    fn validate_params(&self, params: &P) -> Result<()>;

    /// Clamp or approve a requested destruction time.
    fn validate_destruction(&self, requested: DateTime<Utc>, job: &Job<P>) -> DateTime<Utc>;

    /// Clamp or approve a requested execution duration in seconds.
    fn validate_execution_duration(&self, requested: i64, job: &Job<P>) -> i64;

    /// Submit the job to the work queue and return the message identifier.
    async fn dispatch(&self, job: &Job<P>) -> Result<String>;
}
