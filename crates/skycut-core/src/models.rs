//! Models for UWS jobs.
//!
//! See <https://www.ivoa.net/documents/UWS/20161024/REC-UWS-1.1-20161024.html>.
//! Descriptive language here is paraphrased from this standard.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time::serde_isodatetime;

/// Possible execution phases for a UWS job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionPhase {
    /// Accepted by the service but not yet sent for execution.
    Pending,

    /// Sent for execution but not yet started.
    Queued,

    /// Currently in progress.
    Executing,

    /// Completed and the results are available for retrieval.
    Completed,

    /// Failed and reported an error.
    Error,

    /// Aborted before it completed.
    Aborted,

    /// In an unknown state.
    Unknown,

    /// Similar to PENDING, held and not sent for execution.
    Held,

    /// Execution has started, is currently suspended, and will be resumed.
    Suspended,

    /// Execution completed some time ago and the results have been deleted.
    Archived,
}

/// Phases in which the job is active and can be waited on.
pub const ACTIVE_PHASES: [ExecutionPhase; 3] = [
    ExecutionPhase::Pending,
    ExecutionPhase::Queued,
    ExecutionPhase::Executing,
];

impl ExecutionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionPhase::Pending => "pending",
            ExecutionPhase::Queued => "queued",
            ExecutionPhase::Executing => "executing",
            ExecutionPhase::Completed => "completed",
            ExecutionPhase::Error => "error",
            ExecutionPhase::Aborted => "aborted",
            ExecutionPhase::Unknown => "unknown",
            ExecutionPhase::Held => "held",
            ExecutionPhase::Suspended => "suspended",
            ExecutionPhase::Archived => "archived",
        }
    }

    /// Create from the stored string form.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ExecutionPhase::Pending),
            "queued" => Some(ExecutionPhase::Queued),
            "executing" => Some(ExecutionPhase::Executing),
            "completed" => Some(ExecutionPhase::Completed),
            "error" => Some(ExecutionPhase::Error),
            "aborted" => Some(ExecutionPhase::Aborted),
            "unknown" => Some(ExecutionPhase::Unknown),
            "held" => Some(ExecutionPhase::Held),
            "suspended" => Some(ExecutionPhase::Suspended),
            "archived" => Some(ExecutionPhase::Archived),
            _ => None,
        }
    }

    /// Check if the job can still be waited on.
    pub fn is_active(&self) -> bool {
        ACTIVE_PHASES.contains(self)
    }

    /// Check if the phase accepts no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionPhase::Completed
                | ExecutionPhase::Error
                | ExecutionPhase::Aborted
                | ExecutionPhase::Archived
        )
    }
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure information about a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    /// Code for the error
    pub error_code: String,

    /// Brief error message
    pub message: String,

    /// Extended error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A single result from the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    /// Identifier for the result, unique within the job
    pub result_id: String,

    /// URL for the result.
    ///
    /// Stored as a persistent internal URL and rewritten to a signed
    /// user-facing URL on read paths.
    pub url: String,

    /// Size of the result in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,

    /// MIME type of the result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Brief job description used for the job list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescription {
    /// Unique identifier
    pub job_id: String,

    /// Identity of job owner
    pub owner: String,

    /// Current execution phase
    pub phase: ExecutionPhase,

    /// Opaque string provided by the client to tie jobs to a client-side
    /// operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    /// When the job was created
    #[serde(with = "serde_isodatetime")]
    pub creation_time: DateTime<Utc>,
}

/// Represents a single UWS job.
///
/// The parameter type is supplied by the embedding application; the engine
/// only requires that it round-trip through serde.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job<P> {
    /// Unique identifier
    pub job_id: String,

    /// Identity of job owner
    pub owner: String,

    /// Current execution phase
    pub phase: ExecutionPhase,

    /// Opaque string provided by the client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    /// When the job was created
    #[serde(with = "serde_isodatetime")]
    pub creation_time: DateTime<Utc>,

    /// When the job started executing
    #[serde(
        default,
        with = "serde_isodatetime::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<DateTime<Utc>>,

    /// When the job stopped executing
    #[serde(
        default,
        with = "serde_isodatetime::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_time: Option<DateTime<Utc>>,

    /// Time at which the job record should be discarded
    #[serde(with = "serde_isodatetime")]
    pub destruction_time: DateTime<Utc>,

    /// Allowed maximum execution duration in seconds.
    ///
    /// Specified in elapsed wall clock time. If not present, there is no
    /// limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_duration: Option<i64>,

    /// Expected completion time if started now
    #[serde(
        default,
        with = "serde_isodatetime::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub quote: Option<DateTime<Utc>>,

    /// Internal message identifier from the work queuing system.
    ///
    /// Never included in user-facing output.
    #[serde(skip_serializing, default)]
    pub message_id: Option<String>,

    /// Error information, populated only when the phase is `error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,

    /// Parameters of the job
    pub parameters: P,

    /// Results of the job, populated only when the phase is `completed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<JobResult>>,
}

impl<P> Job<P> {
    /// The brief form used in job lists.
    pub fn description(&self) -> JobDescription {
        JobDescription {
            job_id: self.job_id.clone(),
            owner: self.owner.clone(),
            phase: self.phase,
            run_id: self.run_id.clone(),
            creation_time: self.creation_time,
        }
    }
}

/// Requested update to a job.
///
/// Only the destruction time and the execution duration can be changed
/// after creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobUpdate {
    /// Time at which the job record should be discarded
    #[serde(
        default,
        with = "serde_isodatetime::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub destruction_time: Option<DateTime<Utc>>,

    /// Allowed maximum execution duration in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_duration: Option<i64>,
}

/// Availability information (from VOSI).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Availability {
    /// Whether the service appears to be available
    pub available: bool,

    /// Supplemental information, usually empty unless the service is down
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Availability {
    pub fn up() -> Self {
        Self {
            available: true,
            note: None,
        }
    }

    pub fn down(note: impl Into<String>) -> Self {
        Self {
            available: false,
            note: Some(note.into()),
        }
    }
}
