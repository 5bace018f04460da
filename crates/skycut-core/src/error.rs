use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::JobError;

/// Part of the request that triggered an error.
///
/// Used to build error payloads that match the shape of native request
/// validation errors, so clients see one consistent format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorLocation {
    Body,
    Header,
    Path,
    Query,
}

impl ErrorLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorLocation::Body => "body",
            ErrorLocation::Header => "header",
            ErrorLocation::Path => "path",
            ErrorLocation::Query => "query",
        }
    }
}

/// Main error type for skycut
#[derive(Debug)]
pub enum Error {
    /// No job exists with the given identifier
    UnknownJob(String),

    /// Caller is not the owner of the job
    PermissionDenied(String),

    /// Requested phase transition is not permitted by the job state machine
    InvalidPhase(String),

    /// Policy rejected the parameter shape
    UnsupportedParameter(String),

    /// Synchronous request did not finish within the configured deadline
    SyncTimeout(String),

    /// Worker-reported failure with structured detail
    Task(JobError),

    /// Request carried no authenticated identity
    Unauthorized(String),

    /// Request validation errors
    Validation(String),

    /// Configuration errors
    Config(String),

    /// Database errors (SQLx wrapped)
    Database(sqlx::Error),

    /// Serialization/deserialization errors
    Serialization(serde_json::Error),

    /// Work queue errors
    Queue(String),

    /// Generic errors with description
    Other(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownJob(job_id) => write!(f, "Job {} not found", job_id),
            Error::PermissionDenied(msg) => write!(f, "{}", msg),
            Error::InvalidPhase(msg) => write!(f, "{}", msg),
            Error::UnsupportedParameter(msg) => write!(f, "{}", msg),
            Error::SyncTimeout(msg) => write!(f, "{}", msg),
            Error::Task(error) => match &error.detail {
                Some(detail) => write!(f, "{}: {}", error.message, detail),
                None => write!(f, "{}", error.message),
            },
            Error::Unauthorized(msg) => write!(f, "{}", msg),
            Error::Validation(msg) => write!(f, "{}", msg),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Database(e) => write!(f, "Database error: {}", e),
            Error::Serialization(e) => write!(f, "Serialization error: {}", e),
            Error::Queue(msg) => write!(f, "Work queue error: {}", msg),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Database(e) => Some(e),
            Error::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

// Conversions from external error types
impl From<sqlx::Error> for Error {
    fn from(error: sqlx::Error) -> Self {
        Error::Database(error)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Serialization(error)
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::Config(error.to_string())
    }
}

// Common error constructors
impl Error {
    /// Create a new permission denied error for a job
    pub fn permission_denied(job_id: &str) -> Self {
        Error::PermissionDenied(format!("Access to job {} denied", job_id))
    }

    /// Create a new configuration error
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new validation error
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a new unsupported parameter error
    pub fn unsupported_parameter<T: Into<String>>(msg: T) -> Self {
        Error::UnsupportedParameter(msg.into())
    }

    /// Create a new work queue error
    pub fn queue<T: Into<String>>(msg: T) -> Self {
        Error::Queue(msg.into())
    }

    /// Create a new task error
    pub fn task<C, M>(error_code: C, message: M, detail: Option<String>) -> Self
    where
        C: Into<String>,
        M: Into<String>,
    {
        Error::Task(JobError {
            error_code: error_code.into(),
            message: message.into(),
            detail,
        })
    }
}

impl Error {
    /// Get HTTP status code for error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::UnknownJob(_) => 404,
            Error::PermissionDenied(_) => 403,
            Error::InvalidPhase(_) => 422,
            Error::UnsupportedParameter(_) => 422,
            Error::SyncTimeout(_) => 400,
            Error::Task(_) => 400,
            Error::Unauthorized(_) => 401,
            Error::Validation(_) => 422,
            Error::Config(_) => 500,
            Error::Database(_) => 500,
            Error::Serialization(_) => 500,
            Error::Queue(_) => 500,
            Error::Other(_) => 500,
        }
    }

    /// Get the short machine-readable error code used as the wire `type`
    pub fn error_code(&self) -> &str {
        match self {
            Error::UnknownJob(_) => "unknown_job",
            Error::PermissionDenied(_) => "permission_denied",
            Error::InvalidPhase(_) => "invalid_phase_transition",
            Error::UnsupportedParameter(_) => "unsupported_parameter",
            Error::SyncTimeout(_) => "sync_timeout",
            Error::Task(error) => &error.error_code,
            Error::Unauthorized(_) => "unauthenticated",
            Error::Validation(_) => "value_error",
            Error::Config(_) => "config_error",
            Error::Database(_) => "database_error",
            Error::Serialization(_) => "serialization_error",
            Error::Queue(_) => "queue_error",
            Error::Other(_) => "internal_error",
        }
    }

    /// Serialize to the wire dictionary placed inside the `detail` list.
    ///
    /// Matches the payload shape of native request validation errors, with
    /// `loc` present only when a request location is known.
    pub fn to_wire(&self, location: Option<(ErrorLocation, &str)>) -> serde_json::Value {
        let mut error = serde_json::json!({
            "msg": self.to_string(),
            "type": self.error_code(),
        });
        if let Some((location, field)) = location {
            error["loc"] = serde_json::json!([location.as_str(), field]);
        }
        error
    }
}
