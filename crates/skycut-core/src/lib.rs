//! Core library for skycut, an IVOA SODA image-cutout service.
//!
//! The heart of this crate is a reusable UWS (Universal Worker Service)
//! job lifecycle engine: a durable job state machine over PostgreSQL, a
//! dispatcher onto an external work queue, a callback protocol that feeds
//! worker results back into the state machine, and a service layer with
//! long-polling and a synchronous facade. The cutout-specific parameter
//! shape and policy live in `cutout` and are injected into the engine.

pub mod callbacks;
pub mod config;
pub mod cutout;
pub mod db;
pub mod error;
pub mod models;
pub mod policy;
pub mod queue;
pub mod service;
pub mod signing;
pub mod storage;
pub mod time;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, ErrorLocation, Result};
pub use models::{
    Availability, ExecutionPhase, Job, JobDescription, JobError, JobResult, JobUpdate,
    ACTIVE_PHASES,
};
pub use service::JobService;

/// Current version of skycut
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
