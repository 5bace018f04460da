//! Work queue submission and the dispatcher.
//!
//! The queue itself is an external system: the engine only submits work and
//! receives the callback messages handled by `crate::callbacks`. The Redis
//! transport here pushes JSON submissions onto a per-actor list and reads
//! worker events from a companion list; any transport that delivers the
//! same messages can replace it.

use std::sync::Arc;

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::callbacks::{FailureEnvelope, JobCallbackHandler};
use crate::models::{Job, JobResult};
use crate::{time, Error, Result};

/// One unit of work handed to the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSubmission {
    /// Identifier assigned by the queue client, echoed back in callbacks
    pub message_id: String,

    /// Name of the backend actor that should run the work
    pub actor: String,

    /// Job identifier, passed through to callbacks
    pub job_id: String,

    /// Serialized job parameters
    pub arguments: serde_json::Value,

    /// Execution time limit in milliseconds.
    ///
    /// When absent the queue's default limit applies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Opaque submission API of the external work queue.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Enqueue a submission and return its message identifier.
    async fn submit(&self, submission: JobSubmission) -> Result<String>;
}

/// Translates job records into work-queue submissions.
///
/// The dispatcher owns no state: it is a pure mapping from a job snapshot
/// to an enqueue side effect.
pub struct Dispatcher {
    queue: Arc<dyn WorkQueue>,
    actor: String,
}

impl Dispatcher {
    pub fn new(queue: Arc<dyn WorkQueue>, actor: impl Into<String>) -> Self {
        Self {
            queue,
            actor: actor.into(),
        }
    }

    /// Submit a job to the backend and return the message identifier.
    pub async fn dispatch<P: Serialize + Send + Sync>(&self, job: &Job<P>) -> Result<String> {
        let submission = JobSubmission {
            message_id: Uuid::new_v4().to_string(),
            actor: self.actor.clone(),
            job_id: job.job_id.clone(),
            arguments: serde_json::to_value(&job.parameters)?,
            timeout_ms: job.execution_duration.map(|seconds| seconds as u64 * 1000),
        };
        self.queue.submit(submission).await
    }
}

/// An event emitted by a worker, delivered back to the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkerEvent {
    Started {
        job_id: String,
        message_id: String,
        timestamp: String,
    },
    Completed {
        job_id: String,
        message_id: String,
        results: Vec<JobResult>,
    },
    Failed {
        job_id: String,
        message_id: String,
        error: FailureEnvelope,
    },
}

/// Work queue client backed by Redis lists.
pub struct RedisWorkQueue {
    conn: redis::aio::ConnectionManager,
}

impl RedisWorkQueue {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| Error::queue(format!("Invalid queue URL: {}", e)))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| Error::queue(format!("Cannot connect to queue: {}", e)))?;
        Ok(Self { conn })
    }

    fn submission_key(actor: &str) -> String {
        format!("uws:{}", actor)
    }

    fn event_key(actor: &str) -> String {
        format!("uws:{}:events", actor)
    }
}

#[async_trait]
impl WorkQueue for RedisWorkQueue {
    async fn submit(&self, submission: JobSubmission) -> Result<String> {
        let payload = serde_json::to_string(&submission)?;
        let mut conn = self.conn.clone();
        let () = conn
            .lpush(Self::submission_key(&submission.actor), payload)
            .await
            .map_err(|e| Error::queue(format!("Failed to enqueue job: {}", e)))?;
        Ok(submission.message_id)
    }
}

/// Consume worker events and feed them into the callback protocol.
///
/// Runs until the connection is closed; each malformed or failed event is
/// logged and skipped so one bad message cannot wedge the stream.
pub async fn run_event_consumer(
    queue_url: &str,
    actor: &str,
    handler: JobCallbackHandler,
) -> Result<()> {
    let client = redis::Client::open(queue_url)
        .map_err(|e| Error::queue(format!("Invalid queue URL: {}", e)))?;
    let mut conn = client
        .get_connection_manager()
        .await
        .map_err(|e| Error::queue(format!("Cannot connect to queue: {}", e)))?;
    let key = RedisWorkQueue::event_key(actor);
    info!(actor, "Consuming worker events");

    loop {
        let popped: Option<(String, String)> = conn
            .brpop(&key, 5.0)
            .await
            .map_err(|e| Error::queue(format!("Failed to read worker events: {}", e)))?;
        let Some((_, payload)) = popped else {
            continue;
        };
        let event: WorkerEvent = match serde_json::from_str(&payload) {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, "Discarding malformed worker event");
                continue;
            }
        };
        dispatch_event(&handler, event).await;
    }
}

async fn dispatch_event(handler: &JobCallbackHandler, event: WorkerEvent) {
    match event {
        WorkerEvent::Started {
            job_id,
            message_id,
            timestamp,
        } => {
            let timestamp = time::parse_isodatetime(&timestamp).unwrap_or_else(time::now);
            handler.job_started(&job_id, &message_id, timestamp).await;
        }
        WorkerEvent::Completed {
            job_id,
            message_id,
            results,
        } => {
            handler.job_completed(&job_id, &message_id, results).await;
        }
        WorkerEvent::Failed {
            job_id,
            message_id,
            error,
        } => {
            handler.job_failed(&job_id, &message_id, error).await;
        }
    }
}

/// A queue stub that records submissions for tests.
#[cfg(feature = "testing")]
pub struct RecordingWorkQueue {
    submissions: std::sync::Mutex<Vec<JobSubmission>>,
}

#[cfg(feature = "testing")]
impl RecordingWorkQueue {
    pub fn new() -> Self {
        Self {
            submissions: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// All submissions seen so far, in order.
    pub fn submissions(&self) -> Vec<JobSubmission> {
        self.submissions.lock().unwrap().clone()
    }
}

#[cfg(feature = "testing")]
impl Default for RecordingWorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "testing")]
#[async_trait]
impl WorkQueue for RecordingWorkQueue {
    async fn submit(&self, submission: JobSubmission) -> Result<String> {
        let message_id = submission.message_id.clone();
        self.submissions.lock().unwrap().push(submission);
        Ok(message_id)
    }
}
