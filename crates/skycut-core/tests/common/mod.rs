//! Shared fixtures for the UWS engine tests.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use skycut_core::config::{SigningConfig, UwsConfig};
use skycut_core::models::Job;
use skycut_core::policy::Policy;
use skycut_core::queue::{Dispatcher, RecordingWorkQueue};
use skycut_core::signing::HmacUrlSigner;
use skycut_core::storage::MemoryJobStore;
use skycut_core::{JobService, Result};

/// Minimal parameter shape used by the engine tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrivialParameters {
    pub id: String,
}

impl TrivialParameters {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

/// Policy that accepts everything and dispatches to the recording queue.
pub struct TrivialPolicy {
    dispatcher: Dispatcher,
}

impl TrivialPolicy {
    pub fn new(queue: Arc<RecordingWorkQueue>) -> Self {
        Self {
            dispatcher: Dispatcher::new(queue, "trivial"),
        }
    }
}

#[async_trait]
impl Policy<TrivialParameters> for TrivialPolicy {
    fn validate_params(&self, _params: &TrivialParameters) -> Result<()> {
        Ok(())
    }

    fn validate_destruction(
        &self,
        requested: DateTime<Utc>,
        _job: &Job<TrivialParameters>,
    ) -> DateTime<Utc> {
        requested
    }

    fn validate_execution_duration(
        &self,
        requested: i64,
        _job: &Job<TrivialParameters>,
    ) -> i64 {
        requested
    }

    async fn dispatch(&self, job: &Job<TrivialParameters>) -> Result<String> {
        self.dispatcher.dispatch(job).await
    }
}

/// Policy that refuses all changes by returning the job's current values.
pub struct FrozenPolicy {
    dispatcher: Dispatcher,
}

impl FrozenPolicy {
    pub fn new(queue: Arc<RecordingWorkQueue>) -> Self {
        Self {
            dispatcher: Dispatcher::new(queue, "trivial"),
        }
    }
}

#[async_trait]
impl Policy<TrivialParameters> for FrozenPolicy {
    fn validate_params(&self, _params: &TrivialParameters) -> Result<()> {
        Ok(())
    }

    fn validate_destruction(
        &self,
        _requested: DateTime<Utc>,
        job: &Job<TrivialParameters>,
    ) -> DateTime<Utc> {
        job.destruction_time
    }

    fn validate_execution_duration(
        &self,
        requested: i64,
        job: &Job<TrivialParameters>,
    ) -> i64 {
        job.execution_duration.unwrap_or(requested)
    }

    async fn dispatch(&self, job: &Job<TrivialParameters>) -> Result<String> {
        self.dispatcher.dispatch(job).await
    }
}

/// Everything a service test needs, wired over the in-memory store.
pub struct Harness {
    pub store: Arc<MemoryJobStore<TrivialParameters>>,
    pub queue: Arc<RecordingWorkQueue>,
    pub service: JobService<TrivialParameters>,
}

pub fn uws_config() -> UwsConfig {
    UwsConfig {
        execution_duration: Some(600),
        lifetime: 24 * 60 * 60,
        wait_timeout: 1,
        sync_timeout: 2,
    }
}

pub fn signer() -> HmacUrlSigner {
    HmacUrlSigner::new(&SigningConfig {
        base_url: "https://example.com".to_string(),
        service_account: "signer@example.com".to_string(),
        secret: "squeamish ossifrage".to_string(),
        url_lifetime: 15 * 60,
    })
}

pub fn harness(config: UwsConfig) -> Harness {
    let store = Arc::new(MemoryJobStore::new());
    let queue = Arc::new(RecordingWorkQueue::new());
    let policy = Arc::new(TrivialPolicy::new(queue.clone()));
    let service = JobService::new(config, policy, store.clone(), Arc::new(signer()));
    Harness {
        store,
        queue,
        service,
    }
}

pub fn frozen_harness(config: UwsConfig) -> Harness {
    let store = Arc::new(MemoryJobStore::new());
    let queue = Arc::new(RecordingWorkQueue::new());
    let policy = Arc::new(FrozenPolicy::new(queue.clone()));
    let service = JobService::new(config, policy, store.clone(), Arc::new(signer()));
    Harness {
        store,
        queue,
        service,
    }
}
