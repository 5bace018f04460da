use std::sync::Arc;

use skycut_core::cutout::CutoutParameters;
use skycut_core::JobService;

#[derive(Clone)]
pub struct AppState {
    pub job_service: Arc<JobService<CutoutParameters>>,
}

impl AppState {
    pub fn new(job_service: Arc<JobService<CutoutParameters>>) -> Self {
        Self { job_service }
    }
}
