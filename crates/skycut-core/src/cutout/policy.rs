//! UWS policy layer for image cutouts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::parameters::CutoutParameters;
use super::stencils::Stencil;
use crate::models::Job;
use crate::policy::Policy;
use crate::queue::Dispatcher;
use crate::{Error, Result};

/// Policy layer for dispatching and approving changes to cutout jobs.
///
/// For now, rejects all changes to destruction and execution duration by
/// returning their current values.
pub struct CutoutPolicy {
    dispatcher: Dispatcher,
}

impl CutoutPolicy {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl Policy<CutoutParameters> for CutoutPolicy {
    fn validate_params(&self, params: &CutoutParameters) -> Result<()> {
        // For now, only support a single ID and stencil.
        if params.ids.len() != 1 {
            return Err(Error::unsupported_parameter("Only one ID supported"));
        }
        if params.stencils.len() != 1 {
            return Err(Error::unsupported_parameter("Only one stencil is supported"));
        }

        // For now, range stencils are not supported.
        if matches!(params.stencils[0], Stencil::Range { .. }) {
            return Err(Error::unsupported_parameter(
                "Range stencils are not supported",
            ));
        }

        Ok(())
    }

    fn validate_destruction(
        &self,
        _requested: DateTime<Utc>,
        job: &Job<CutoutParameters>,
    ) -> DateTime<Utc> {
        job.destruction_time
    }

    fn validate_execution_duration(
        &self,
        requested: i64,
        job: &Job<CutoutParameters>,
    ) -> i64 {
        job.execution_duration.unwrap_or(requested)
    }

    async fn dispatch(&self, job: &Job<CutoutParameters>) -> Result<String> {
        self.dispatcher.dispatch(job).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::super::stencils::{Point, Range};
    use super::*;
    use crate::queue::RecordingWorkQueue;

    fn policy() -> CutoutPolicy {
        let queue = Arc::new(RecordingWorkQueue::new());
        CutoutPolicy::new(Dispatcher::new(queue, "cutout"))
    }

    fn circle() -> Stencil {
        Stencil::Circle {
            center: Point { ra: 0.0, dec: -2.0 },
            radius: 2.0,
        }
    }

    #[test]
    fn test_single_id_and_stencil_accepted() {
        let params: CutoutParameters = serde_json::from_value(json!({
            "ids": ["1:2:band:value"],
            "stencils": [{
                "type": "circle",
                "center": {"ra": 0.0, "dec": -2.0},
                "radius": 2.0,
            }],
        }))
        .unwrap();
        assert!(policy().validate_params(&params).is_ok());
    }

    #[test]
    fn test_multiple_ids_rejected() {
        let params = CutoutParameters {
            ids: vec!["a".to_string(), "b".to_string()],
            stencils: vec![circle()],
        };
        let error = policy().validate_params(&params).unwrap_err();
        assert_eq!(error.error_code(), "unsupported_parameter");
    }

    #[test]
    fn test_multiple_stencils_rejected() {
        let params = CutoutParameters {
            ids: vec!["a".to_string()],
            stencils: vec![circle(), circle()],
        };
        assert!(policy().validate_params(&params).is_err());
    }

    #[test]
    fn test_range_stencil_rejected() {
        let params = CutoutParameters {
            ids: vec!["a".to_string()],
            stencils: vec![Stencil::Range {
                ra: Range { min: 0.0, max: 360.0 },
                dec: Range { min: -2.0, max: 2.0 },
            }],
        };
        let error = policy().validate_params(&params).unwrap_err();
        assert_eq!(error.error_code(), "unsupported_parameter");
    }
}
