//! Submit → poll → fetch-result protocol for one job at a time.
//!
//! The orchestrator drives a job through its lifecycle:
//! - `submit` validates the request and creates the server job
//! - `wait_for_completion` polls on a fixed interval, reporting every tick
//! - `fetch_result` retrieves the output feature after `Succeeded`
//!
//! There is no server-side cancel. A caller that loses interest returns
//! `ControlFlow::Break` from the status callback and polling stops; the
//! server job itself runs to its own end.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use foundation::SpatialReference;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::client::JobApi;
use crate::error::JobError;
use crate::protocol::{
    AnalysisRequest, JobInfo, JobStatus, SubmitParameters, VIEWSHED_OUTPUT, ViewshedFeature,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// How polling ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Succeeded(JobInfo),
    /// The caller stopped consuming status updates.
    Abandoned { job_id: String, last_status: JobStatus },
}

/// End result of [`JobOrchestrator::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Succeeded { job_id: String, feature: ViewshedFeature },
    Abandoned { job_id: String, last_status: JobStatus },
}

/// Runs viewshed jobs against a [`JobApi`].
///
/// Jobs are independent of each other; [`status`](Self::status) reflects
/// whichever job reported last.
pub struct JobOrchestrator {
    api: Arc<dyn JobApi>,
    poll_interval: Duration,
    status: Mutex<JobStatus>,
}

impl JobOrchestrator {
    pub fn new(api: Arc<dyn JobApi>) -> Self {
        Self {
            api,
            poll_interval: DEFAULT_POLL_INTERVAL,
            status: Mutex::new(JobStatus::None),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Status of the most recent job, `None` before any submission.
    pub fn status(&self) -> JobStatus {
        *self.status.lock()
    }

    fn set_status(&self, status: JobStatus) {
        *self.status.lock() = status;
    }

    /// Submits the request as a new server job.
    pub async fn submit(&self, request: &AnalysisRequest) -> Result<JobInfo, JobError> {
        self.set_status(JobStatus::None);
        request.validate().map_err(|message| JobError::Submission {
            name: "ValidationError".to_string(),
            message,
        })?;

        let params = SubmitParameters::viewshed(request);
        let job = self
            .api
            .submit_job(&params)
            .await
            .map_err(JobError::submission)?;

        // The service may answer with any pre-execution status; anything
        // other than New/Submitted is recorded as reported.
        self.set_status(job.status);
        info!(job_id = %job.job_id, status = %job.status, "viewshed job submitted");
        Ok(job)
    }

    /// Polls `job` every interval until it reaches a terminal status.
    ///
    /// `on_status` sees every tick, including the terminal one; no tick is
    /// reported after that. Unsuccessful terminal statuses become
    /// [`JobError::Terminal`] carrying the service messages. A `Break` from
    /// `on_status` wins over whatever status the tick carried.
    pub async fn wait_for_completion<F>(
        &self,
        job: &JobInfo,
        mut on_status: F,
    ) -> Result<Completion, JobError>
    where
        F: FnMut(&JobInfo) -> ControlFlow<()> + Send,
    {
        let job_id = job.job_id.clone();
        loop {
            tokio::time::sleep(self.poll_interval).await;

            let info = self
                .api
                .job_status(&job_id)
                .await
                .map_err(|e| {
                    warn!(job_id = %job_id, error = %e, "status poll failed");
                    JobError::Status {
                        job_id: job_id.clone(),
                        name: e.name,
                        message: e.message,
                    }
                })?;
            self.set_status(info.status);
            debug!(job_id = %job_id, status = %info.status, "job status");

            if on_status(&info).is_break() {
                debug!(job_id = %job_id, status = %info.status, "status consumer gone; polling stopped");
                return Ok(Completion::Abandoned {
                    job_id,
                    last_status: info.status,
                });
            }
            if info.status == JobStatus::Succeeded {
                info!(job_id = %job_id, "viewshed job succeeded");
                return Ok(Completion::Succeeded(info));
            }
            if info.status.is_terminal() {
                warn!(
                    job_id = %job_id,
                    status = %info.status,
                    messages = info.messages.len(),
                    "viewshed job ended without a result"
                );
                return Err(JobError::Terminal {
                    job_id,
                    status: info.status,
                    messages: info.messages,
                });
            }
        }
    }

    /// Retrieves the single output feature of a succeeded job.
    ///
    /// Failures here never change the recorded status.
    pub async fn fetch_result(
        &self,
        job_id: &str,
        out_sr: SpatialReference,
    ) -> Result<ViewshedFeature, JobError> {
        let fetch_error = |name: &str, message: String| {
            warn!(job_id = %job_id, %name, %message, "viewshed result fetch failed");
            JobError::ResultFetch {
                job_id: job_id.to_string(),
                name: name.to_string(),
                message,
            }
        };

        let value = self
            .api
            .result_data(job_id, VIEWSHED_OUTPUT, Some(out_sr))
            .await
            .map_err(|e| fetch_error(&e.name, e.message))?;

        let Some(first) = value.value.features.first() else {
            return Err(fetch_error(
                "ResultError",
                format!("{VIEWSHED_OUTPUT} contained no features"),
            ));
        };
        if value.value.features.len() > 1 {
            debug!(
                job_id = %job_id,
                count = value.value.features.len(),
                "output had several features; using the first"
            );
        }
        ViewshedFeature::from_wire(first, value.value.spatial_reference, out_sr)
            .map_err(|message| fetch_error("ResultError", message))
    }

    /// Runs the whole protocol for one request.
    pub async fn run<F>(&self, request: &AnalysisRequest, on_status: F) -> Result<JobOutcome, JobError>
    where
        F: FnMut(&JobInfo) -> ControlFlow<()> + Send,
    {
        let job = self.submit(request).await?;
        match self.wait_for_completion(&job, on_status).await? {
            Completion::Succeeded(info) => {
                let feature = self
                    .fetch_result(&info.job_id, request.location.spatial_reference)
                    .await?;
                Ok(JobOutcome::Succeeded {
                    job_id: info.job_id,
                    feature,
                })
            }
            Completion::Abandoned {
                job_id,
                last_status,
            } => Ok(JobOutcome::Abandoned {
                job_id,
                last_status,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::ops::ControlFlow;
    use std::sync::Arc;

    use foundation::{Point, SpatialReference};
    use pretty_assertions::assert_eq;

    use super::{Completion, JobOrchestrator, JobOutcome};
    use crate::error::JobError;
    use crate::protocol::{
        AnalysisRequest, DemResolution, JobMessage, JobStatus, ParameterValue, VIEWSHED_OUTPUT,
    };
    use crate::scripted::ScriptedJobApi;

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            location: Point::new(0.0, 0.0, SpatialReference::WEB_MERCATOR),
            max_distance: 5000.0,
            dem_resolution: DemResolution::Finest,
            observer_height: 2.0,
            surface_offset: 0.0,
        }
    }

    fn viewshed_value() -> ParameterValue {
        serde_json::from_str(
            r#"{"paramName":"OutputViewshed","value":{"spatialReference":{"wkid":102100},
                "features":[{"geometry":{"rings":[[[0,0],[0,5],[5,5],[0,0]]]},
                "attributes":{"ProductName":"SRTM","DEMResolution":"90m"}}]}}"#,
        )
        .unwrap()
    }

    fn orchestrator(api: &Arc<ScriptedJobApi>) -> JobOrchestrator {
        JobOrchestrator::new(api.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn success_reports_every_tick_then_fetches_result() {
        let api = Arc::new(
            ScriptedJobApi::new()
                .poll(JobStatus::New)
                .poll(JobStatus::Executing)
                .poll(JobStatus::Succeeded)
                .result(viewshed_value()),
        );
        let orch = orchestrator(&api);
        let mut seen = Vec::new();

        let started = tokio::time::Instant::now();
        let outcome = orch
            .run(&request(), |info| {
                seen.push(info.status);
                ControlFlow::Continue(())
            })
            .await
            .unwrap();

        assert_eq!(
            seen,
            vec![JobStatus::New, JobStatus::Executing, JobStatus::Succeeded]
        );
        assert_eq!(started.elapsed().as_millis(), 6000);
        let JobOutcome::Succeeded { job_id, feature } = outcome else {
            panic!("expected success");
        };
        assert_eq!(job_id, "job-1");
        assert_eq!(feature.attributes.product_name.as_deref(), Some("SRTM"));
        assert_eq!(orch.status(), JobStatus::Succeeded);
        assert_eq!(
            api.result_requests(),
            vec![(
                "job-1".to_string(),
                VIEWSHED_OUTPUT.to_string(),
                Some(SpatialReference::WEB_MERCATOR)
            )]
        );
        assert_eq!(api.submissions()[0].get("MaximumDistance"), Some("5000"));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_surfaces_messages_and_stops_polling() {
        let api = Arc::new(
            ScriptedJobApi::new()
                .poll(JobStatus::Executing)
                .poll_with_messages(JobStatus::Failed, vec![JobMessage::error("DEM unavailable")]),
        );
        let orch = orchestrator(&api);
        let mut ticks = 0;

        let err = orch
            .run(&request(), |_| {
                ticks += 1;
                ControlFlow::Continue(())
            })
            .await
            .unwrap_err();

        assert_eq!(
            err,
            JobError::Terminal {
                job_id: "job-1".into(),
                status: JobStatus::Failed,
                messages: vec![JobMessage::error("DEM unavailable")],
            }
        );
        assert_eq!(ticks, 2);
        assert_eq!(api.poll_count(), 2);
        assert!(api.result_requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_statuses_keep_polling() {
        let api = Arc::new(
            ScriptedJobApi::new()
                .poll(JobStatus::Cancelling)
                .poll(JobStatus::Deleting)
                .poll(JobStatus::Cancelled),
        );
        let orch = orchestrator(&api);
        let mut seen = Vec::new();
        let err = orch
            .run(&request(), |info| {
                seen.push(info.status);
                ControlFlow::Continue(())
            })
            .await
            .unwrap_err();
        assert_eq!(
            seen,
            vec![JobStatus::Cancelling, JobStatus::Deleting, JobStatus::Cancelled]
        );
        assert!(matches!(err, JobError::Terminal { status: JobStatus::Cancelled, .. }));
    }

    #[tokio::test]
    async fn submission_failure_creates_no_job() {
        let api = Arc::new(ScriptedJobApi::new().reject_submit("RequestError", "offline"));
        let orch = orchestrator(&api);
        let err = orch
            .run(&request(), |_| ControlFlow::Continue(()))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            JobError::Submission {
                name: "RequestError".into(),
                message: "offline".into()
            }
        );
        assert_eq!(api.poll_count(), 0);
        assert_eq!(orch.status(), JobStatus::None);
    }

    #[tokio::test]
    async fn invalid_request_is_rejected_before_submitting() {
        let api = Arc::new(ScriptedJobApi::new());
        let orch = orchestrator(&api);
        let mut req = request();
        req.max_distance = -1.0;
        let err = orch.submit(&req).await.unwrap_err();
        assert!(matches!(err, JobError::Submission { ref name, .. } if name == "ValidationError"));
        assert!(api.submissions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn result_fetch_failure_keeps_succeeded_status() {
        let api = Arc::new(
            ScriptedJobApi::new()
                .poll(JobStatus::Succeeded)
                .result_failure("ServiceError", "Invalid URL"),
        );
        let orch = orchestrator(&api);
        let err = orch
            .run(&request(), |_| ControlFlow::Continue(()))
            .await
            .unwrap_err();
        assert_eq!(
            err.messages(),
            vec![JobMessage::new("ServiceError", "Invalid URL")]
        );
        assert!(matches!(err, JobError::ResultFetch { .. }));
        assert_eq!(orch.status(), JobStatus::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_output_is_a_result_fetch_error() {
        let api = Arc::new(ScriptedJobApi::new().poll(JobStatus::Succeeded));
        let orch = orchestrator(&api);
        let err = orch
            .run(&request(), |_| ControlFlow::Continue(()))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::ResultFetch { ref name, .. } if name == "ResultError"));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_transport_failure_is_not_retried() {
        let api = Arc::new(
            ScriptedJobApi::new()
                .poll(JobStatus::Executing)
                .poll_failure("RequestError", "connection reset")
                .poll(JobStatus::Succeeded),
        );
        let orch = orchestrator(&api);
        let err = orch
            .run(&request(), |_| ControlFlow::Continue(()))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Status { .. }));
        assert_eq!(api.poll_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn breaking_the_callback_abandons_polling() {
        let api = Arc::new(ScriptedJobApi::new().poll(JobStatus::Executing));
        let orch = orchestrator(&api);
        let job = orch.submit(&request()).await.unwrap();

        let mut ticks = 0;
        let completion = orch
            .wait_for_completion(&job, |_| {
                ticks += 1;
                if ticks == 3 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .await
            .unwrap();

        assert_eq!(
            completion,
            Completion::Abandoned {
                job_id: "job-1".into(),
                last_status: JobStatus::Executing
            }
        );
        assert_eq!(api.poll_count(), 3);
    }
}
