use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use foundation::SpatialReference;
use parking_lot::Mutex;

use crate::client::{BoxFuture, JobApi};
use crate::error::ApiError;
use crate::protocol::{JobInfo, JobMessage, JobStatus, ParameterValue, SubmitParameters};

/// One scripted response to a status poll.
#[derive(Debug, Clone)]
pub enum PollStep {
    Status(JobStatus, Vec<JobMessage>),
    Fail { name: String, message: String },
}

#[derive(Debug, Clone)]
enum Scripted<T> {
    Ok(T),
    Fail { name: String, message: String },
}

impl<T: Clone> Scripted<T> {
    fn get(&self) -> Result<T, ApiError> {
        match self {
            Scripted::Ok(v) => Ok(v.clone()),
            Scripted::Fail { name, message } => Err(ApiError::new(name.clone(), message.clone())),
        }
    }
}

/// In-memory job service for tests and offline runs.
///
/// Every accepted submission gets a fresh id (`job-1`, `job-2`, ...) and
/// replays the poll script from the start. Polls past the end of the script
/// repeat its last step.
pub struct ScriptedJobApi {
    submit: Scripted<()>,
    polls: Vec<PollStep>,
    result: Scripted<ParameterValue>,
    jobs_created: AtomicUsize,
    cursors: Mutex<HashMap<String, usize>>,
    submitted: Mutex<Vec<SubmitParameters>>,
    result_requests: Mutex<Vec<(String, String, Option<SpatialReference>)>>,
}

impl ScriptedJobApi {
    pub fn new() -> Self {
        Self {
            submit: Scripted::Ok(()),
            polls: Vec::new(),
            result: Scripted::Ok(ParameterValue {
                param_name: String::new(),
                data_type: String::new(),
                value: Default::default(),
            }),
            jobs_created: AtomicUsize::new(0),
            cursors: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            result_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn reject_submit(mut self, name: impl Into<String>, message: impl Into<String>) -> Self {
        self.submit = Scripted::Fail {
            name: name.into(),
            message: message.into(),
        };
        self
    }

    pub fn poll(self, status: JobStatus) -> Self {
        self.poll_with_messages(status, Vec::new())
    }

    pub fn poll_with_messages(mut self, status: JobStatus, messages: Vec<JobMessage>) -> Self {
        self.polls.push(PollStep::Status(status, messages));
        self
    }

    pub fn poll_failure(mut self, name: impl Into<String>, message: impl Into<String>) -> Self {
        self.polls.push(PollStep::Fail {
            name: name.into(),
            message: message.into(),
        });
        self
    }

    pub fn result(mut self, value: ParameterValue) -> Self {
        self.result = Scripted::Ok(value);
        self
    }

    pub fn result_failure(mut self, name: impl Into<String>, message: impl Into<String>) -> Self {
        self.result = Scripted::Fail {
            name: name.into(),
            message: message.into(),
        };
        self
    }

    /// Parameters of every submission, accepted or not.
    pub fn submissions(&self) -> Vec<SubmitParameters> {
        self.submitted.lock().clone()
    }

    /// Total status polls answered across all jobs.
    pub fn poll_count(&self) -> usize {
        self.cursors.lock().values().sum()
    }

    pub fn result_requests(&self) -> Vec<(String, String, Option<SpatialReference>)> {
        self.result_requests.lock().clone()
    }

    fn next_step(&self, job_id: &str) -> Result<JobInfo, ApiError> {
        let mut cursors = self.cursors.lock();
        let Some(cursor) = cursors.get_mut(job_id) else {
            return Err(ApiError::new("ServiceError", format!("Job {job_id} not found")));
        };
        let index = (*cursor).min(self.polls.len().saturating_sub(1));
        *cursor += 1;
        match self.polls.get(index) {
            Some(PollStep::Status(status, messages)) => {
                Ok(JobInfo::new(job_id, *status).with_messages(messages.clone()))
            }
            Some(PollStep::Fail { name, message }) => {
                Err(ApiError::new(name.clone(), message.clone()))
            }
            None => Ok(JobInfo::new(job_id, JobStatus::Submitted)),
        }
    }
}

impl Default for ScriptedJobApi {
    fn default() -> Self {
        Self::new()
    }
}

impl JobApi for ScriptedJobApi {
    fn submit_job<'a>(
        &'a self,
        params: &'a SubmitParameters,
    ) -> BoxFuture<'a, Result<JobInfo, ApiError>> {
        Box::pin(async move {
            self.submitted.lock().push(params.clone());
            self.submit.get()?;
            let n = self.jobs_created.fetch_add(1, Ordering::Relaxed) + 1;
            let job_id = format!("job-{n}");
            self.cursors.lock().insert(job_id.clone(), 0);
            Ok(JobInfo::new(job_id, JobStatus::Submitted))
        })
    }

    fn job_status<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<JobInfo, ApiError>> {
        Box::pin(async move { self.next_step(job_id) })
    }

    fn result_data<'a>(
        &'a self,
        job_id: &'a str,
        param_name: &'a str,
        out_sr: Option<SpatialReference>,
    ) -> BoxFuture<'a, Result<ParameterValue, ApiError>> {
        Box::pin(async move {
            self.result_requests
                .lock()
                .push((job_id.to_string(), param_name.to_string(), out_sr));
            self.result.get()
        })
    }
}
