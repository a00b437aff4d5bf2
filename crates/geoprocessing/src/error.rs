use crate::protocol::{JobMessage, JobStatus};

/// Failure of a single call against the job service.
#[derive(Debug)]
pub struct ApiError {
    /// Short error class, e.g. `"RequestError"` or `"ServiceError"`.
    pub name: String,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ApiError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        name: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

/// Why one analysis attempt did not produce a viewshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// Submit was rejected (validation or transport); no job exists.
    Submission { name: String, message: String },
    /// A status poll call itself failed.
    Status {
        job_id: String,
        name: String,
        message: String,
    },
    /// The service reported a terminal, unsuccessful status.
    Terminal {
        job_id: String,
        status: JobStatus,
        messages: Vec<JobMessage>,
    },
    /// The job succeeded but its output could not be retrieved.
    ResultFetch {
        job_id: String,
        name: String,
        message: String,
    },
}

impl JobError {
    pub(crate) fn submission(err: ApiError) -> Self {
        JobError::Submission {
            name: err.name,
            message: err.message,
        }
    }

    /// Normalizes every variant into the display message list.
    pub fn messages(&self) -> Vec<JobMessage> {
        match self {
            JobError::Submission { name, message }
            | JobError::Status { name, message, .. }
            | JobError::ResultFetch { name, message, .. } => {
                vec![JobMessage::new(name.clone(), message.clone())]
            }
            JobError::Terminal { messages, .. } => messages.clone(),
        }
    }
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobError::Submission { name, message } => {
                write!(f, "job submission failed: {name}: {message}")
            }
            JobError::Status {
                job_id,
                name,
                message,
            } => write!(f, "status poll for job {job_id} failed: {name}: {message}"),
            JobError::Terminal {
                job_id,
                status,
                messages,
            } => write!(
                f,
                "job {job_id} ended {status} with {} message(s)",
                messages.len()
            ),
            JobError::ResultFetch {
                job_id,
                name,
                message,
            } => write!(f, "result fetch for job {job_id} failed: {name}: {message}"),
        }
    }
}

impl std::error::Error for JobError {}

#[cfg(test)]
mod tests {
    use super::{ApiError, JobError};
    use crate::protocol::{JobMessage, JobStatus};

    #[test]
    fn every_variant_normalizes_to_messages() {
        let submission = JobError::submission(ApiError::new("RequestError", "connection refused"));
        assert_eq!(
            submission.messages(),
            vec![JobMessage::new("RequestError", "connection refused")]
        );

        let terminal = JobError::Terminal {
            job_id: "j1".into(),
            status: JobStatus::Failed,
            messages: vec![JobMessage::error("DEM unavailable")],
        };
        assert_eq!(terminal.messages(), vec![JobMessage::error("DEM unavailable")]);

        let fetch = JobError::ResultFetch {
            job_id: "j1".into(),
            name: "ServiceError".into(),
            message: "Invalid URL".into(),
        };
        assert_eq!(fetch.messages()[0].kind, "ServiceError");
    }

    #[test]
    fn api_error_exposes_its_source() {
        let io = std::io::Error::other("reset");
        let err = ApiError::with_source("RequestError", "request failed", io);
        assert_eq!(err.to_string(), "RequestError: request failed");
        assert!(std::error::Error::source(&err).is_some());
    }
}
