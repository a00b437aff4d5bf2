//! Job service clients.
//!
//! `JobApi` is the seam between orchestration and transport. `HttpJobApi`
//! talks to a geoprocessing REST endpoint with reqwest; tests use
//! [`ScriptedJobApi`](crate::scripted::ScriptedJobApi).

use std::future::Future;
use std::pin::Pin;

use foundation::SpatialReference;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ApiError;
use crate::protocol::{JobInfo, ParameterValue, SubmitParameters};

/// Type alias for a boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for asynchronous job services.
///
/// Implementations must be `Send + Sync` for use across async tasks.
/// Methods return boxed futures for dyn-compatibility.
pub trait JobApi: Send + Sync {
    /// Submits a job and returns its id and initial status.
    fn submit_job<'a>(
        &'a self,
        params: &'a SubmitParameters,
    ) -> BoxFuture<'a, Result<JobInfo, ApiError>>;

    /// Fetches the current status and messages of a job.
    fn job_status<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<JobInfo, ApiError>>;

    /// Fetches a named output parameter of a finished job.
    fn result_data<'a>(
        &'a self,
        job_id: &'a str,
        param_name: &'a str,
        out_sr: Option<SpatialReference>,
    ) -> BoxFuture<'a, Result<ParameterValue, ApiError>>;
}

/// Job service reached over HTTP.
pub struct HttpJobApi {
    service_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpJobApi {
    pub fn new(service_url: impl Into<String>) -> Self {
        Self {
            service_url: service_url.into(),
            token: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.service_url.trim_end_matches('/'), path)
    }

    fn base_query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("f", "json".to_string())];
        if let Some(token) = &self.token {
            query.push(("token", token.clone()));
        }
        query
    }

    async fn fetch<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, ApiError> {
        let resp = request
            .send()
            .await
            .map_err(|e| ApiError::with_source("RequestError", "HTTP request failed", e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::new("HttpError", format!("HTTP error: {status}")));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ApiError::with_source("RequestError", "Failed to read response", e))?;
        decode_response(&bytes)
    }
}

impl JobApi for HttpJobApi {
    fn submit_job<'a>(
        &'a self,
        params: &'a SubmitParameters,
    ) -> BoxFuture<'a, Result<JobInfo, ApiError>> {
        Box::pin(async move {
            let url = self.endpoint("submitJob");
            let mut form = self.base_query();
            form.extend(params.pairs().iter().cloned());
            debug!(%url, "submitting job");
            self.fetch(self.client.post(&url).form(&form)).await
        })
    }

    fn job_status<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<JobInfo, ApiError>> {
        Box::pin(async move {
            let url = self.endpoint(&format!("jobs/{job_id}"));
            self.fetch(self.client.get(&url).query(&self.base_query())).await
        })
    }

    fn result_data<'a>(
        &'a self,
        job_id: &'a str,
        param_name: &'a str,
        out_sr: Option<SpatialReference>,
    ) -> BoxFuture<'a, Result<ParameterValue, ApiError>> {
        Box::pin(async move {
            let url = self.endpoint(&format!("jobs/{job_id}/results/{param_name}"));
            let mut query = self.base_query();
            query.push(("returnZ", "false".to_string()));
            if let Some(sr) = out_sr {
                query.push(("outSR", sr.wkid.to_string()));
            }
            self.fetch(self.client.get(&url).query(&query)).await
        })
    }
}

/// Decodes a service response body.
///
/// The service reports failures as HTTP 200 with an `{"error": {...}}`
/// envelope; those become `ServiceError`s carrying the message and details.
pub fn decode_response<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::with_source("ParseError", "Response is not valid JSON", e))?;

    if let Some(error) = value.get("error") {
        let mut message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown service error")
            .to_string();
        let details: Vec<&str> = error
            .get("details")
            .and_then(|d| d.as_array())
            .map(|d| d.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();
        if !details.is_empty() {
            message = format!("{message} ({})", details.join("; "));
        }
        if let Some(code) = error.get("code").and_then(|c| c.as_i64()) {
            message = format!("{message} [code {code}]");
        }
        return Err(ApiError::new("ServiceError", message));
    }

    serde_json::from_value(value)
        .map_err(|e| ApiError::with_source("ParseError", "Unexpected response shape", e))
}
