//! Remote embedding / similarity service client
//!
//! The service does all the heavy lifting (embedding, projection, similarity
//! search). This module only submits a job, polls it to a terminal state and
//! fetches the results.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::{CacheError, ReferenceSource};
use crate::io::SimilarPayload;
use crate::types::{SimilarSequenceResult, UserProjection};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{endpoint} returned status {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("unexpected response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
    #[error("job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },
    #[error("gave up polling job {job_id} after {errors} consecutive errors")]
    PollingAborted { job_id: String, errors: u32 },
}

impl ApiError {
    pub fn decode(endpoint: &str, message: impl Into<String>) -> Self {
        Self::Decode {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }
}

/// Endpoint paths relative to the base URL; `{job}` is substituted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiEndpoints {
    pub submit: String,
    pub status: String,
    pub projection: String,
    pub similar: String,
    pub reference: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            submit: "/embed".into(),
            status: "/jobs/{job}".into(),
            projection: "/jobs/{job}/umap".into(),
            similar: "/jobs/{job}/similar".into(),
            reference: "/reference/umap.ndjson".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusReport {
    pub status: JobStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default, alias = "error")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    sequence: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

/// Async client for the remote service
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    endpoints: ApiEndpoints,
}

impl ApiClient {
    pub fn new(base_url: &str, endpoints: ApiEndpoints, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            endpoints,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str, job_id: Option<&str>) -> String {
        let path = match job_id {
            Some(job) => path.replace("{job}", job),
            None => path.to_string(),
        };
        format!("{}{}", self.base_url, path)
    }

    async fn checked(endpoint: &str, response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    async fn get_text(&self, url: &str) -> Result<String, ApiError> {
        log::debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        Ok(Self::checked(url, response).await?.text().await?)
    }

    /// Submit a FASTA payload for embedding; returns the job id
    pub async fn submit_sequence(&self, fasta: &str, model: &str) -> Result<String, ApiError> {
        let url = self.url(&self.endpoints.submit, None);
        log::info!("Submitting sequence ({} bytes) with model {}", fasta.len(), model);
        let response = self
            .client
            .post(&url)
            .json(&SubmitRequest { sequence: fasta, model })
            .send()
            .await?;
        let body: SubmitResponse = Self::checked(&url, response).await?.json().await?;
        log::info!("Job {} accepted", body.job_id);
        Ok(body.job_id)
    }

    pub async fn job_status(&self, job_id: &str) -> Result<JobStatusReport, ApiError> {
        let url = self.url(&self.endpoints.status, Some(job_id));
        let text = self.get_text(&url).await?;
        serde_json::from_str(&text).map_err(|e| ApiError::decode(&url, e.to_string()))
    }

    /// Projected coordinate of the submitted sequence
    pub async fn projection(&self, job_id: &str) -> Result<UserProjection, ApiError> {
        let url = self.url(&self.endpoints.projection, Some(job_id));
        let text = self.get_text(&url).await?;
        parse_projection(&text).map_err(|m| ApiError::decode(&url, m))
    }

    /// Ranked similarity hits, in the order the service returns them
    pub async fn similar(&self, job_id: &str, n: usize) -> Result<Vec<SimilarSequenceResult>, ApiError> {
        let url = format!("{}?n={}", self.url(&self.endpoints.similar, Some(job_id)), n);
        let text = self.get_text(&url).await?;
        let payload: SimilarPayload =
            serde_json::from_str(&text).map_err(|e| ApiError::decode(&url, e.to_string()))?;
        Ok(payload.into_results())
    }

    /// Raw newline-delimited reference stream
    pub async fn reference_bulk(&self) -> Result<String, ApiError> {
        let url = self.url(&self.endpoints.reference, None);
        log::info!("Fetching reference coordinates from {}", url);
        self.get_text(&url).await
    }
}

/// Accepts `{x, y}`, `{coordinates: [x, y]}` or a bare `[x, y]`
pub fn parse_projection(text: &str) -> Result<UserProjection, String> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Shape {
        Point(UserProjection),
        Wrapped { coordinates: [f64; 2] },
        Pair([f64; 2]),
    }

    match serde_json::from_str::<Shape>(text).map_err(|e| e.to_string())? {
        Shape::Point(p) => Ok(p),
        Shape::Wrapped { coordinates: [x, y] } | Shape::Pair([x, y]) => Ok(UserProjection { x, y }),
    }
}

/// Anything that can report a job's status; the HTTP client in production
pub trait JobStatusSource: Send + Sync {
    fn job_status(&self, job_id: &str) -> impl Future<Output = Result<JobStatusReport, ApiError>> + Send;
}

impl JobStatusSource for ApiClient {
    async fn job_status(&self, job_id: &str) -> Result<JobStatusReport, ApiError> {
        ApiClient::job_status(self, job_id).await
    }
}

/// Fixed-interval job poller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobPoller {
    pub interval: Duration,
    /// Consecutive request failures tolerated before giving up
    pub max_errors: u32,
}

impl Default for JobPoller {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_errors: 5,
        }
    }
}

impl JobPoller {
    /// Poll until the job completes. `on_update` sees every successful report.
    pub async fn wait<S, F>(&self, source: &S, job_id: &str, mut on_update: F) -> Result<JobStatusReport, ApiError>
    where
        S: JobStatusSource,
        F: FnMut(&JobStatusReport),
    {
        let mut errors = 0u32;
        loop {
            match source.job_status(job_id).await {
                Ok(report) => {
                    errors = 0;
                    on_update(&report);
                    match report.status {
                        JobStatus::Completed => {
                            log::info!("Job {} completed", job_id);
                            return Ok(report);
                        }
                        JobStatus::Failed => {
                            return Err(ApiError::JobFailed {
                                job_id: job_id.to_string(),
                                message: report.message.unwrap_or_else(|| "no reason given".into()),
                            });
                        }
                        status => log::debug!("Job {} is {:?}", job_id, status),
                    }
                }
                Err(e) => {
                    errors += 1;
                    log::warn!("Status check {} for job {} failed: {}", errors, job_id, e);
                    if errors >= self.max_errors {
                        return Err(ApiError::PollingAborted {
                            job_id: job_id.to_string(),
                            errors,
                        });
                    }
                }
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

/// Bulk reference endpoint as a cache source
#[derive(Debug, Clone)]
pub struct HttpReferenceSource {
    client: ApiClient,
}

impl HttpReferenceSource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

impl ReferenceSource for HttpReferenceSource {
    async fn fetch(&self) -> Result<String, CacheError> {
        self.client
            .reference_bulk()
            .await
            .map_err(|e| CacheError::Fetch(e.to_string()))
    }

    fn describe(&self) -> String {
        self.client.url(&self.client.endpoints.reference, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct Scripted {
        replies: Mutex<VecDeque<Result<JobStatus, ()>>>,
        calls: Mutex<usize>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<JobStatus, ()>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(0),
            }
        }
    }

    impl JobStatusSource for Scripted {
        async fn job_status(&self, _job_id: &str) -> Result<JobStatusReport, ApiError> {
            *self.calls.lock() += 1;
            let next = self.replies.lock().pop_front().unwrap_or(Ok(JobStatus::Processing));
            match next {
                Ok(status) => Ok(JobStatusReport {
                    status,
                    progress: None,
                    message: Some("boom".into()),
                }),
                Err(()) => Err(ApiError::decode("/jobs/x", "connection refused")),
            }
        }
    }

    fn poller() -> JobPoller {
        JobPoller {
            interval: Duration::from_millis(500),
            max_errors: 3,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_completion() {
        let source = Scripted::new(vec![
            Ok(JobStatus::Queued),
            Ok(JobStatus::Processing),
            Err(()),
            Ok(JobStatus::Completed),
        ]);
        let mut seen = Vec::new();
        let report = poller().wait(&source, "j1", |r| seen.push(r.status)).await.unwrap();
        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(seen, vec![JobStatus::Queued, JobStatus::Processing, JobStatus::Completed]);
        assert_eq!(*source.calls.lock(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_job_is_an_error() {
        let source = Scripted::new(vec![Ok(JobStatus::Processing), Ok(JobStatus::Failed)]);
        let err = poller().wait(&source, "j2", |_| {}).await.unwrap_err();
        assert!(matches!(err, ApiError::JobFailed { ref message, .. } if message == "boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_consecutive_errors() {
        let source = Scripted::new(vec![Err(()), Ok(JobStatus::Queued), Err(()), Err(()), Err(())]);
        let err = poller().wait(&source, "j3", |_| {}).await.unwrap_err();
        assert!(matches!(err, ApiError::PollingAborted { errors: 3, .. }));
        assert_eq!(*source.calls.lock(), 5);
    }

    #[test]
    fn status_report_accepts_unknown_states() {
        let r: JobStatusReport = serde_json::from_str(r#"{"status": "cancelled"}"#).unwrap();
        assert_eq!(r.status, JobStatus::Unknown);
        assert!(!r.status.is_terminal());
        let r: JobStatusReport =
            serde_json::from_str(r#"{"status": "failed", "error": "out of memory"}"#).unwrap();
        assert!(r.status.is_terminal());
        assert_eq!(r.message.as_deref(), Some("out of memory"));
    }

    #[test]
    fn projection_shapes() {
        assert_eq!(parse_projection(r#"{"x": 1.5, "y": -2}"#).unwrap(), UserProjection { x: 1.5, y: -2.0 });
        assert_eq!(parse_projection(r#"{"coordinates": [3, 4]}"#).unwrap(), UserProjection { x: 3.0, y: 4.0 });
        assert_eq!(parse_projection("[5, 6]").unwrap(), UserProjection { x: 5.0, y: 6.0 });
        assert!(parse_projection(r#"{"z": 1}"#).is_err());
    }

    #[test]
    fn urls_substitute_job_id() {
        let client = ApiClient::new("http://localhost:8000/", ApiEndpoints::default(), Duration::from_secs(5)).unwrap();
        assert_eq!(client.url(&client.endpoints.status, Some("abc")), "http://localhost:8000/jobs/abc");
        assert_eq!(
            HttpReferenceSource::new(client).describe(),
            "http://localhost:8000/reference/umap.ndjson"
        );
    }
}
