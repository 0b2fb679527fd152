use async_trait::async_trait;
use serde::Deserialize;

use super::{JobSpec, JobState, ServiceError, TranscriptionService};

/// HTTP client for the transcription gateway.
///
/// REST surface consumed:
/// - `POST   {base}/jobs`        — create (body = [`JobSpec`] as JSON)
/// - `GET    {base}/jobs/{name}` — status
/// - `DELETE {base}/jobs/{name}` — delete
///
/// The gateway answers 404 — or 400, which it uses interchangeably — for
/// an unknown job name; both map to [`ServiceError::NotFound`].
///
/// # Sharing across workers
/// `TranscribeClient` implements `Clone` — `reqwest::Client` is an `Arc`
/// around a connection pool, so the client is constructed once in
/// `app::run` and cloned cheaply into each worker.
#[derive(Clone)]
pub struct TranscribeClient {
    http: reqwest::Client,
    base_url: String,
}

/// Status document returned by `GET /jobs/{name}`.
#[derive(Debug, Deserialize)]
struct JobStatusBody {
    status: JobState,
}

impl TranscribeClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn job_url(&self, name: &str) -> String {
        format!("{}/jobs/{name}", self.base_url)
    }

    /// Map a non-success response to the error taxonomy, reading the body
    /// for the service's message.
    async fn reject(response: reqwest::Response, job_name: &str) -> ServiceError {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND
            || status == reqwest::StatusCode::BAD_REQUEST
        {
            return ServiceError::NotFound {
                job_name: job_name.to_string(),
            };
        }
        let message = response.text().await.unwrap_or_default();
        ServiceError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl TranscriptionService for TranscribeClient {
    async fn create_job(&self, spec: &JobSpec) -> Result<(), ServiceError> {
        let response = self
            .http
            .post(format!("{}/jobs", self.base_url))
            .json(spec)
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        if response.status().is_success() {
            return Ok(());
        }

        // A create can never mean "no such job"; even a 400 here is a
        // genuine rejection (e.g. duplicate name, bad media format).
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        Err(ServiceError::Rejected { status, message })
    }

    async fn get_job(&self, name: &str) -> Result<JobState, ServiceError> {
        let response = self
            .http
            .get(self.job_url(name))
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::reject(response, name).await);
        }

        let body: JobStatusBody = response
            .json()
            .await
            .map_err(|e| ServiceError::Transport(format!("status body: {e}")))?;

        Ok(body.status)
    }

    async fn delete_job(&self, name: &str) -> Result<(), ServiceError> {
        let response = self
            .http
            .delete(self.job_url(name))
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(Self::reject(response, name).await)
    }
}
