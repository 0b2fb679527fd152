mod client;
mod lifecycle;

pub use client::TranscribeClient;
pub use lifecycle::{replace_job, LifecycleError, ReplacePolicy};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ── Job submission ─────────────────────────────────────────────────────────────

/// Everything the external service needs to start one transcription job.
///
/// `name` is the service's unique key for the job; `output_bucket` +
/// `output_key` direct the transcript to a location derivable from the
/// same docket the name was built from. Consumed once per submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    pub language_code: String,
    pub media_format: String,
    pub media_uri: String,
    /// Diarization: maximum number of speaker labels.
    pub max_speakers: u32,
    pub output_bucket: String,
    pub output_key: String,
}

/// Lifecycle state the service reports for an existing job.
///
/// The coordinator only distinguishes "exists" from "not found"; the
/// concrete state is carried for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Queued,
    InProgress,
    Completed,
    Failed,
}

// ── Error ──────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ServiceError {
    /// The service reports no job under this name. Covers both its
    /// "not found" and "bad request, unknown job" responses, which it
    /// uses interchangeably.
    NotFound { job_name: String },
    /// The request never produced a usable response (connection, timeout,
    /// body decode).
    Transport(String),
    /// The service answered with an error other than "no such job".
    Rejected { status: u16, message: String },
}

impl ServiceError {
    /// True when the error means the job does not exist — the condition
    /// the lifecycle coordinator treats as success for delete and poll.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { job_name } => write!(f, "no such job: {job_name}"),
            Self::Transport(m) => write!(f, "transcription service unreachable: {m}"),
            Self::Rejected { status, message } => {
                write!(f, "transcription service rejected request ({status}): {message}")
            }
        }
    }
}

impl std::error::Error for ServiceError {}

// ── Service seam ───────────────────────────────────────────────────────────────

/// Operations consumed from the external speech-transcription service.
///
/// A trait so the lifecycle coordinator can be exercised against a fake
/// service in tests; the production implementation is [`TranscribeClient`].
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    /// Submit a new job. The service rejects duplicate names while a prior
    /// job — even a completed one — still exists under that name.
    async fn create_job(&self, spec: &JobSpec) -> Result<(), ServiceError>;

    /// Query a job's state by name.
    async fn get_job(&self, name: &str) -> Result<JobState, ServiceError>;

    /// Delete a job by name.
    async fn delete_job(&self, name: &str) -> Result<(), ServiceError>;
}
