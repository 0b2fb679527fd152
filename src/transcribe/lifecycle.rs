use std::time::Duration;

use tokio::time::Instant;

use super::{JobSpec, ServiceError, TranscriptionService};

// ── Policy ─────────────────────────────────────────────────────────────────────

/// Bounds on the poll-until-absent wait.
///
/// `Copy` so it can be passed freely to stage handlers without cloning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplacePolicy {
    /// Fixed sleep between status polls.
    pub poll_interval: Duration,
    /// Hard ceiling on total elapsed wait before the submission fails.
    pub timeout: Duration,
}

impl Default for ReplacePolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(120),
        }
    }
}

// ── Error ──────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum LifecycleError {
    /// A previous job under this name was still present when the wait
    /// ceiling elapsed. The submission must not proceed.
    StaleJob {
        job_name: String,
        waited: Duration,
    },
    /// The create call itself failed.
    Create(ServiceError),
}

impl std::fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StaleJob { job_name, waited } => write!(
                f,
                "stale job '{job_name}' not removed after {:.0}s",
                waited.as_secs_f64()
            ),
            Self::Create(e) => write!(f, "job creation failed: {e}"),
        }
    }
}

impl std::error::Error for LifecycleError {}

// ── Coordinator ────────────────────────────────────────────────────────────────

/// Replace any job under `spec.name` with a freshly created one.
///
/// The external service keys jobs by name and rejects duplicate-name
/// creation while a prior job — even a completed one — still exists, so a
/// bare create is not retry-safe. This function makes "submit a job for
/// case X" idempotent end-to-end by driving three transitions against the
/// service (no job state is kept locally):
///
/// 1. **Delete-if-present.** A "not found" answer is success — the delete
///    is idempotent. Any other delete failure is logged and swallowed;
///    the poll step below is the real gate.
/// 2. **Poll-until-absent.** Query the job's status at a fixed interval
///    until the service answers "no such job". If the ceiling elapses
///    first, fail with [`LifecycleError::StaleJob`] and make **no** create
///    call — creating over a half-deleted job would collide two
///    semantically different identities under one name.
/// 3. **Create** the new job.
///
/// Two invocations racing on the same name are resolved only by the
/// service itself: last delete-then-create wins. Docket uniqueness across
/// distinct cases is an invariant of the incoming naming convention, not
/// something enforced here.
pub async fn replace_job<S: TranscriptionService + ?Sized>(
    service: &S,
    spec: &JobSpec,
    policy: &ReplacePolicy,
) -> Result<(), LifecycleError> {
    delete_if_present(service, &spec.name).await;
    poll_until_absent(service, &spec.name, policy).await?;

    service
        .create_job(spec)
        .await
        .map_err(LifecycleError::Create)?;

    tracing::info!(job = %spec.name, media = %spec.media_uri, "▶️  transcription job created");
    Ok(())
}

/// Step 1 — best-effort delete. Never fails the submission.
async fn delete_if_present<S: TranscriptionService + ?Sized>(service: &S, job_name: &str) {
    match service.delete_job(job_name).await {
        Ok(()) => {
            tracing::info!(job = job_name, "🗑️  previous job deleted");
        }
        Err(e) if e.is_not_found() => {
            tracing::debug!(job = job_name, "no previous job to delete");
        }
        Err(e) => {
            // Swallowed: if the job is genuinely stuck, the poll below
            // times out and surfaces the real error.
            tracing::warn!(job = job_name, error = %e, "⚠️  delete failed, continuing to poll");
        }
    }
}

/// Step 2 — bounded wait for the service to report the name free.
///
/// Every response other than "no such job" — including transient query
/// failures — sleeps one interval and retries, until `policy.timeout`
/// total elapsed time.
async fn poll_until_absent<S: TranscriptionService + ?Sized>(
    service: &S,
    job_name: &str,
    policy: &ReplacePolicy,
) -> Result<(), LifecycleError> {
    let started = Instant::now();

    loop {
        match service.get_job(job_name).await {
            Err(e) if e.is_not_found() => {
                tracing::debug!(job = job_name, "job name confirmed absent");
                return Ok(());
            }
            Ok(state) => {
                tracing::debug!(job = job_name, state = ?state, "previous job still present");
            }
            Err(e) => {
                tracing::warn!(job = job_name, error = %e, "status poll failed, will retry");
            }
        }

        let waited = started.elapsed();
        if waited + policy.poll_interval > policy.timeout {
            tracing::error!(
                job = job_name,
                waited_secs = waited.as_secs(),
                "❌ stale job not removed within timeout"
            );
            return Err(LifecycleError::StaleJob {
                job_name: job_name.to_string(),
                waited,
            });
        }

        tokio::time::sleep(policy.poll_interval).await;
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcribe::JobState;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Delete,
        Get,
        Create,
    }

    /// In-memory service that scripts how many polls still see the old job.
    struct FakeService {
        calls: Mutex<Vec<Call>>,
        /// Number of `get_job` calls that still report the job present.
        /// `u32::MAX` means the job never disappears.
        present_polls: Mutex<u32>,
        fail_delete: bool,
    }

    impl FakeService {
        fn new(present_polls: u32) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                present_polls: Mutex::new(present_polls),
                fail_delete: false,
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn creates(&self) -> usize {
            self.calls().iter().filter(|c| **c == Call::Create).count()
        }
    }

    #[async_trait]
    impl TranscriptionService for FakeService {
        async fn create_job(&self, _spec: &JobSpec) -> Result<(), ServiceError> {
            self.calls.lock().unwrap().push(Call::Create);
            Ok(())
        }

        async fn get_job(&self, name: &str) -> Result<JobState, ServiceError> {
            self.calls.lock().unwrap().push(Call::Get);
            let mut left = self.present_polls.lock().unwrap();
            if *left == 0 {
                return Err(ServiceError::NotFound {
                    job_name: name.to_string(),
                });
            }
            if *left != u32::MAX {
                *left -= 1;
            }
            Ok(JobState::InProgress)
        }

        async fn delete_job(&self, name: &str) -> Result<(), ServiceError> {
            self.calls.lock().unwrap().push(Call::Delete);
            if self.fail_delete {
                return Err(ServiceError::Rejected {
                    status: 500,
                    message: "internal error".to_string(),
                });
            }
            Err(ServiceError::NotFound {
                job_name: name.to_string(),
            })
        }
    }

    fn spec() -> JobSpec {
        JobSpec {
            name: "audiotojson-P12345-US01".to_string(),
            language_code: "en-US".to_string(),
            media_format: "m4a".to_string(),
            media_uri: "s3://case-bucket/audio/P12345-US01 disclosure call.m4a".to_string(),
            max_speakers: 2,
            output_bucket: "case-bucket".to_string(),
            output_key: "transcribed/P12345-US01.json".to_string(),
        }
    }

    fn policy(interval_secs: u64, timeout_secs: u64) -> ReplacePolicy {
        ReplacePolicy {
            poll_interval: Duration::from_secs(interval_secs),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deletes_polls_until_absent_then_creates() {
        // Two polls still see the old job; the third confirms it gone.
        let service = FakeService::new(2);

        replace_job(&service, &spec(), &policy(1, 30)).await.unwrap();

        assert_eq!(
            service.calls(),
            vec![Call::Delete, Call::Get, Call::Get, Call::Get, Call::Create]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stale_job_times_out_without_creating() {
        let service = FakeService::new(u32::MAX);

        let err = replace_job(&service, &spec(), &policy(5, 10)).await.unwrap_err();

        match err {
            LifecycleError::StaleJob { job_name, waited } => {
                assert_eq!(job_name, "audiotojson-P12345-US01");
                assert!(waited >= Duration::from_secs(5));
            }
            other => panic!("expected StaleJob, got {other:?}"),
        }
        assert_eq!(service.creates(), 0, "no create call may follow a timeout");
    }

    #[tokio::test(start_paused = true)]
    async fn delete_failure_is_swallowed_when_poll_confirms_absent() {
        let mut service = FakeService::new(0);
        service.fail_delete = true;

        replace_job(&service, &spec(), &policy(1, 30)).await.unwrap();

        assert_eq!(service.creates(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deletes_exactly_once_per_submission() {
        let service = FakeService::new(3);

        replace_job(&service, &spec(), &policy(1, 30)).await.unwrap();

        let deletes = service
            .calls()
            .iter()
            .filter(|c| **c == Call::Delete)
            .count();
        assert_eq!(deletes, 1);
    }
}
