mod convert_stage;
mod transcribe_stage;

pub use convert_stage::run_convert;
pub use transcribe_stage::run_transcribe;

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Config, DocketPolicyChoice};
use crate::convert::{ConvertError, DocumentRenderer};
use crate::docket::{DocketError, DocketPolicy};
use crate::media::MediaError;
use crate::naming;
use crate::storage::{ObjectStore, StorageError};
use crate::transcribe::{LifecycleError, ReplacePolicy, TranscriptionService};

// ── Stage routing ──────────────────────────────────────────────────────────────

/// The two processing stages, selected by the event key's bucket prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// `audio/…` — submit a transcription job.
    Transcribe,
    /// `transcribed/…` — render and upload the document.
    Convert,
}

impl Stage {
    /// Stage name used in result messages and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Transcribe => "transcribe",
            Self::Convert => "convert",
        }
    }

    /// Fallback docket tag for this stage.
    pub fn fallback_tag(&self) -> &'static str {
        match self {
            Self::Transcribe => "Transcription",
            Self::Convert => "Conversion",
        }
    }
}

/// Pick the stage responsible for an object key, or `None` for keys the
/// pipeline does not react to. `converted/` objects are our own output;
/// ignoring them (and anything else unrecognised) prevents event loops.
pub fn route(key: &str) -> Option<Stage> {
    if key.starts_with(naming::AUDIO_PREFIX) {
        Some(Stage::Transcribe)
    } else if key.starts_with(naming::TRANSCRIBED_PREFIX) {
        Some(Stage::Convert)
    } else {
        None
    }
}

// ── Shared stage context ───────────────────────────────────────────────────────

/// Everything a stage handler needs, built once in `app::run` and shared
/// by all workers. External clients live behind their trait seams so the
/// handlers can be driven by in-memory fakes in tests.
#[derive(Clone)]
pub struct StageContext {
    pub service: Arc<dyn TranscriptionService>,
    pub store: Arc<dyn ObjectStore>,
    pub renderer: Arc<dyn DocumentRenderer>,
    pub settings: PipelineSettings,
}

/// Config-derived values the stages consume.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub language_code: String,
    pub max_speakers: u32,
    pub replace_policy: ReplacePolicy,
    /// Overrides the event's source bucket for outputs when set.
    pub output_bucket: Option<String>,
    pub common_filename: String,
    pub docket_policy: DocketPolicyChoice,
    pub tmp_dir: PathBuf,
}

impl PipelineSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            language_code: cfg.language_code.clone(),
            max_speakers: cfg.max_speakers,
            replace_policy: ReplacePolicy {
                poll_interval: cfg.job_poll_interval,
                timeout: cfg.job_poll_timeout,
            },
            output_bucket: cfg.output_bucket.clone(),
            common_filename: cfg.common_filename.clone(),
            docket_policy: cfg.docket_policy,
            tmp_dir: cfg.tmp_dir.clone(),
        }
    }

    /// The single configured policy, with this stage's fallback tag.
    pub fn docket_policy_for(&self, stage: Stage) -> DocketPolicy {
        match self.docket_policy {
            DocketPolicyChoice::Fail => DocketPolicy::Fail,
            DocketPolicyChoice::Fallback => DocketPolicy::Fallback {
                tag: stage.fallback_tag(),
            },
        }
    }

    /// Output bucket for an event originating from `source_bucket`.
    pub fn output_bucket_for<'a>(&'a self, source_bucket: &'a str) -> &'a str {
        self.output_bucket.as_deref().unwrap_or(source_bucket)
    }
}

// ── Error ──────────────────────────────────────────────────────────────────────

/// Anything a stage handler can fail with. The worker maps this onto the
/// retry policy via [`StageError::is_deterministic`].
#[derive(Debug)]
pub enum StageError {
    Docket(DocketError),
    Media(MediaError),
    Lifecycle(LifecycleError),
    Storage(StorageError),
    Convert(ConvertError),
}

impl StageError {
    /// Deterministic errors will not be resolved by retrying the same
    /// event: the filename or the stored transcript itself is at fault.
    /// Everything touching an external service may clear up on retry —
    /// including a stale-job timeout, which signals an operational
    /// condition rather than a data problem.
    pub fn is_deterministic(&self) -> bool {
        match self {
            Self::Docket(_) | Self::Media(_) => true,
            Self::Convert(ConvertError::Transcript(_)) => true,
            Self::Convert(ConvertError::Render(_)) => false,
            Self::Lifecycle(_) | Self::Storage(_) => false,
        }
    }
}

impl std::fmt::Display for StageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Docket(e) => write!(f, "{e}"),
            Self::Media(e) => write!(f, "{e}"),
            Self::Lifecycle(e) => write!(f, "{e}"),
            Self::Storage(e) => write!(f, "{e}"),
            Self::Convert(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for StageError {}

impl From<DocketError> for StageError {
    fn from(e: DocketError) -> Self {
        Self::Docket(e)
    }
}

impl From<MediaError> for StageError {
    fn from(e: MediaError) -> Self {
        Self::Media(e)
    }
}

impl From<LifecycleError> for StageError {
    fn from(e: LifecycleError) -> Self {
        Self::Lifecycle(e)
    }
}

impl From<StorageError> for StageError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<ConvertError> for StageError {
    fn from(e: ConvertError) -> Self {
        Self::Convert(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_audio_prefix_to_transcribe() {
        assert_eq!(route("audio/P12345-US01 call.m4a"), Some(Stage::Transcribe));
    }

    #[test]
    fn routes_transcribed_prefix_to_convert() {
        assert_eq!(route("transcribed/P12345-US01.json"), Some(Stage::Convert));
    }

    #[test]
    fn ignores_own_output_and_unknown_prefixes() {
        assert_eq!(route("converted/P12345-US01 Disclosure Call.docx"), None);
        assert_eq!(route("scratch/notes.txt"), None);
    }
}
