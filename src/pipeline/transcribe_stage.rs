use crate::docket::extract_docket;
use crate::event::StorageEvent;
use crate::media::resolve_format;
use crate::model::StageResult;
use crate::naming;
use crate::transcribe::{replace_job, JobSpec};

use super::{Stage, StageContext, StageError};

/// Transcribe stage: an audio object landed under `audio/`.
///
/// Derives the docket and media format from the object key, then hands the
/// job to the lifecycle coordinator, which clears any stale job under the
/// same name before creating the new one. The transcript is directed to
/// `transcribed/<docket>.json` so the convert stage can re-derive the same
/// docket from it.
pub async fn run_transcribe(
    ctx: &StageContext,
    event: &StorageEvent,
) -> Result<StageResult, StageError> {
    let stage = Stage::Transcribe;
    let policy = ctx.settings.docket_policy_for(stage);

    let docket = extract_docket(&event.key, &policy)?;
    let media_format = resolve_format(&event.key)?;

    let output_bucket = ctx.settings.output_bucket_for(&event.bucket);
    let spec = JobSpec {
        name: naming::job_name(&docket),
        language_code: ctx.settings.language_code.clone(),
        media_format,
        media_uri: naming::media_uri(&event.bucket, &event.key),
        max_speakers: ctx.settings.max_speakers,
        output_bucket: output_bucket.to_string(),
        output_key: naming::transcript_key(&docket),
    };

    tracing::info!(
        docket = %docket,
        job = %spec.name,
        format = %spec.media_format,
        "🎙️  submitting transcription job"
    );

    replace_job(ctx.service.as_ref(), &spec, &ctx.settings.replace_policy).await?;

    Ok(StageResult::success(
        docket,
        stage.name(),
        event.bucket.clone(),
        spec.output_key,
    ))
}
