use std::path::PathBuf;

use uuid::Uuid;

use crate::convert::convert;
use crate::docket::extract_docket;
use crate::event::StorageEvent;
use crate::model::StageResult;
use crate::naming;

use super::{Stage, StageContext, StageError};

/// Convert stage: a transcript record landed under `transcribed/`.
///
/// Downloads the record to a per-invocation temp path, validates it,
/// renders the document, and uploads it as
/// `converted/<docket> <common suffix>.docx`. Temp names are unique per
/// invocation so concurrent workers never collide on the local
/// filesystem.
pub async fn run_convert(
    ctx: &StageContext,
    event: &StorageEvent,
) -> Result<StageResult, StageError> {
    let stage = Stage::Convert;
    let policy = ctx.settings.docket_policy_for(stage);

    let docket = extract_docket(&event.key, &policy)?;
    let document_key = naming::document_key(&docket, &ctx.settings.common_filename);
    let output_bucket = ctx.settings.output_bucket_for(&event.bucket);

    let download_path: PathBuf = ctx.settings.tmp_dir.join(format!("{}.json", Uuid::new_v4()));
    let render_path: PathBuf = ctx
        .settings
        .tmp_dir
        .join(format!("converted-{}.docx", Uuid::new_v4()));

    tracing::info!(docket = %docket, key = %event.key, "📄 converting transcript");

    let result = convert_once(ctx, event, &download_path, &render_path, &document_key, output_bucket).await;

    // Temp files are not reused across invocations; remove them regardless
    // of outcome so a long-running process does not fill TMP_DIR.
    let _ = tokio::fs::remove_file(&download_path).await;
    let _ = tokio::fs::remove_file(&render_path).await;

    result?;

    Ok(StageResult::success(
        docket,
        stage.name(),
        event.bucket.clone(),
        document_key,
    ))
}

async fn convert_once(
    ctx: &StageContext,
    event: &StorageEvent,
    download_path: &PathBuf,
    render_path: &PathBuf,
    document_key: &str,
    output_bucket: &str,
) -> Result<(), StageError> {
    ctx.store
        .download(&event.bucket, &event.key, download_path)
        .await?;

    convert(ctx.renderer.as_ref(), download_path, render_path).await?;

    ctx.store
        .upload(render_path, output_bucket, document_key)
        .await?;

    Ok(())
}
