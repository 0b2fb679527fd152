mod renderer;
mod transcript;

pub use renderer::{CommandRenderer, DocumentRenderer, RenderError, RenderOutcome};
pub use transcript::{validate_transcript, TranscriptError, TranscriptRecord};

use std::path::Path;

// ── Error ──────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConvertError {
    /// The downloaded transcript was not well-formed; the renderer was
    /// never invoked.
    Transcript(TranscriptError),
    Render(RenderError),
}

impl std::fmt::Display for ConvertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transcript(e) => write!(f, "{e}"),
            Self::Render(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ConvertError {}

// ── Converter ──────────────────────────────────────────────────────────────────

/// Turn a downloaded transcript record into a formatted document at
/// `output_path`.
///
/// Validates the transcript first, failing fast with an error naming the
/// offending input, then delegates rendering. Whatever progress text the
/// renderer prints is captured and re-emitted through tracing rather than
/// leaking into the process's own log stream.
pub async fn convert<R: DocumentRenderer + ?Sized>(
    renderer: &R,
    transcript_path: &Path,
    output_path: &Path,
) -> Result<RenderOutcome, ConvertError> {
    let record = validate_transcript(transcript_path).map_err(ConvertError::Transcript)?;
    tracing::debug!(
        job = %record.job_name,
        transcript = %transcript_path.display(),
        "transcript validated"
    );

    let outcome = renderer
        .render(transcript_path, output_path)
        .await
        .map_err(ConvertError::Render)?;

    if !outcome.diagnostics.is_empty() {
        tracing::debug!(renderer_output = %outcome.diagnostics.trim_end(), "renderer diagnostics");
    }

    Ok(outcome)
}
