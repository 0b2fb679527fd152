use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

// ── Outcome ────────────────────────────────────────────────────────────────────

/// What a render produced besides the document itself.
#[derive(Debug, Clone, Default)]
pub struct RenderOutcome {
    /// Human-readable progress text the renderer printed. Captured so it
    /// can be forwarded through tracing instead of corrupting stdout.
    pub diagnostics: String,
}

// ── Error ──────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum RenderError {
    /// The renderer ran but did not produce a document.
    Failed(String),
    /// The renderer command could not be started at all.
    Spawn(String),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed(cause) => write!(f, "failed to create document: {cause}"),
            Self::Spawn(cause) => write!(f, "failed to create document: {cause}"),
        }
    }
}

impl std::error::Error for RenderError {}

// ── Renderer seam ──────────────────────────────────────────────────────────────

/// The external document-generation library, seen from the pipeline.
///
/// Rendering itself — layout, the document binary format — is entirely
/// the implementation's business; the pipeline only cares that a document
/// appears at `output` or a wrapped error comes back.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(&self, transcript: &Path, output: &Path) -> Result<RenderOutcome, RenderError>;
}

// ── Command-backed implementation ──────────────────────────────────────────────

/// Runs an external renderer command as `<cmd> <transcript> <output>`,
/// capturing its stdout and stderr.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    cmd: String,
}

impl CommandRenderer {
    pub fn new(cmd: &str) -> Self {
        Self {
            cmd: cmd.to_string(),
        }
    }
}

#[async_trait]
impl DocumentRenderer for CommandRenderer {
    async fn render(&self, transcript: &Path, output: &Path) -> Result<RenderOutcome, RenderError> {
        let result = Command::new(&self.cmd)
            .arg(transcript)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| RenderError::Spawn(format!("{}: {e}", self.cmd)))?;

        let stdout = String::from_utf8_lossy(&result.stdout).into_owned();

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(RenderError::Failed(format!(
                "{} exited with {}: {}",
                self.cmd,
                result.status,
                stderr.trim()
            )));
        }

        if !output.exists() {
            return Err(RenderError::Failed(format!(
                "{} reported success but produced no file at {}",
                self.cmd,
                output.display()
            )));
        }

        Ok(RenderOutcome { diagnostics: stdout })
    }
}
