// ── Error ──────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum MediaError {
    /// The filename carries no extension to derive a format from.
    Unresolved { filename: String },
}

impl std::fmt::Display for MediaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unresolved { filename } => {
                write!(f, "could not figure out media format from: {filename}")
            }
        }
    }
}

impl std::error::Error for MediaError {}

// ── Resolver ───────────────────────────────────────────────────────────────────

/// Derive the media format token the transcription service expects
/// (`m4a`, `mp3`, `wav`, ...) from the filename's extension.
///
/// The token is the substring after the final `.` of the last path
/// component, returned verbatim — the service, not this resolver, decides
/// which formats it can decode. Resolution happens before any external
/// call is made, so a missing extension fails the invocation early.
pub fn resolve_format(filename: &str) -> Result<String, MediaError> {
    let name = filename.rsplit('/').next().unwrap_or(filename);

    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => Ok(name[idx + 1..].to_string()),
        _ => Err(MediaError::Unresolved {
            filename: filename.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_extension_verbatim() {
        assert_eq!(resolve_format("audio/call.m4a").unwrap(), "m4a");
        assert_eq!(resolve_format("recording.MP3").unwrap(), "MP3");
    }

    #[test]
    fn resolves_final_suffix_of_dotted_name() {
        assert_eq!(resolve_format("audio/case.backup.wav").unwrap(), "wav");
    }

    #[test]
    fn errors_without_extension() {
        let err = resolve_format("something invalid").unwrap_err();
        assert!(err.to_string().contains("media format"));
        assert!(err.to_string().contains("something invalid"));
    }

    #[test]
    fn errors_on_trailing_dot() {
        assert!(resolve_format("audio/broken.").is_err());
    }
}
