use std::path::Path;

use serde::{Deserialize, Serialize};

// ── Record model ───────────────────────────────────────────────────────────────

/// The transcript record the speech service writes to
/// `transcribed/<docket>.json`.
///
/// Only the envelope the converter needs to sanity-check is modelled; the
/// renderer consumes the full file itself, so unknown fields pass through
/// untouched on disk.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscriptRecord {
    #[serde(rename = "jobName")]
    pub job_name: String,
    pub results: TranscriptResults,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscriptResults {
    pub transcripts: Vec<TranscriptText>,
    /// Speaker diarization block; present when the job enabled it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_labels: Option<SpeakerLabels>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscriptText {
    pub transcript: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpeakerLabels {
    pub speakers: u32,
    #[serde(default)]
    pub segments: Vec<SpeakerSegment>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpeakerSegment {
    pub speaker_label: String,
    pub start_time: String,
    pub end_time: String,
}

// ── Error ──────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum TranscriptError {
    Read { path: String, cause: String },
    /// The file exists but is not a well-formed transcript record.
    Malformed { path: String, cause: String },
}

impl std::fmt::Display for TranscriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, cause } => {
                write!(f, "could not read transcript {path}: {cause}")
            }
            Self::Malformed { path, cause } => {
                write!(f, "malformed transcript {path}: {cause}")
            }
        }
    }
}

impl std::error::Error for TranscriptError {}

// ── Validation ─────────────────────────────────────────────────────────────────

/// Parse and sanity-check the transcript file before any renderer runs.
///
/// Fails fast on unreadable files, invalid JSON, or a record with no
/// transcript text at all — each with a message naming the offending
/// input so the operator can find it in the bucket.
pub fn validate_transcript(path: &Path) -> Result<TranscriptRecord, TranscriptError> {
    let shown = path.display().to_string();

    let bytes = std::fs::read(path).map_err(|e| TranscriptError::Read {
        path: shown.clone(),
        cause: e.to_string(),
    })?;

    let record: TranscriptRecord =
        serde_json::from_slice(&bytes).map_err(|e| TranscriptError::Malformed {
            path: shown.clone(),
            cause: e.to_string(),
        })?;

    if record.results.transcripts.is_empty() {
        return Err(TranscriptError::Malformed {
            path: shown,
            cause: "no transcript entries in results".to_string(),
        });
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn accepts_well_formed_record() {
        let file = write_temp(
            r#"{
                "jobName": "audiotojson-P12345-US01",
                "results": {
                    "transcripts": [{"transcript": "hello there"}],
                    "speaker_labels": {
                        "speakers": 2,
                        "segments": [
                            {"speaker_label": "spk_0", "start_time": "0.0", "end_time": "1.4"}
                        ]
                    }
                }
            }"#,
        );
        let record = validate_transcript(file.path()).unwrap();
        assert_eq!(record.job_name, "audiotojson-P12345-US01");
        assert_eq!(record.results.speaker_labels.unwrap().speakers, 2);
    }

    #[test]
    fn accepts_record_without_speaker_labels() {
        let file = write_temp(
            r#"{"jobName":"audiotojson-X","results":{"transcripts":[{"transcript":"hi"}]}}"#,
        );
        assert!(validate_transcript(file.path()).is_ok());
    }

    #[test]
    fn rejects_invalid_json_naming_the_input() {
        let file = write_temp("definitely not json");
        let err = validate_transcript(file.path()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("malformed transcript"));
        assert!(message.contains(&file.path().display().to_string()));
    }

    #[test]
    fn rejects_record_without_transcript_entries() {
        let file = write_temp(r#"{"jobName":"audiotojson-X","results":{"transcripts":[]}}"#);
        let err = validate_transcript(file.path()).unwrap_err();
        assert!(err.to_string().contains("no transcript entries"));
    }

    #[test]
    fn rejects_missing_file() {
        let err =
            validate_transcript(Path::new("/nonexistent/transcript.json")).unwrap_err();
        assert!(matches!(err, TranscriptError::Read { .. }));
    }
}
