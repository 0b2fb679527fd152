use std::sync::LazyLock;

use regex::Regex;

// ── Pattern rules ──────────────────────────────────────────────────────────────

/// Ordered list of docket patterns, tried first-match-wins against the
/// filename stem. Appending a new shape here is the only change needed to
/// recognise it — no control flow to touch.
///
/// 1. `P<digits>-<2 word chars><2 digits>` — e.g. `P12345-US01` (case-insensitive)
/// 2. `<3 word chars>-<3 digits><2 word chars><2 digits>` — e.g. `ABC-123AB45`
static DOCKET_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)P\d+-\w{2}\d{2}").expect("docket pattern 1"),
        Regex::new(r"\w{3}-\d{3}\w{2}\d{2}").expect("docket pattern 2"),
    ]
});

// ── Policy ─────────────────────────────────────────────────────────────────────

/// What to do when no pattern matches the stem.
///
/// The choice is made once in configuration and threaded through every
/// stage; stages differ only in the fallback `tag`, never in the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocketPolicy {
    /// Return [`DocketError::NotFound`] so the caller aborts the job.
    Fail,
    /// Synthesize `<tag>-<UTC timestamp>` so the pipeline still makes
    /// forward progress for unrecognised names.
    Fallback {
        /// Stage-specific prefix, e.g. `Transcription` or `Conversion`.
        tag: &'static str,
    },
}

// ── Error ──────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum DocketError {
    /// No pattern matched and the policy was [`DocketPolicy::Fail`].
    NotFound { stem: String },
}

impl std::fmt::Display for DocketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { stem } => {
                write!(f, "could not find a valid docket number in: {stem}")
            }
        }
    }
}

impl std::error::Error for DocketError {}

// ── Extraction ─────────────────────────────────────────────────────────────────

/// Derive the correlation docket from a filename.
///
/// Only the final path component, suffix stripped, is inspected. The first
/// matching pattern wins and its matched substring is returned upper-cased,
/// otherwise unmodified. The docket is recomputed from the filename at every
/// stage — it is never passed as pipeline state — so this function is the
/// contract that keeps the audio, transcript and document artifacts of one
/// case correlated.
///
/// Pure over its input, except that the fallback path reads the clock.
pub fn extract_docket(filename: &str, policy: &DocketPolicy) -> Result<String, DocketError> {
    let stem = file_stem(filename);

    for pattern in DOCKET_PATTERNS.iter() {
        if let Some(m) = pattern.find(stem) {
            return Ok(m.as_str().to_uppercase());
        }
    }

    match policy {
        DocketPolicy::Fail => Err(DocketError::NotFound {
            stem: stem.to_string(),
        }),
        DocketPolicy::Fallback { tag } => {
            tracing::warn!(filename, "⚠️  docket not found in filename, using fallback");
            Ok(fallback_docket(tag))
        }
    }
}

/// `<tag>-<UTC timestamp with millis>` — deterministic per instant, unique
/// enough in practice for unrecognised uploads.
fn fallback_docket(tag: &str) -> String {
    format!("{tag}-{}", chrono::Utc::now().format("%Y%m%d%H%M%S%3f"))
}

/// Final path component without its extension chain suffix.
///
/// `transcribed/p12345-us01.json` → `p12345-us01`.
fn file_stem(filename: &str) -> &str {
    let name = filename.rsplit('/').next().unwrap_or(filename);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_shape_from_prefixed_key() {
        let docket =
            extract_docket("transcribed/p12345-us01.json", &DocketPolicy::Fail).unwrap();
        assert_eq!(docket, "P12345-US01");
    }

    #[test]
    fn extracts_from_key_with_trailing_words() {
        let docket =
            extract_docket("audio/P12345-US01 disclosure call.m4a", &DocketPolicy::Fail)
                .unwrap();
        assert_eq!(docket, "P12345-US01");
    }

    #[test]
    fn extracts_second_shape() {
        let docket = extract_docket("abc-123AB45.mp3", &DocketPolicy::Fail).unwrap();
        assert_eq!(docket, "ABC-123AB45");
    }

    #[test]
    fn first_pattern_wins_when_both_could_match() {
        // Contains a type-1 docket; the type-2 shape later in the stem must not win.
        let docket =
            extract_docket("P99-AB12 then xyz-123cd45.wav", &DocketPolicy::Fail).unwrap();
        assert_eq!(docket, "P99-AB12");
    }

    #[test]
    fn fail_policy_raises_with_stem_in_message() {
        let err = extract_docket("invalid_filename.mp3", &DocketPolicy::Fail).unwrap_err();
        assert!(err.to_string().contains("invalid_filename"));
    }

    #[test]
    fn fallback_policy_synthesizes_tagged_docket() {
        let docket = extract_docket(
            "something invalid",
            &DocketPolicy::Fallback { tag: "Transcription" },
        )
        .unwrap();
        assert!(docket.starts_with("Transcription-"));
    }

    #[test]
    fn fallback_tag_is_stage_specific() {
        let docket =
            extract_docket("somefile.mp3", &DocketPolicy::Fallback { tag: "Conversion" })
                .unwrap();
        assert!(docket.starts_with("Conversion-"));
    }

    #[test]
    fn stem_strips_only_final_suffix() {
        assert_eq!(file_stem("audio/case.backup.m4a"), "case.backup");
        assert_eq!(file_stem("no_extension"), "no_extension");
    }
}
