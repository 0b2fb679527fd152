//! Derived-name templates shared by every stage.
//!
//! All three artifacts of one case — audio, transcript, document — are
//! correlated purely by names built here from the docket. The templates are
//! an interop contract with whatever is watching the bucket, so they must
//! stay bit-exact; both the code path that creates transcription jobs and
//! the one that deletes stale ones go through [`job_name`].

/// Prefix of every transcription job name.
pub const JOB_NAME_PREFIX: &str = "audiotojson";

/// Bucket prefix where incoming audio lands.
pub const AUDIO_PREFIX: &str = "audio/";

/// Bucket prefix where the transcription service writes its output.
pub const TRANSCRIBED_PREFIX: &str = "transcribed/";

/// Bucket prefix where converted documents are uploaded.
pub const CONVERTED_PREFIX: &str = "converted/";

/// External service's unique key for the case's transcription job:
/// `audiotojson-<docket>`.
pub fn job_name(docket: &str) -> String {
    format!("{JOB_NAME_PREFIX}-{docket}")
}

/// Object key the transcript is written to: `transcribed/<docket>.json`.
pub fn transcript_key(docket: &str) -> String {
    format!("{TRANSCRIBED_PREFIX}{docket}.json")
}

/// Object key the converted document is uploaded to:
/// `converted/<docket> <common suffix>.docx`.
pub fn document_key(docket: &str, common_suffix: &str) -> String {
    format!("{CONVERTED_PREFIX}{docket} {common_suffix}.docx")
}

/// S3-style URI handed to the transcription service as the media source.
pub fn media_uri(bucket: &str, key: &str) -> String {
    format!("s3://{bucket}/{key}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_name_is_deterministic() {
        assert_eq!(job_name("P12345-US01"), "audiotojson-P12345-US01");
        assert_eq!(job_name("P12345-US01"), job_name("P12345-US01"));
    }

    #[test]
    fn transcript_key_template() {
        assert_eq!(transcript_key("P12345-US01"), "transcribed/P12345-US01.json");
    }

    #[test]
    fn document_key_template() {
        assert_eq!(
            document_key("ABC-123AB45", "Disclosure Call"),
            "converted/ABC-123AB45 Disclosure Call.docx"
        );
    }

    #[test]
    fn media_uri_preserves_spaces_in_key() {
        assert_eq!(
            media_uri("case-bucket", "audio/P12345-US01 disclosure call.m4a"),
            "s3://case-bucket/audio/P12345-US01 disclosure call.m4a"
        );
    }
}
