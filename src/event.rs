use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

// ── Wire format ────────────────────────────────────────────────────────────────

/// S3-style bucket notification, as MinIO publishes it to AMQP on object
/// creation. Only the fields the pipeline consumes are modelled; everything
/// else in the payload is ignored on deserialization.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BucketNotification {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct S3Entity {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObjectRef {
    /// URL-encoded object key, directory prefix included.
    pub key: String,
}

// ── Error ──────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum EventError {
    /// The notification body was not valid JSON for the expected shape.
    Parse(String),
    /// The notification carried no records.
    Empty,
    /// The object key could not be percent-decoded to UTF-8.
    Key(String),
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(m) => write!(f, "event parse error: {m}"),
            Self::Empty => write!(f, "event carried no records"),
            Self::Key(m) => write!(f, "object key decode error: {m}"),
        }
    }
}

impl std::error::Error for EventError {}

// ── Parsed event ───────────────────────────────────────────────────────────────

/// One object-creation event, decoded and ready for a stage handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub bucket: String,
    /// Decoded object key, directory prefix included.
    pub key: String,
}

impl StorageEvent {
    /// Parse a notification body into the first record's `{bucket, key}`.
    ///
    /// Object keys arrive URL-encoded (space as `+` or `%20`); they are
    /// decoded here, once, so every downstream consumer sees the real key.
    pub fn from_json(body: &[u8]) -> Result<Self, EventError> {
        let notification: BucketNotification =
            serde_json::from_slice(body).map_err(|e| EventError::Parse(e.to_string()))?;

        let record = notification.records.into_iter().next().ok_or(EventError::Empty)?;

        Ok(Self {
            bucket: record.s3.bucket.name,
            key: decode_key(&record.s3.object.key)?,
        })
    }
}

/// Decode a URL-encoded object key, treating `+` as a space the way bucket
/// notifications encode it.
fn decode_key(raw: &str) -> Result<String, EventError> {
    let plus_decoded = raw.replace('+', " ");
    percent_decode_str(&plus_decoded)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| EventError::Key(format!("{raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(bucket: &str, key: &str) -> String {
        format!(
            r#"{{"Records":[{{"s3":{{"bucket":{{"name":"{bucket}"}},"object":{{"key":"{key}"}}}}}}]}}"#
        )
    }

    #[test]
    fn parses_first_record() {
        let body = notification("case-bucket", "transcribed/P12345-US01.json");
        let event = StorageEvent::from_json(body.as_bytes()).unwrap();
        assert_eq!(event.bucket, "case-bucket");
        assert_eq!(event.key, "transcribed/P12345-US01.json");
    }

    #[test]
    fn decodes_plus_and_percent_escapes() {
        let body = notification("case-bucket", "audio/P12345-US01+disclosure%20call.m4a");
        let event = StorageEvent::from_json(body.as_bytes()).unwrap();
        assert_eq!(event.key, "audio/P12345-US01 disclosure call.m4a");
    }

    #[test]
    fn rejects_empty_records() {
        let err = StorageEvent::from_json(br#"{"Records":[]}"#).unwrap_err();
        assert!(matches!(err, EventError::Empty));
    }

    #[test]
    fn rejects_non_json_body() {
        assert!(matches!(
            StorageEvent::from_json(b"not json"),
            Err(EventError::Parse(_))
        ));
    }
}
