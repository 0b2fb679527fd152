use serde::{Deserialize, Serialize};

/// Outcome message published back to RabbitMQ after a stage processed one
/// storage event.
///
/// Published to: `docketscribe_results_exchange` (direct)
/// Routing key:  `pipeline.result`
/// Queue:        `docketscribe_results`
///
/// Exactly one result is published per fully-processed event, successful
/// or not, so operators and downstream systems can observe completion
/// without scanning the bucket. Events that are still being retried do
/// not produce a result yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    /// Correlation docket extracted from the event's object key.
    pub docket: String,

    /// Which stage processed the event: `"transcribe"` or `"convert"`.
    pub stage: String,

    /// Bucket the event originated from.
    pub bucket: String,

    /// Key the stage's artifact was written to (job output location for
    /// the transcribe stage, document key for the convert stage).
    /// Absent on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,

    /// `true` if the stage completed, `false` on any error.
    pub success: bool,

    /// Human-readable error description. Only present when `success` is `false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl StageResult {
    /// Builds a successful result.
    pub fn success(docket: String, stage: &str, bucket: String, output_key: String) -> Self {
        Self {
            docket,
            stage: stage.to_string(),
            bucket,
            output_key: Some(output_key),
            success: true,
            error_message: None,
        }
    }

    /// Builds a failed result.
    pub fn failure(docket: String, stage: &str, bucket: String, error_message: String) -> Self {
        Self {
            docket,
            stage: stage.to_string(),
            bucket,
            output_key: None,
            success: false,
            error_message: Some(error_message),
        }
    }
}
