//! End-to-end stage tests driven through in-memory collaborators.
//!
//! Every external touchpoint — transcription service, object store,
//! renderer — sits behind a trait, so both stages run here exactly as in
//! production, minus the network.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use docketscribe::config::DocketPolicyChoice;
use docketscribe::convert::{DocumentRenderer, RenderError, RenderOutcome};
use docketscribe::event::StorageEvent;
use docketscribe::pipeline::{run_convert, run_transcribe, PipelineSettings, StageContext};
use docketscribe::storage::{ObjectStore, StorageError};
use docketscribe::transcribe::{
    JobSpec, JobState, ReplacePolicy, ServiceError, TranscriptionService,
};

// ── Fakes ──────────────────────────────────────────────────────────────────────

/// Service where every job name is free: delete and get answer "not
/// found", create records the submitted spec.
#[derive(Default)]
struct FakeService {
    created: Mutex<Vec<JobSpec>>,
}

#[async_trait]
impl TranscriptionService for FakeService {
    async fn create_job(&self, spec: &JobSpec) -> Result<(), ServiceError> {
        self.created.lock().unwrap().push(spec.clone());
        Ok(())
    }

    async fn get_job(&self, name: &str) -> Result<JobState, ServiceError> {
        Err(ServiceError::NotFound {
            job_name: name.to_string(),
        })
    }

    async fn delete_job(&self, name: &str) -> Result<(), ServiceError> {
        Err(ServiceError::NotFound {
            job_name: name.to_string(),
        })
    }
}

/// Object store backed by a `(bucket, key) → bytes` map.
#[derive(Default)]
struct MemoryStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryStore {
    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), bytes.to_vec());
    }

    fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn download(&self, bucket: &str, key: &str, path: &Path) -> Result<(), StorageError> {
        let bytes = self
            .get(bucket, key)
            .ok_or_else(|| StorageError::Download(format!("{bucket}/{key}: no such object")))?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| StorageError::Io(e.to_string()))
    }

    async fn upload(&self, path: &Path, bucket: &str, key: &str) -> Result<(), StorageError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| StorageError::Io(e.to_string()))?;
        self.put(bucket, key, &bytes);
        Ok(())
    }
}

/// Renderer that writes a placeholder document where the real one would.
struct FakeRenderer;

#[async_trait]
impl DocumentRenderer for FakeRenderer {
    async fn render(&self, _transcript: &Path, output: &Path) -> Result<RenderOutcome, RenderError> {
        tokio::fs::write(output, b"rendered document")
            .await
            .map_err(|e| RenderError::Failed(e.to_string()))?;
        Ok(RenderOutcome {
            diagnostics: "rendered 1 page".to_string(),
        })
    }
}

// ── Wiring helpers ─────────────────────────────────────────────────────────────

fn settings(tmp_dir: &Path, policy: DocketPolicyChoice) -> PipelineSettings {
    PipelineSettings {
        language_code: "en-US".to_string(),
        max_speakers: 4,
        replace_policy: ReplacePolicy {
            poll_interval: Duration::from_millis(10),
            timeout: Duration::from_secs(1),
        },
        output_bucket: None,
        common_filename: "Disclosure Call".to_string(),
        docket_policy: policy,
        tmp_dir: tmp_dir.to_path_buf(),
    }
}

struct Harness {
    service: Arc<FakeService>,
    store: Arc<MemoryStore>,
    ctx: StageContext,
    _tmp: tempfile::TempDir,
}

fn harness(policy: DocketPolicyChoice) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let service = Arc::new(FakeService::default());
    let store = Arc::new(MemoryStore::default());
    let ctx = StageContext {
        service: service.clone(),
        store: store.clone(),
        renderer: Arc::new(FakeRenderer),
        settings: settings(tmp.path(), policy),
    };
    Harness {
        service,
        store,
        ctx,
        _tmp: tmp,
    }
}

fn event(bucket: &str, key: &str) -> StorageEvent {
    StorageEvent {
        bucket: bucket.to_string(),
        key: key.to_string(),
    }
}

const TRANSCRIPT_BODY: &str = r#"{
    "jobName": "audiotojson-ABC-123AB45",
    "results": {
        "transcripts": [{"transcript": "good afternoon, this call is being recorded"}],
        "speaker_labels": {
            "speakers": 2,
            "segments": [
                {"speaker_label": "spk_0", "start_time": "0.0", "end_time": "4.2"}
            ]
        }
    }
}"#;

fn tmp_file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

// ── Transcribe stage ───────────────────────────────────────────────────────────

#[tokio::test]
async fn transcribe_submits_job_with_names_derived_from_the_key() {
    let h = harness(DocketPolicyChoice::Fail);
    let event = event("case-bucket", "audio/P12345-US01 disclosure call.m4a");

    let result = run_transcribe(&h.ctx, &event).await.unwrap();

    let created = h.service.created.lock().unwrap();
    assert_eq!(created.len(), 1);
    let spec = &created[0];
    assert_eq!(spec.name, "audiotojson-P12345-US01");
    assert_eq!(spec.media_format, "m4a");
    assert_eq!(
        spec.media_uri,
        "s3://case-bucket/audio/P12345-US01 disclosure call.m4a"
    );
    assert_eq!(spec.output_bucket, "case-bucket");
    assert_eq!(spec.output_key, "transcribed/P12345-US01.json");
    assert_eq!(spec.max_speakers, 4);

    assert!(result.success);
    assert_eq!(result.docket, "P12345-US01");
    assert_eq!(
        result.output_key.as_deref(),
        Some("transcribed/P12345-US01.json")
    );
}

#[tokio::test]
async fn transcribe_fail_policy_rejects_undocketed_key_before_any_call() {
    let h = harness(DocketPolicyChoice::Fail);
    let event = event("case-bucket", "audio/team meeting notes.m4a");

    let err = run_transcribe(&h.ctx, &event).await.unwrap_err();

    assert!(err.is_deterministic(), "a bad filename never clears on retry");
    assert!(err.to_string().contains("team meeting notes"));
    assert!(h.service.created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn transcribe_fallback_policy_tags_synthesized_docket() {
    let h = harness(DocketPolicyChoice::Fallback);
    let event = event("case-bucket", "audio/untagged recording.mp3");

    let result = run_transcribe(&h.ctx, &event).await.unwrap();

    assert!(result.docket.starts_with("Transcription-"));
    let created = h.service.created.lock().unwrap();
    assert!(created[0].name.starts_with("audiotojson-Transcription-"));
}

// ── Convert stage ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn convert_renders_and_uploads_the_document() {
    let h = harness(DocketPolicyChoice::Fail);
    h.store.put(
        "case-bucket",
        "transcribed/ABC-123AB45.json",
        TRANSCRIPT_BODY.as_bytes(),
    );
    let event = event("case-bucket", "transcribed/ABC-123AB45.json");

    let result = run_convert(&h.ctx, &event).await.unwrap();

    let document_key = "converted/ABC-123AB45 Disclosure Call.docx";
    assert_eq!(result.output_key.as_deref(), Some(document_key));
    assert_eq!(
        h.store.get("case-bucket", document_key).as_deref(),
        Some(b"rendered document".as_ref())
    );
    assert_eq!(
        tmp_file_count(&h.ctx.settings.tmp_dir),
        0,
        "temp files must be removed after the invocation"
    );
}

#[tokio::test]
async fn convert_rejects_malformed_transcript_without_uploading() {
    let h = harness(DocketPolicyChoice::Fail);
    h.store
        .put("case-bucket", "transcribed/ABC-123AB45.json", b"not json");
    let event = event("case-bucket", "transcribed/ABC-123AB45.json");

    let err = run_convert(&h.ctx, &event).await.unwrap_err();

    assert!(err.is_deterministic());
    assert!(h
        .store
        .get("case-bucket", "converted/ABC-123AB45 Disclosure Call.docx")
        .is_none());
    assert_eq!(tmp_file_count(&h.ctx.settings.tmp_dir), 0);
}

#[tokio::test]
async fn convert_missing_object_is_transient() {
    let h = harness(DocketPolicyChoice::Fail);
    let event = event("case-bucket", "transcribed/ABC-123AB45.json");

    let err = run_convert(&h.ctx, &event).await.unwrap_err();

    assert!(!err.is_deterministic(), "storage failures may clear on retry");
}

#[tokio::test]
async fn output_bucket_override_redirects_uploads() {
    let mut h = harness(DocketPolicyChoice::Fail);
    h.ctx.settings.output_bucket = Some("archive".to_string());
    h.store.put(
        "case-bucket",
        "transcribed/ABC-123AB45.json",
        TRANSCRIPT_BODY.as_bytes(),
    );
    let event = event("case-bucket", "transcribed/ABC-123AB45.json");

    run_convert(&h.ctx, &event).await.unwrap();

    let document_key = "converted/ABC-123AB45 Disclosure Call.docx";
    assert!(h.store.get("archive", document_key).is_some());
    assert!(h.store.get("case-bucket", document_key).is_none());
}
