use std::sync::Arc;

use lapin::{
    message::Delivery,
    options::{BasicAckOptions, BasicNackOptions},
};

use crate::event::StorageEvent;
use crate::messaging::{Job, ResultProducer};
use crate::metrics::Metrics;
use crate::model::StageResult;
use crate::pipeline::{self, Stage, StageContext};
use crate::retry::{RetryDecision, RetryPolicy, MAX_RETRIES};

// ── Public entry point ─────────────────────────────────────────────────────────

/// Process one bucket event end-to-end.
///
/// # Execution flow
/// 1. Route the event by key prefix; keys no stage handles (including our
///    own `converted/` output) are ACKed and counted as ignored.
/// 2. Run the stage handler.
/// 3. Route the outcome:
///    - `Ok(result)` → publish result + ACK.
///    - deterministic error → publish final error result + ACK, **no retry**
///      (the filename or stored transcript itself is at fault).
///    - transient error → retry via the retry exchange, or final error
///      result once attempts are exhausted.
///    - any publish failure → NACK with `requeue = true` so the event is
///      redelivered.
pub async fn process(
    worker_id: usize,
    job: Job,
    ctx: StageContext,
    producer: ResultProducer,
    metrics: Arc<Metrics>,
) {
    let Job {
        event,
        retry_count,
        delivery,
    } = job;

    let Some(stage) = pipeline::route(&event.key) else {
        tracing::debug!(worker = worker_id, key = %event.key, "no stage for key prefix, ignoring");
        metrics.inc_ignored();
        let _ = delivery.ack(BasicAckOptions::default()).await;
        return;
    };

    metrics.inc_in_flight();

    let retry_info = if retry_count > 0 {
        format!(" [retry {}/{}]", retry_count, MAX_RETRIES)
    } else {
        String::new()
    };

    tracing::info!(
        worker = worker_id,
        stage = stage.name(),
        key = %event.key,
        "▶️  event{}",
        retry_info
    );

    let outcome = match stage {
        Stage::Transcribe => pipeline::run_transcribe(&ctx, &event).await,
        Stage::Convert => pipeline::run_convert(&ctx, &event).await,
    };

    match outcome {
        // ── Success ────────────────────────────────────────────────────────────
        Ok(result) => {
            match producer.publish_result(&result).await {
                Ok(_) => {
                    match stage {
                        Stage::Transcribe => metrics.inc_submitted(),
                        Stage::Convert => metrics.inc_converted(),
                    }
                    tracing::info!(
                        worker = worker_id,
                        stage = stage.name(),
                        docket = %result.docket,
                        output = result.output_key.as_deref().unwrap_or(""),
                        "✅ done"
                    );
                    let _ = delivery.ack(BasicAckOptions::default()).await;
                }
                Err(e) => {
                    tracing::error!(
                        worker = worker_id,
                        stage = stage.name(),
                        error = %e,
                        "❌ result publish failed, NACKing"
                    );
                    nack_requeue(&delivery).await;
                }
            }
        }

        // ── Deterministic failure ──────────────────────────────────────────────
        // Publish a final error result and ACK immediately; the retry
        // system is never entered because the input cannot change.
        Err(e) if e.is_deterministic() => {
            metrics.inc_failed();
            tracing::warn!(
                worker = worker_id,
                stage = stage.name(),
                key = %event.key,
                "validation error (no retry): {}",
                e
            );
            publish_error_and_ack(worker_id, &delivery, &event, stage, &producer, e.to_string())
                .await;
        }

        // ── Transient failure ──────────────────────────────────────────────────
        Err(e) => {
            tracing::warn!(
                worker = worker_id,
                stage = stage.name(),
                key = %event.key,
                "processing error: {}",
                e
            );
            handle_failure(
                worker_id,
                &delivery,
                &event,
                stage,
                retry_count,
                &producer,
                metrics.as_ref(),
                e.to_string(),
            )
            .await;
        }
    }

    metrics.dec_in_flight();
}

// ── Private helpers ────────────────────────────────────────────────────────────

/// Retry a transient failure, or give up and publish a final error result.
#[allow(clippy::too_many_arguments)]
async fn handle_failure(
    worker_id: usize,
    delivery: &Delivery,
    event: &StorageEvent,
    stage: Stage,
    retry_count: i32,
    producer: &ResultProducer,
    metrics: &Metrics,
    error_message: String,
) {
    let policy = RetryPolicy::default();

    match policy.decide(retry_count) {
        RetryDecision::Retry { next_attempt } => {
            metrics.inc_retried();
            tracing::info!(
                worker = worker_id,
                stage = stage.name(),
                key = %event.key,
                "🔄 retry {}/{}",
                next_attempt,
                MAX_RETRIES
            );

            match producer.publish_retry(&delivery.data, next_attempt).await {
                Ok(_) => {
                    let _ = delivery.ack(BasicAckOptions::default()).await;
                }
                Err(e) => {
                    tracing::error!(
                        worker = worker_id,
                        stage = stage.name(),
                        error = %e,
                        "❌ retry publish failed, NACKing"
                    );
                    nack_requeue(delivery).await;
                }
            }
        }
        RetryDecision::GiveUp => {
            metrics.inc_failed();
            tracing::error!(
                worker = worker_id,
                stage = stage.name(),
                key = %event.key,
                "❌ failed (max retries): {}",
                error_message
            );
            publish_error_and_ack(worker_id, delivery, event, stage, producer, error_message)
                .await;
        }
    }
}

/// Publish a final error result and ACK.
/// On publish failure, NACK with requeue=true.
async fn publish_error_and_ack(
    worker_id: usize,
    delivery: &Delivery,
    event: &StorageEvent,
    stage: Stage,
    producer: &ResultProducer,
    error_message: String,
) {
    // When the failure is that no docket could be extracted, the raw key
    // is the only correlation handle left.
    let result = StageResult::failure(
        event.key.clone(),
        stage.name(),
        event.bucket.clone(),
        error_message,
    );

    match producer.publish_result(&result).await {
        Ok(_) => {
            let _ = delivery.ack(BasicAckOptions::default()).await;
        }
        Err(e) => {
            tracing::error!(
                worker = worker_id,
                stage = stage.name(),
                error = %e,
                "❌ error publish failed, NACKing"
            );
            nack_requeue(delivery).await;
        }
    }
}

async fn nack_requeue(delivery: &Delivery) {
    let _ = delivery
        .nack(BasicNackOptions {
            multiple: false,
            requeue: true,
        })
        .await;
}
