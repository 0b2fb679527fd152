use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::messaging::{Job, ResultProducer};
use crate::metrics::Metrics;
use crate::pipeline::StageContext;
use crate::shutdown::ShutdownSignal;

use super::task;

/// Concurrent worker pool.
///
/// Owns a fixed set of async worker tasks. Each worker pulls bucket events
/// off a shared channel and drives the matching pipeline stage.
///
/// # Architecture
///
/// ```text
/// jobs_rx (mpsc from EventConsumer)
///     │
///     │  dispatch loop — backpressure point
///     ▼
/// internal_channel  (bounded, capacity = workers × 2)
///     │
///     │  Arc<Mutex<Receiver>>  — shared among N worker tasks
///     ▼
/// Worker-0 ──► task::process ──► transcribe / convert stage
/// Worker-1 ──► task::process ──► transcribe / convert stage
/// ...
/// Worker-N ──► task::process ──► transcribe / convert stage
/// ```
///
/// # Backpressure
/// The internal channel capacity (`workers × 2`) limits how far ahead the
/// dispatch loop can run. When the channel is full (all workers busy plus
/// the buffer), `send().await` in the dispatch loop blocks, which in turn
/// prevents new `recv()` calls on `jobs_rx`. Because the RabbitMQ consumer
/// has `prefetch_count = workers_count`, the broker holds back new deliveries
/// until a worker ACKs one, completing the backpressure chain.
///
/// # Load distribution
/// All workers share a single `Arc<Mutex<mpsc::Receiver<Job>>>`. A free
/// worker locks the receiver, takes the next job, and immediately releases
/// the lock to process it.
///
/// # Shutdown
/// When the dispatch loop exits (shutdown signal or `jobs_rx` closed), the
/// internal sender is dropped, workers see `None` from `recv()` and stop.
/// `run()` awaits all handles before returning, ensuring in-flight events
/// complete gracefully.
pub struct WorkerPool {
    ctx: StageContext,
    producer: ResultProducer,
    workers_count: usize,
    metrics: Arc<Metrics>,
}

impl WorkerPool {
    /// Create a pool with the given shared resources and concurrency level.
    ///
    /// - `ctx` — shared stage collaborators; cloned cheaply (Arc) into each worker.
    /// - `producer` — shared channel; cloned cheaply into each worker.
    /// - `workers_count` — the `WORKERS_COUNT` env var.
    pub fn new(
        ctx: StageContext,
        producer: ResultProducer,
        workers_count: usize,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            ctx,
            producer,
            workers_count,
            metrics,
        }
    }

    /// Start processing and block until shutdown.
    ///
    /// Call this from `app.rs` after the consumer is running.
    pub async fn run(self, mut jobs_rx: mpsc::Receiver<Job>, mut shutdown_signal: ShutdownSignal) {
        // ── Internal bounded channel ──────────────────────────────────────────
        let (internal_tx, internal_rx) = mpsc::channel::<Job>(self.workers_count * 2);

        // Wrap receiver in Arc<Mutex> so all workers can share it.
        // tokio::sync::Mutex is required because we await (recv) while holding it.
        let shared_rx: Arc<Mutex<mpsc::Receiver<Job>>> = Arc::new(Mutex::new(internal_rx));

        // ── Spawn N worker tasks ──────────────────────────────────────────────
        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(self.workers_count);

        for worker_id in 0..self.workers_count {
            let rx = Arc::clone(&shared_rx);
            let ctx = self.ctx.clone(); // Arc increments — no client rebuild
            let producer = self.producer.clone();
            let metrics = Arc::clone(&self.metrics);

            let handle = tokio::spawn(async move {
                tracing::debug!(worker = worker_id, "worker started");

                loop {
                    // Acquire lock → receive one job → release lock → process.
                    //
                    // The lock is held only during the recv() await, not during
                    // the (potentially long) task::process(). At most one worker
                    // is blocked waiting for a new job at any time; all others
                    // are either processing or queued on the mutex. For small N
                    // the contention is negligible.
                    let job = {
                        let mut guard = rx.lock().await;
                        guard.recv().await
                    };

                    match job {
                        None => {
                            // Internal sender was dropped → shutdown signal.
                            tracing::debug!(worker = worker_id, "worker stopping");
                            break;
                        }
                        Some(job) => {
                            task::process(
                                worker_id,
                                job,
                                ctx.clone(),
                                producer.clone(),
                                Arc::clone(&metrics),
                            )
                            .await;
                        }
                    }
                }
            });

            handles.push(handle);
        }

        tracing::info!(workers = self.workers_count, "👷 {} workers ready", self.workers_count);

        // ── Dispatch loop ─────────────────────────────────────────────────────
        // Reads from the consumer receiver and forwards to the internal
        // channel. This is the **backpressure point**: when the internal
        // channel is full, send().await blocks here, which stops us from
        // calling jobs_rx.recv() — leaving those unacked messages on the
        // broker.
        //
        // `biased` ensures the shutdown branch is always checked before trying
        // to receive a new job, so a high-throughput stream cannot starve the
        // shutdown signal.
        loop {
            tokio::select! {
                biased;

                _ = shutdown_signal.wait() => {
                    tracing::info!("🛑 shutdown signal received, draining in-flight jobs...");
                    break;
                }

                job = jobs_rx.recv() => {
                    match job {
                        None => break,
                        Some(job) => {
                            self.metrics.inc_received();
                            if internal_tx.send(job).await.is_err() {
                                tracing::error!("internal job channel closed unexpectedly");
                                break;
                            }
                        }
                    }
                }
            }
        }

        // ── Graceful shutdown ─────────────────────────────────────────────────
        // Drop the sender: workers will drain their current job and then see
        // None on the next recv(), causing them to break and exit.
        drop(internal_tx);

        tracing::info!("🛑 draining {} in-flight workers...", handles.len());

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "worker task panicked during shutdown");
            }
        }

        tracing::info!("all workers stopped");
    }
}
