use std::sync::Arc;

use crate::config::Config;
use crate::convert::CommandRenderer;
use crate::messaging::{build_pool, EventConsumer, ResultProducer};
use crate::metrics::Metrics;
use crate::pipeline::{PipelineSettings, StageContext};
use crate::shutdown;
use crate::storage::HttpObjectStore;
use crate::transcribe::TranscribeClient;
use crate::worker::WorkerPool;

// ── Error type ─────────────────────────────────────────────────────────────────

/// Top-level application error, surfaced only at startup.
/// Each variant wraps the underlying cause so `main.rs` can log it cleanly
/// without depending on every sub-module type.
#[derive(Debug)]
pub enum AppError {
    Config(crate::config::ConfigError),
    Io(std::io::Error),
    RabbitMQ(crate::messaging::RabbitError),
    Consumer(crate::messaging::ConsumerError),
    Producer(crate::messaging::ProducerError),
    Pool(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(e)   => write!(f, "config error: {e}"),
            Self::Io(e)       => write!(f, "io error: {e}"),
            Self::RabbitMQ(e) => write!(f, "rabbitmq pool error: {e}"),
            Self::Consumer(e) => write!(f, "consumer error: {e}"),
            Self::Producer(e) => write!(f, "producer error: {e}"),
            Self::Pool(e)     => write!(f, "worker pool error: {e}"),
        }
    }
}

// ── Entry point ────────────────────────────────────────────────────────────────

/// Full application lifecycle.
///
/// # Startup sequence
/// 1. Load and validate configuration from environment variables.
/// 2. Create the temporary working directory (`TMP_DIR`).
/// 3. Build the RabbitMQ connection pool.
/// 4. Construct the shared HTTP clients for the transcription gateway and
///    the object store (one `reqwest::Client`, one connection pool).
/// 5. Wire up consumer → producer → worker pool.
/// 6. Run until SIGINT / SIGTERM, then drain and exit.
pub async fn run() -> Result<(), AppError> {
    // ── 1. Configuration ──────────────────────────────────────────────────────
    let cfg = Config::load().map_err(AppError::Config)?;
    cfg.log_summary();

    // ── 2. Temporary directory ────────────────────────────────────────────────
    std::fs::create_dir_all(&cfg.tmp_dir).map_err(AppError::Io)?;
    tracing::debug!(path = %cfg.tmp_dir.display(), "ensured tmp_dir exists");

    // ── 3. Metrics ────────────────────────────────────────────────────────────
    let metrics = Arc::new(Metrics::new());

    // ── 4. Shutdown pair ──────────────────────────────────────────────────────
    // The handle is held here; the signal is cloned into the worker pool so it
    // can break its dispatch loop on demand.
    let (shutdown_handle, shutdown_signal) = shutdown::new_pair();

    // ── 5. RabbitMQ pool ──────────────────────────────────────────────────────
    // Allocate slightly more connections than workers so the consumer and
    // producer have dedicated channels without competing with workers.
    let pool_size = cfg.workers_count + 2;
    tracing::info!("🔌 connecting to RabbitMQ (pool_size={pool_size})...");
    let rabbit_pool = build_pool(&cfg.rabbitmq_url, pool_size)
        .await
        .map_err(AppError::RabbitMQ)?;
    tracing::info!("🔌 RabbitMQ connected");

    // ── 6. External service clients ───────────────────────────────────────────
    // One reqwest::Client for both HTTP services — it is an Arc around a
    // connection pool, so cloning shares the pool.
    let http = reqwest::Client::new();
    let service = Arc::new(TranscribeClient::new(http.clone(), &cfg.transcribe_url));
    let store = Arc::new(HttpObjectStore::new(http, &cfg.storage_url));
    let renderer = Arc::new(CommandRenderer::new(&cfg.renderer_cmd));

    let ctx = StageContext {
        service,
        store,
        renderer,
        settings: PipelineSettings::from_config(&cfg),
    };

    // ── 7. Producer ───────────────────────────────────────────────────────────
    let producer = ResultProducer::new(&rabbit_pool)
        .await
        .map_err(AppError::Producer)?;

    // ── 8. Consumer ───────────────────────────────────────────────────────────
    // prefetch_count = workers_count keeps unacked deliveries bounded by
    // the pool's concurrency.
    let consumer = EventConsumer::new(&rabbit_pool, cfg.workers_count as u16)
        .await
        .map_err(AppError::Consumer)?;

    // Spawns an internal consume_loop task and returns the job receiver.
    let jobs_rx = consumer
        .into_receiver()
        .await
        .map_err(AppError::Consumer)?;

    // ── 9. Worker pool ────────────────────────────────────────────────────────
    let pool = WorkerPool::new(ctx, producer, cfg.workers_count, Arc::clone(&metrics));

    tracing::info!(
        workers = cfg.workers_count,
        "✅ docketscribe ready — waiting for bucket events"
    );

    // ── 10. Concurrent run + OS-signal wait ───────────────────────────────────
    // The pool runs in a background task so we can simultaneously wait for an
    // OS signal on the current task without blocking the pool dispatch loop.
    let pool_task = tokio::spawn(pool.run(jobs_rx, shutdown_signal));

    // Block until SIGINT or SIGTERM is received.
    shutdown::wait_for_os_signal().await;
    tracing::info!("🛑 signal received — initiating graceful shutdown...");

    // ── 11. Graceful shutdown ─────────────────────────────────────────────────
    // Trigger causes the pool dispatch loop to break, then it drops the
    // internal channel so workers drain and exit.
    shutdown_handle.trigger();

    // Await the pool task; it returns only after all worker handles are joined.
    pool_task
        .await
        .map_err(|e| AppError::Pool(e.to_string()))?;

    metrics.log_summary();
    tracing::info!("✅ shutdown complete — goodbye");
    Ok(())
}
