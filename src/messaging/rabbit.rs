use std::time::Duration;

use deadpool_lapin::Manager;
use lapin::ConnectionProperties;

/// Re-exported so other modules inside `messaging/` can import Pool from here.
pub type Pool = deadpool_lapin::Pool;

// ── Event-side topology ────────────────────────────────────────────────────────
// The bucket publishes its object-creation notifications here (MinIO AMQP
// notification target). The exchange/routing-key pair below must match the
// bucket's notification configuration.

/// Direct exchange the storage service publishes bucket events to.
pub const EVENTS_EXCHANGE: &str = "bucketevents";
/// Durable queue bound to [`EVENTS_EXCHANGE`] for incoming notifications.
pub const EVENTS_QUEUE: &str = "docketscribe_events";
/// Routing key for object-creation notifications.
pub const EVENTS_ROUTING_KEY: &str = "bucketevents.created";

// ── Result-side topology ───────────────────────────────────────────────────────

/// Direct exchange to which per-stage outcome messages are published.
pub const RESULTS_EXCHANGE: &str = "docketscribe_results_exchange";
/// Durable queue that collects outcome messages.
pub const RESULTS_QUEUE: &str = "docketscribe_results";
/// Routing key for outcome messages.
pub const RESULTS_ROUTING_KEY: &str = "pipeline.result";

// ── Retry-side topology ────────────────────────────────────────────────────────

/// Direct exchange for retry messages.
pub const RETRY_EXCHANGE: &str = "docketscribe_retry_exchange";
/// Routing key for retry messages.
pub const RETRY_ROUTING_KEY: &str = "pipeline.retry";
/// Durable queue with TTL and DLX that re-routes expired messages back to
/// the events queue.
pub const RETRY_QUEUE: &str = "docketscribe_retry_queue";

/// `x-message-ttl` on the retry queue in milliseconds. After this delay,
/// RabbitMQ routes the message back to [`EVENTS_EXCHANGE`] via the DLX.
pub const RETRY_TTL_MS: i32 = 5_000;

// ── Connection retry ───────────────────────────────────────────────────────────

const MAX_CONNECT_ATTEMPTS: u32 = 10;
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

// ── Error ──────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum RabbitError {
    /// Could not establish a connection after all retry attempts.
    Connection(String),
    /// Failed to build the connection pool itself.
    Pool(String),
}

impl std::fmt::Display for RabbitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "RabbitMQ connection failed: {msg}"),
            Self::Pool(msg) => write!(f, "connection pool build failed: {msg}"),
        }
    }
}

impl std::error::Error for RabbitError {}

// ── Pool constructor ───────────────────────────────────────────────────────────

/// Build a [`deadpool_lapin`] connection pool and verify connectivity,
/// attempting up to [`MAX_CONNECT_ATTEMPTS`] times with a fixed delay so
/// the service survives starting before the broker does.
///
/// `max_connections` should be at least `WORKERS_COUNT + 2` to cover the
/// consumer and producer channels as well as any headroom.
pub async fn build_pool(url: &str, max_connections: usize) -> Result<Pool, RabbitError> {
    let manager = Manager::new(url, ConnectionProperties::default());

    let pool = Pool::builder(manager)
        .max_size(max_connections)
        .build()
        .map_err(|e| RabbitError::Pool(e.to_string()))?;

    for attempt in 1..=MAX_CONNECT_ATTEMPTS {
        match pool.get().await {
            Ok(_) => {
                tracing::info!("📡 RabbitMQ connected");
                return Ok(pool);
            }
            Err(e) if attempt < MAX_CONNECT_ATTEMPTS => {
                tracing::warn!(
                    attempt,
                    max = MAX_CONNECT_ATTEMPTS,
                    error = %e,
                    "⚠️  RabbitMQ not ready, retrying in {}s...",
                    CONNECT_RETRY_INTERVAL.as_secs()
                );
                tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
            }
            Err(e) => {
                return Err(RabbitError::Connection(format!(
                    "failed after {MAX_CONNECT_ATTEMPTS} attempts: {e}"
                )));
            }
        }
    }

    unreachable!()
}
