use futures_util::StreamExt;
use lapin::{
    message::Delivery,
    options::{
        BasicConsumeOptions, BasicNackOptions, BasicQosOptions, ExchangeDeclareOptions,
        QueueBindOptions, QueueDeclareOptions,
    },
    types::FieldTable,
    Channel, Consumer as LapinConsumer, ExchangeKind,
};
use tokio::sync::mpsc;

use crate::event::StorageEvent;

use super::rabbit::{Pool, EVENTS_EXCHANGE, EVENTS_QUEUE, EVENTS_ROUTING_KEY};

// ── Public types ───────────────────────────────────────────────────────────────

/// A decoded storage event ready for a pipeline worker.
///
/// Carries the parsed event, the retry count overlaid from the AMQP
/// header, and the raw lapin [`Delivery`]. The worker is responsible for
/// calling `delivery.ack()` / `delivery.nack()` once the event is
/// processed; `delivery.data` still holds the original notification body
/// so a retry republishes it bit-for-bit.
pub struct Job {
    pub event: StorageEvent,
    /// Number of times this event has already been attempted.
    pub retry_count: i32,
    pub delivery: Delivery,
}

// ── Error ──────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConsumerError {
    Connection(String),
    Channel(String),
    Topology(String),
    Qos(String),
    Start(String),
}

impl std::fmt::Display for ConsumerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection(m) => write!(f, "consumer connection error: {m}"),
            Self::Channel(m) => write!(f, "consumer channel error: {m}"),
            Self::Topology(m) => write!(f, "topology declaration failed: {m}"),
            Self::Qos(m) => write!(f, "QoS setup failed: {m}"),
            Self::Start(m) => write!(f, "failed to start consuming: {m}"),
        }
    }
}

impl std::error::Error for ConsumerError {}

// ── EventConsumer ──────────────────────────────────────────────────────────────

/// Consumes bucket notifications from RabbitMQ.
///
/// Holds its own AMQP channel (which keeps the underlying connection
/// alive via `Arc`). Call [`into_receiver`](Self::into_receiver) to start
/// consuming and obtain the job channel used by the worker pool.
pub struct EventConsumer {
    channel: Channel,
    prefetch_count: u16,
}

impl EventConsumer {
    /// Create the consumer: obtain a connection from `pool`, open a
    /// channel, declare the event-side topology, and configure QoS.
    ///
    /// `prefetch_count` is set equal to `WORKERS_COUNT` so the broker
    /// pushes no more unacked notifications than there are workers.
    pub async fn new(pool: &Pool, prefetch_count: u16) -> Result<Self, ConsumerError> {
        let conn = pool
            .get()
            .await
            .map_err(|e| ConsumerError::Connection(e.to_string()))?;

        let channel = conn
            .create_channel()
            .await
            .map_err(|e| ConsumerError::Channel(e.to_string()))?;

        // conn (pool Object) drops here; channel's internal Arc<Connection>
        // keeps the underlying TCP connection alive.

        declare_topology(&channel).await?;

        channel
            .basic_qos(prefetch_count, BasicQosOptions { global: false })
            .await
            .map_err(|e| ConsumerError::Qos(e.to_string()))?;

        tracing::info!(queue = EVENTS_QUEUE, prefetch = prefetch_count, "consumer ready");

        Ok(Self {
            channel,
            prefetch_count,
        })
    }

    /// Start consuming and return the receiver end of the job channel.
    ///
    /// Spawns a background task that reads deliveries from the lapin
    /// stream, NACKs unparseable bodies without requeue (a malformed
    /// notification never becomes parseable), overlays `retry_count` from
    /// the `x-retry-count` header, and forwards valid [`Job`]s.
    pub async fn into_receiver(self) -> Result<mpsc::Receiver<Job>, ConsumerError> {
        let capacity = (self.prefetch_count as usize) * 2;
        let (tx, rx) = mpsc::channel::<Job>(capacity);

        let lapin_consumer = self
            .channel
            .basic_consume(
                EVENTS_QUEUE,
                "docketscribe",
                BasicConsumeOptions {
                    no_ack: false, // manual ACK after stage processing
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| ConsumerError::Start(e.to_string()))?;

        // The lapin Consumer holds an Arc reference to the channel (and
        // thus the connection). Spawning it moves the channel's lifetime
        // into the task.
        tokio::spawn(consume_loop(lapin_consumer, tx));

        tracing::info!(queue = EVENTS_QUEUE, "▶️  consuming bucket events");

        Ok(rx)
    }
}

// ── Background task ────────────────────────────────────────────────────────────

/// Maps raw lapin deliveries into [`Job`] items.
/// Runs as a persistent `tokio::spawn`ed task for the application lifetime.
async fn consume_loop(mut consumer: LapinConsumer, tx: mpsc::Sender<Job>) {
    while let Some(result) = consumer.next().await {
        let delivery = match result {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(error = %e, "consumer stream error");
                break;
            }
        };

        let event = match StorageEvent::from_json(&delivery.data) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "⚠️  invalid notification — NACKing without requeue");
                let _ = delivery
                    .nack(BasicNackOptions {
                        multiple: false,
                        requeue: false,
                    })
                    .await;
                continue;
            }
        };

        tracing::debug!(bucket = %event.bucket, key = %event.key, "event received");

        let retry_count = extract_retry_count(&delivery).unwrap_or(0);
        let job = Job {
            event,
            retry_count,
            delivery,
        };

        if tx.send(job).await.is_err() {
            // The receiver was dropped — the application is shutting down.
            break;
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────────

/// Extract `x-retry-count` from AMQP headers, accepting any integer width
/// a publisher might have used.
fn extract_retry_count(delivery: &Delivery) -> Option<i32> {
    use lapin::types::AMQPValue;

    delivery
        .properties
        .headers()
        .as_ref()?
        .inner()
        .get("x-retry-count")
        .and_then(|v| match v {
            AMQPValue::LongInt(n) => Some(*n),
            AMQPValue::LongLongInt(n) => Some(*n as i32),
            AMQPValue::ShortInt(n) => Some(*n as i32),
            AMQPValue::ShortShortInt(n) => Some(*n as i32),
            _ => None,
        })
}

/// Declare the event-side AMQP topology: durable direct exchange, durable
/// queue, binding. The storage service's notification target must point
/// at [`EVENTS_EXCHANGE`] with [`EVENTS_ROUTING_KEY`].
async fn declare_topology(channel: &Channel) -> Result<(), ConsumerError> {
    channel
        .exchange_declare(
            EVENTS_EXCHANGE,
            ExchangeKind::Direct,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| ConsumerError::Topology(format!("exchange '{EVENTS_EXCHANGE}': {e}")))?;

    channel
        .queue_declare(
            EVENTS_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| ConsumerError::Topology(format!("queue '{EVENTS_QUEUE}': {e}")))?;

    channel
        .queue_bind(
            EVENTS_QUEUE,
            EVENTS_EXCHANGE,
            EVENTS_ROUTING_KEY,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| {
            ConsumerError::Topology(format!(
                "bind '{EVENTS_QUEUE}' → '{EVENTS_EXCHANGE}' via '{EVENTS_ROUTING_KEY}': {e}"
            ))
        })?;

    Ok(())
}
