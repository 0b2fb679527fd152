use lapin::{
    options::{
        BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
    },
    types::{AMQPValue, FieldTable},
    BasicProperties, Channel, ExchangeKind,
};

use crate::model::StageResult;

use super::rabbit::{
    Pool, EVENTS_EXCHANGE, EVENTS_ROUTING_KEY, RESULTS_EXCHANGE, RESULTS_QUEUE,
    RESULTS_ROUTING_KEY, RETRY_EXCHANGE, RETRY_QUEUE, RETRY_ROUTING_KEY, RETRY_TTL_MS,
};

// ── Error ──────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ProducerError {
    Connection(String),
    Channel(String),
    Topology(String),
    Serialize(String),
    Publish(String),
}

impl std::fmt::Display for ProducerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection(m) => write!(f, "producer connection error: {m}"),
            Self::Channel(m) => write!(f, "producer channel error: {m}"),
            Self::Topology(m) => write!(f, "topology declaration failed: {m}"),
            Self::Serialize(m) => write!(f, "serialization failed: {m}"),
            Self::Publish(m) => write!(f, "publish failed: {m}"),
        }
    }
}

impl std::error::Error for ProducerError {}

// ── ResultProducer ─────────────────────────────────────────────────────────────

/// Publishes per-stage outcome messages and retry re-deliveries.
///
/// Holds a single AMQP channel for all outbound publishing; the channel
/// keeps the parent connection alive (lapin is Arc-backed).
///
/// # Sharing across workers
/// `ResultProducer` implements `Clone` — cloning is cheap (Arc increment
/// on the channel). Each worker holds its own clone and publishes
/// concurrently; lapin serialises writes to the underlying channel
/// internally.
#[derive(Clone)]
pub struct ResultProducer {
    channel: Channel,
}

impl ResultProducer {
    /// Create the producer: obtain a connection from `pool`, open a
    /// channel, and declare the producer-side topology (results + retry).
    pub async fn new(pool: &Pool) -> Result<Self, ProducerError> {
        let conn = pool
            .get()
            .await
            .map_err(|e| ProducerError::Connection(e.to_string()))?;

        let channel = conn
            .create_channel()
            .await
            .map_err(|e| ProducerError::Channel(e.to_string()))?;

        // conn (pool Object) drops here; channel's Arc<Connection> keeps
        // the underlying TCP connection alive.

        declare_topology(&channel).await?;

        tracing::info!("[Producer] connected and ready");

        Ok(Self { channel })
    }

    // ── Public publish API ─────────────────────────────────────────────────────

    /// Publish a per-stage outcome (success or final failure) to the
    /// results queue.
    pub async fn publish_result(&self, result: &StageResult) -> Result<(), ProducerError> {
        let body = serde_json::to_vec(result)
            .map_err(|e| ProducerError::Serialize(e.to_string()))?;

        let props = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2); // persistent

        self.channel
            .basic_publish(
                RESULTS_EXCHANGE,
                RESULTS_ROUTING_KEY,
                BasicPublishOptions::default(),
                &body,
                props,
            )
            .await
            .map_err(|e| ProducerError::Publish(e.to_string()))?;

        Ok(())
    }

    /// Re-publish an event body to the retry queue with the next attempt
    /// number in the `x-retry-count` header.
    ///
    /// The retry queue's TTL (5 s) and DLX route the message back to the
    /// events queue automatically, so the event is re-delivered as if the
    /// bucket had published it again — body bit-for-bit identical.
    pub async fn publish_retry(
        &self,
        event_body: &[u8],
        next_attempt: i32,
    ) -> Result<(), ProducerError> {
        let mut headers = FieldTable::default();
        headers.insert("x-retry-count".into(), AMQPValue::LongInt(next_attempt));

        let props = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2) // persistent
            .with_headers(headers);

        self.channel
            .basic_publish(
                RETRY_EXCHANGE,
                RETRY_ROUTING_KEY,
                BasicPublishOptions::default(),
                event_body,
                props,
            )
            .await
            .map_err(|e| ProducerError::Publish(e.to_string()))?;

        Ok(())
    }
}

// ── Topology ───────────────────────────────────────────────────────────────────

/// Declare the producer-side AMQP topology.
///
/// **Results:** durable direct exchange + durable queue + binding.
///
/// **Retry:** durable direct exchange + durable queue with
/// `x-message-ttl` and a dead-letter route back to [`EVENTS_EXCHANGE`]
/// via [`EVENTS_ROUTING_KEY`], + binding.
async fn declare_topology(channel: &Channel) -> Result<(), ProducerError> {
    // ── Results ──────────────────────────────────────────────────────────────

    channel
        .exchange_declare(
            RESULTS_EXCHANGE,
            ExchangeKind::Direct,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| ProducerError::Topology(format!("exchange '{RESULTS_EXCHANGE}': {e}")))?;

    channel
        .queue_declare(
            RESULTS_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| ProducerError::Topology(format!("queue '{RESULTS_QUEUE}': {e}")))?;

    channel
        .queue_bind(
            RESULTS_QUEUE,
            RESULTS_EXCHANGE,
            RESULTS_ROUTING_KEY,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| {
            ProducerError::Topology(format!(
                "bind '{RESULTS_QUEUE}' → '{RESULTS_EXCHANGE}': {e}"
            ))
        })?;

    // ── Retry ─────────────────────────────────────────────────────────────────

    channel
        .exchange_declare(
            RETRY_EXCHANGE,
            ExchangeKind::Direct,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| ProducerError::Topology(format!("exchange '{RETRY_EXCHANGE}': {e}")))?;

    // Retry queue — durable with TTL and Dead Letter Exchange back to the
    // events queue.
    let mut retry_args = FieldTable::default();
    retry_args.insert("x-message-ttl".into(), AMQPValue::LongInt(RETRY_TTL_MS));
    retry_args.insert(
        "x-dead-letter-exchange".into(),
        AMQPValue::LongString(EVENTS_EXCHANGE.as_bytes().to_vec().into()),
    );
    retry_args.insert(
        "x-dead-letter-routing-key".into(),
        AMQPValue::LongString(EVENTS_ROUTING_KEY.as_bytes().to_vec().into()),
    );

    channel
        .queue_declare(
            RETRY_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            retry_args,
        )
        .await
        .map_err(|e| ProducerError::Topology(format!("queue '{RETRY_QUEUE}': {e}")))?;

    channel
        .queue_bind(
            RETRY_QUEUE,
            RETRY_EXCHANGE,
            RETRY_ROUTING_KEY,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| {
            ProducerError::Topology(format!(
                "bind '{RETRY_QUEUE}' → '{RETRY_EXCHANGE}': {e}"
            ))
        })?;

    Ok(())
}
