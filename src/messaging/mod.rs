mod consumer;
mod producer;
mod rabbit;

pub use consumer::{ConsumerError, EventConsumer, Job};
pub use producer::{ProducerError, ResultProducer};
pub use rabbit::{build_pool, Pool, RabbitError};
