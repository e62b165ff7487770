//! Broker session (AMQP 0-9-1).
//!
//! A [`QueueTransport`] owns one connection and one channel. Connecting
//! declares the job queue as durable and sets the channel prefetch to 1, so
//! a consuming worker holds at most one unacknowledged delivery. Jobs go to
//! the default exchange with the queue name as routing key, marked
//! persistent.
//!
//! There is no reconnect loop: a [`TransportError`] is fatal to the task
//! that owns the session.

use async_trait::async_trait;
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use std::time::Duration;
use thiserror::Error;

/// Persistent delivery mode: the message survives a broker restart.
const DELIVERY_MODE_PERSISTENT: u8 = 2;
const CONTENT_TYPE_JSON: &str = "application/json";
const PREFETCH: u16 = 1;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),
    #[error("Publish timed out after {0:?}")]
    Timeout(Duration),
    #[error("Broker closed the session")]
    Closed,
}

/// Destination for encoded jobs.
///
/// [`QueueTransport`] is the production sink; tests substitute an in-memory
/// queue.
#[async_trait]
pub trait JobSink: Send + Sync {
    /// Hand one encoded job to the broker.
    async fn send(&self, payload: &[u8]) -> Result<(), TransportError>;
}

/// One broker connection + channel bound to the job queue.
pub struct QueueTransport {
    connection: Connection,
    channel: Channel,
    queue: String,
}

impl QueueTransport {
    /// Connect, open a channel, set prefetch and declare the durable queue.
    pub async fn connect(uri: &str, queue: &str) -> Result<Self, TransportError> {
        let connection = Connection::connect(uri, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        channel
            .basic_qos(PREFETCH, BasicQosOptions::default())
            .await?;
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        tracing::debug!(queue, "broker session open");

        Ok(Self {
            connection,
            channel,
            queue: queue.to_string(),
        })
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Publish one persistent JSON message to the job queue.
    pub async fn publish(&self, payload: &[u8]) -> Result<(), TransportError> {
        self.channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default()
                    .with_content_type(CONTENT_TYPE_JSON.into())
                    .with_delivery_mode(DELIVERY_MODE_PERSISTENT),
            )
            .await?
            .await?;
        Ok(())
    }

    /// Start a manual-ack subscription on the job queue.
    pub async fn subscribe(&self, consumer_tag: &str) -> Result<lapin::Consumer, TransportError> {
        let consumer = self
            .channel
            .basic_consume(
                &self.queue,
                consumer_tag,
                BasicConsumeOptions {
                    no_ack: false,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(consumer)
    }

    /// Close the channel, then the connection.
    pub async fn close(&self) -> Result<(), TransportError> {
        self.channel.close(200, "shutdown").await?;
        self.connection.close(200, "shutdown").await?;
        tracing::debug!(queue = %self.queue, "broker session closed");
        Ok(())
    }
}

#[async_trait]
impl JobSink for QueueTransport {
    async fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        self.publish(payload).await
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// In-memory sink recording every payload. `fail_after` makes sends
    /// past that count fail; `stall` makes every send hang.
    #[derive(Default)]
    pub struct MemorySink {
        pub sent: Mutex<Vec<Vec<u8>>>,
        pub fail_after: Option<usize>,
        pub stall: bool,
    }

    impl MemorySink {
        pub fn payloads(&self) -> Vec<Vec<u8>> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JobSink for MemorySink {
        async fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
            if self.stall {
                futures::future::pending::<()>().await;
            }
            let mut sent = self.sent.lock().unwrap();
            if self.fail_after.is_some_and(|n| sent.len() >= n) {
                return Err(TransportError::Closed);
            }
            sent.push(payload.to_vec());
            Ok(())
        }
    }

    #[tokio::test]
    async fn memory_sink_records_in_order() {
        let sink = MemorySink::default();
        sink.send(b"one").await.unwrap();
        sink.send(b"two").await.unwrap();
        assert_eq!(sink.payloads(), vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[tokio::test]
    async fn memory_sink_fails_after_limit() {
        let sink = MemorySink {
            fail_after: Some(1),
            ..MemorySink::default()
        };
        sink.send(b"one").await.unwrap();
        assert!(sink.send(b"two").await.is_err());
        assert_eq!(sink.payloads().len(), 1);
    }
}
