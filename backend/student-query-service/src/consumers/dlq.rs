//! Dead Letter Queue (DLQ) publisher
//!
//! Student events that could not be applied to the projection are forwarded
//! to `<topic>.dlq` together with the error and their source position, so
//! they can be inspected and replayed.

use chrono::{DateTime, Utc};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};

/// Where a consumed message came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSource {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// DLQ message format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterMessage {
    pub source: MessageSource,
    /// Original payload, lossily decoded as UTF-8
    pub payload: String,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_code: Option<String>,
    /// Processing attempts made before giving up
    pub attempts: u32,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
}

impl DeadLetterMessage {
    pub fn new(source: MessageSource, payload: &[u8], error: &ServiceError, attempts: u32) -> Self {
        // Best effort: the payload may not be a valid event at all.
        let value = serde_json::from_slice::<serde_json::Value>(payload).ok();
        let event_type = value
            .as_ref()
            .and_then(|v| v.get("eventType"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let student_code = value
            .as_ref()
            .and_then(|v| v.pointer("/student/code"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Self {
            source,
            payload: String::from_utf8_lossy(payload).into_owned(),
            error: error.to_string(),
            event_type,
            student_code,
            attempts,
            correlation_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Partition key on the DLQ topic; keeps a student's failures together.
    pub fn key(&self) -> &str {
        self.student_code.as_deref().unwrap_or(&self.correlation_id)
    }
}

/// Destination for messages the projector gave up on
#[async_trait::async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn send(&self, message: &DeadLetterMessage) -> ServiceResult<()>;
}

pub struct DeadLetterPublisher {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl DeadLetterPublisher {
    pub fn new(brokers: &str, topic: &str, timeout_ms: u64) -> ServiceResult<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", timeout_ms.to_string())
            .set("acks", "all")
            .create()?;

        Ok(Self {
            producer,
            topic: topic.to_string(),
            timeout: Duration::from_millis(timeout_ms),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait::async_trait]
impl DeadLetterSink for DeadLetterPublisher {
    async fn send(&self, message: &DeadLetterMessage) -> ServiceResult<()> {
        let payload = serde_json::to_string(message)?;

        let record = FutureRecord::to(&self.topic)
            .key(message.key())
            .payload(&payload);

        match self.producer.send(record, self.timeout).await {
            Ok((partition, offset)) => {
                debug!(
                    topic = %self.topic,
                    partition = partition,
                    offset = offset,
                    correlation_id = %message.correlation_id,
                    "Sent student event to DLQ"
                );
                Ok(())
            }
            Err((e, _)) => {
                error!(
                    error = %e,
                    correlation_id = %message.correlation_id,
                    "Failed to send student event to DLQ"
                );
                Err(ServiceError::Kafka(e))
            }
        }
    }
}
