//! Kafka consumer for student events
//!
//! Subscribes to `student-event-topic` with group `student-event-group` and
//! feeds every message to [`StudentQueryService::on_event`]. Offsets are
//! committed manually once a message is settled (applied, dropped or
//! dead-lettered). A message that cannot be settled stops the consumer with
//! its offset uncommitted.

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::dlq::{DeadLetterMessage, DeadLetterSink, MessageSource};
use crate::config::{FailurePolicy, KafkaConfig};
use crate::domain::StudentEvent;
use crate::error::{ServiceError, ServiceResult};
use crate::services::StudentQueryService;

/// How a message ended up after processing
#[derive(Debug)]
pub enum Disposition {
    Applied,
    Dropped { error: ServiceError, attempts: u32 },
    DeadLetter { error: ServiceError, attempts: u32 },
}

/// Decodes payloads and applies the configured failure policy.
/// Kept apart from the Kafka client so it can run without a broker.
pub struct StudentEventHandler {
    service: Arc<StudentQueryService>,
    policy: FailurePolicy,
    max_retries: u32,
    retry_backoff: Duration,
}

impl StudentEventHandler {
    pub fn new(
        service: Arc<StudentQueryService>,
        policy: FailurePolicy,
        max_retries: u32,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            service,
            policy,
            max_retries,
            retry_backoff,
        }
    }

    pub fn from_config(service: Arc<StudentQueryService>, config: &KafkaConfig) -> Self {
        Self::new(
            service,
            config.failure_policy,
            config.max_retries,
            Duration::from_millis(config.retry_backoff_ms),
        )
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub async fn handle(&self, payload: &[u8]) -> Disposition {
        let event: StudentEvent = match serde_json::from_slice(payload) {
            Ok(event) => event,
            Err(e) => return self.settle_failure(ServiceError::Decode(e), 1),
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.service.on_event(event.clone()).await {
                Ok(()) => return Disposition::Applied,
                Err(err) if self.should_retry(&err, attempts) => {
                    let delay = self.retry_backoff * attempts;
                    warn!(
                        error = %err,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Student event failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return self.settle_failure(err, attempts),
            }
        }
    }

    fn should_retry(&self, err: &ServiceError, attempts: u32) -> bool {
        self.policy == FailurePolicy::Retry && err.is_retryable() && attempts <= self.max_retries
    }

    fn settle_failure(&self, error: ServiceError, attempts: u32) -> Disposition {
        match self.policy {
            FailurePolicy::DeadLetter => Disposition::DeadLetter { error, attempts },
            FailurePolicy::Drop | FailurePolicy::Retry => Disposition::Dropped { error, attempts },
        }
    }
}

/// Whether a message may have its offset committed
#[derive(Debug)]
pub enum Settlement {
    /// Applied, dropped by policy, or safely on the DLQ
    Settled,
    /// Nowhere durable holds the message; its offset must not be committed
    Unsettled(ServiceError),
}

impl Settlement {
    pub fn is_settled(&self) -> bool {
        matches!(self, Settlement::Settled)
    }
}

/// Turns a handler disposition into a settlement, publishing to the DLQ
/// when the policy asks for it. Needs no broker for the consumer side.
pub struct MessageProcessor {
    handler: StudentEventHandler,
    dead_letters: Option<Arc<dyn DeadLetterSink>>,
    publish_attempts: u32,
    publish_backoff: Duration,
}

impl MessageProcessor {
    pub fn new(
        handler: StudentEventHandler,
        dead_letters: Option<Arc<dyn DeadLetterSink>>,
        publish_attempts: u32,
        publish_backoff: Duration,
    ) -> Self {
        Self {
            handler,
            dead_letters,
            publish_attempts: publish_attempts.max(1),
            publish_backoff,
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.handler.policy()
    }

    pub async fn process(&self, source: MessageSource, payload: Option<&[u8]>) -> Settlement {
        let payload = match payload {
            Some(payload) => payload,
            None => {
                debug!(
                    "Received Kafka message with empty payload (topic: {}, offset: {})",
                    source.topic, source.offset
                );
                return Settlement::Settled;
            }
        };

        match self.handler.handle(payload).await {
            Disposition::Applied => {
                debug!(offset = source.offset, "Student event applied");
                Settlement::Settled
            }
            Disposition::Dropped { error, attempts } => {
                error!(
                    error = %error,
                    attempts = attempts,
                    partition = source.partition,
                    offset = source.offset,
                    "Dropping student event"
                );
                Settlement::Settled
            }
            Disposition::DeadLetter { error, attempts } => {
                let dead_letter = DeadLetterMessage::new(source, payload, &error, attempts);
                warn!(
                    error = %error,
                    correlation_id = %dead_letter.correlation_id,
                    offset = dead_letter.source.offset,
                    "Routing student event to DLQ"
                );
                self.publish(&dead_letter).await
            }
        }
    }

    async fn publish(&self, dead_letter: &DeadLetterMessage) -> Settlement {
        let sink = match &self.dead_letters {
            Some(sink) => sink,
            None => {
                return Settlement::Unsettled(ServiceError::Internal(
                    "DLQ publisher not configured".to_string(),
                ))
            }
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match sink.send(dead_letter).await {
                Ok(()) => return Settlement::Settled,
                Err(e) if attempt < self.publish_attempts => {
                    warn!(
                        error = %e,
                        attempt = attempt,
                        correlation_id = %dead_letter.correlation_id,
                        "DLQ publish failed, retrying"
                    );
                    tokio::time::sleep(self.publish_backoff * attempt).await;
                }
                Err(e) => {
                    error!(
                        error = %e,
                        attempts = attempt,
                        correlation_id = %dead_letter.correlation_id,
                        "DLQ publish failed; leaving offset uncommitted"
                    );
                    return Settlement::Unsettled(e);
                }
            }
        }
    }

    /// Like [`MessageProcessor::process`], but gives up as soon as `shutdown`
    /// resolves. Returns `None` when interrupted; the offset stays uncommitted
    /// and the message is redelivered to the next consumer.
    pub async fn process_until<F>(
        &self,
        source: MessageSource,
        payload: Option<&[u8]>,
        shutdown: F,
    ) -> Option<Settlement>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            settlement = self.process(source, payload) => Some(settlement),
            _ = shutdown => None,
        }
    }
}

/// Consumer for student events (projection updates)
pub struct StudentEventsConsumer {
    consumer: StreamConsumer,
    processor: MessageProcessor,
    topic: String,
}

impl StudentEventsConsumer {
    /// Create the consumer and subscribe it to the configured topic.
    /// `dead_letters` is required when the failure policy is `dead_letter`.
    pub fn new(
        config: &KafkaConfig,
        service: Arc<StudentQueryService>,
        dead_letters: Option<Arc<dyn DeadLetterSink>>,
    ) -> ServiceResult<Self> {
        if config.failure_policy == FailurePolicy::DeadLetter && dead_letters.is_none() {
            return Err(ServiceError::Internal(
                "dead_letter failure policy requires a DLQ publisher".to_string(),
            ));
        }

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("session.timeout.ms", "30000")
            .set("enable.partition.eof", "false")
            .create()?;

        consumer.subscribe(&[config.topic.as_str()])?;
        info!(
            "Created Kafka consumer for student events: topic='{}', group='{}'",
            config.topic, config.group_id
        );

        let processor = MessageProcessor::new(
            StudentEventHandler::from_config(service, config),
            dead_letters,
            config.dlq_publish_attempts,
            Duration::from_millis(config.retry_backoff_ms),
        );

        Ok(Self {
            consumer,
            processor,
            topic: config.topic.clone(),
        })
    }

    /// Consume until `shutdown` resolves.
    ///
    /// Returns an error when a message cannot be settled, without committing
    /// its offset, so the partition is re-read from that message on restart.
    pub async fn run<F>(self, shutdown: F) -> ServiceResult<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            topic = %self.topic,
            policy = ?self.processor.policy(),
            "Starting student events consumer"
        );
        tokio::pin!(shutdown);

        loop {
            let received = tokio::select! {
                _ = &mut shutdown => {
                    info!("Student events consumer shutting down");
                    return Ok(());
                }
                received = self.consumer.recv() => received,
            };

            let message = match received {
                Ok(message) => message,
                Err(e) => {
                    error!("Kafka consumer error: {}", e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };

            let source = MessageSource {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
            };

            let settlement = match self
                .processor
                .process_until(source, message.payload(), &mut shutdown)
                .await
            {
                Some(settlement) => settlement,
                None => {
                    info!(
                        offset = message.offset(),
                        "Student events consumer shutting down mid-message; offset left uncommitted"
                    );
                    return Ok(());
                }
            };

            match settlement {
                Settlement::Settled => {
                    if let Err(e) = self.consumer.commit_message(&message, CommitMode::Async) {
                        warn!("Failed to commit Kafka offset: {}", e);
                    }
                }
                Settlement::Unsettled(e) => {
                    error!(
                        error = %e,
                        partition = message.partition(),
                        offset = message.offset(),
                        "Stopping student events consumer on unsettled message"
                    );
                    return Err(e);
                }
            }
        }
    }
}
