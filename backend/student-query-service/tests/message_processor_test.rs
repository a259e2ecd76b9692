//! Settlement of consumed messages: what may be committed and what may not.

mod common;

use common::{ann, in_memory_service, MockDeadLetters};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use std::sync::Arc;
use std::time::Duration;
use student_query_service::config::FailurePolicy;
use student_query_service::consumers::{
    DeadLetterMessage, DeadLetterSink, MessageProcessor, MessageSource, Settlement,
    StudentEventHandler,
};
use student_query_service::{ServiceError, StudentEvent, StudentQueryService};

fn source() -> MessageSource {
    MessageSource {
        topic: "student-event-topic".to_string(),
        partition: 0,
        offset: 7,
    }
}

fn payload(event: &StudentEvent) -> Vec<u8> {
    serde_json::to_vec(event).unwrap()
}

fn queue_full() -> ServiceError {
    ServiceError::Kafka(KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull))
}

fn processor(
    service: Arc<StudentQueryService>,
    policy: FailurePolicy,
    dead_letters: Option<MockDeadLetters>,
) -> MessageProcessor {
    let dead_letters = dead_letters.map(|sink| Arc::new(sink) as Arc<dyn DeadLetterSink>);
    MessageProcessor::new(
        StudentEventHandler::new(service, policy, 0, Duration::ZERO),
        dead_letters,
        3,
        Duration::from_millis(1),
    )
}

#[tokio::test]
async fn test_empty_payload_is_settled_without_side_effects() {
    let (service, repo) = in_memory_service();
    let mut sink = MockDeadLetters::new();
    sink.expect_send().times(0);

    let processor = processor(service, FailurePolicy::DeadLetter, Some(sink));

    assert!(processor.process(source(), None).await.is_settled());
    assert!(repo.is_empty().await);
}

#[tokio::test]
async fn test_applied_event_is_settled() {
    let (service, repo) = in_memory_service();
    let mut sink = MockDeadLetters::new();
    sink.expect_send().times(0);

    let processor = processor(service, FailurePolicy::DeadLetter, Some(sink));
    let raw = payload(&StudentEvent::create(ann()));

    assert!(processor.process(source(), Some(raw.as_slice())).await.is_settled());
    assert_eq!(repo.len().await, 1);
}

#[tokio::test]
async fn test_dead_letter_published_then_settled() {
    let (service, _) = in_memory_service();
    let mut sink = MockDeadLetters::new();
    sink.expect_send()
        .times(1)
        .withf(|message: &DeadLetterMessage| {
            message.student_code.as_deref() == Some("S1")
                && message.event_type.as_deref() == Some("UpdateStudent")
                && message.source.offset == 7
        })
        .returning(|_| Ok(()));

    let processor = processor(service, FailurePolicy::DeadLetter, Some(sink));
    let raw = payload(&StudentEvent::update(ann()));

    assert!(processor.process(source(), Some(raw.as_slice())).await.is_settled());
}

#[tokio::test]
async fn test_failed_dead_letter_publish_is_unsettled() {
    let (service, _) = in_memory_service();
    let mut sink = MockDeadLetters::new();
    sink.expect_send().times(3).returning(|_| Err(queue_full()));

    let processor = processor(service, FailurePolicy::DeadLetter, Some(sink));
    let raw = payload(&StudentEvent::update(ann()));

    match processor.process(source(), Some(raw.as_slice())).await {
        Settlement::Unsettled(error) => assert!(matches!(error, ServiceError::Kafka(_))),
        Settlement::Settled => panic!("Message must not be committed when the DLQ publish fails"),
    }
}

#[tokio::test]
async fn test_dead_letter_publish_recovers_after_transient_failure() {
    let (service, _) = in_memory_service();
    let mut sink = MockDeadLetters::new();
    let mut calls = 0;
    sink.expect_send().times(2).returning(move |_| {
        calls += 1;
        if calls == 1 {
            Err(queue_full())
        } else {
            Ok(())
        }
    });

    let processor = processor(service, FailurePolicy::DeadLetter, Some(sink));
    let raw = payload(&StudentEvent::update(ann()));

    assert!(processor.process(source(), Some(raw.as_slice())).await.is_settled());
}

#[tokio::test]
async fn test_dead_letter_without_sink_is_unsettled() {
    let (service, _) = in_memory_service();
    let processor = processor(service, FailurePolicy::DeadLetter, None);

    assert!(matches!(
        processor.process(source(), Some(&b"not json"[..])).await,
        Settlement::Unsettled(ServiceError::Internal(_))
    ));
}

#[tokio::test]
async fn test_dropped_event_is_settled() {
    let (service, repo) = in_memory_service();
    let processor = processor(service, FailurePolicy::Drop, None);
    let raw = payload(&StudentEvent::update(ann()));

    assert!(processor.process(source(), Some(raw.as_slice())).await.is_settled());
    assert!(repo.is_empty().await);
}

#[tokio::test]
async fn test_shutdown_interrupts_retry_backoff() {
    let (service, _) = in_memory_service();
    let processor = MessageProcessor::new(
        StudentEventHandler::new(service, FailurePolicy::Retry, 10, Duration::from_secs(10)),
        None,
        1,
        Duration::ZERO,
    );
    let raw = payload(&StudentEvent::update(ann()));

    let outcome = tokio::time::timeout(
        Duration::from_secs(2),
        processor.process_until(
            source(),
            Some(raw.as_slice()),
            tokio::time::sleep(Duration::from_millis(20)),
        ),
    )
    .await
    .expect("shutdown should cut the retry sleep short");

    assert!(outcome.is_none());
}
