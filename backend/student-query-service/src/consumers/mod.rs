pub mod dlq;
pub mod student_events;

pub use dlq::{DeadLetterMessage, DeadLetterPublisher, DeadLetterSink, MessageSource};
pub use student_events::{
    Disposition, MessageProcessor, Settlement, StudentEventHandler, StudentEventsConsumer,
};
