//! Student projector
//!
//! Query side of the student CQRS split. Applies events from
//! `student-event-topic` to the read model and serves read-all queries.
//!
//! Supported events:
//! - CreateStudent -> Save student (replaces any record with the same code)
//! - UpdateStudent -> Overwrite name/email of an existing student
//! - anything else -> Ignored

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{Student, StudentEvent, StudentEventKind};
use crate::error::{ServiceError, ServiceResult};
use crate::repository::StudentRepository;

pub struct StudentQueryService {
    repository: Arc<dyn StudentRepository>,
}

impl StudentQueryService {
    pub fn new(repository: Arc<dyn StudentRepository>) -> Self {
        Self { repository }
    }

    /// All students in the projection, in repository order
    pub async fn get_all(&self) -> ServiceResult<Vec<Student>> {
        self.repository.find_all().await
    }

    /// Apply a single event to the projection
    pub async fn on_event(&self, event: StudentEvent) -> ServiceResult<()> {
        match event.kind() {
            StudentEventKind::Create => self.handle_create(event.student).await,
            StudentEventKind::Update => self.handle_update(event.student).await,
            StudentEventKind::Unknown(event_type) => {
                debug!(event_type = %event_type, "Ignoring student event type");
                Ok(())
            }
        }
    }

    async fn handle_create(&self, student: Student) -> ServiceResult<()> {
        info!(code = %student.code, "Processing CreateStudent");

        self.repository.save(&student).await?;
        Ok(())
    }

    async fn handle_update(&self, student: Student) -> ServiceResult<()> {
        info!(code = %student.code, "Processing UpdateStudent");

        let mut existing = match self.repository.find_by_id(&student.code).await? {
            Some(existing) => existing,
            None => {
                warn!(code = %student.code, "UpdateStudent for unknown student");
                return Err(ServiceError::StudentNotFound(student.code));
            }
        };

        existing.apply_changes(&student);
        self.repository.save(&existing).await?;
        Ok(())
    }

    pub async fn health_check(&self) -> ServiceResult<()> {
        self.repository.health_check().await
    }
}
