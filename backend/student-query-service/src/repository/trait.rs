use crate::domain::Student;
use crate::error::ServiceResult;

/// Keyed store behind the student projection.
/// Implemented by PostgresStudentRepository (production) and InMemoryStudentRepository (local/dev).
#[async_trait::async_trait]
pub trait StudentRepository: Send + Sync {
    /// Every stored student, in the store's natural order
    async fn find_all(&self) -> ServiceResult<Vec<Student>>;

    /// Look up a student by code
    async fn find_by_id(&self, code: &str) -> ServiceResult<Option<Student>>;

    /// Insert the student, replacing any record with the same code
    async fn save(&self, student: &Student) -> ServiceResult<Student>;

    /// Health check (optional)
    async fn health_check(&self) -> ServiceResult<()> {
        Ok(())
    }
}
