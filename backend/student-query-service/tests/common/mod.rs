#![allow(dead_code)]

use mockall::mock;
use std::sync::Arc;
use student_query_service::consumers::{DeadLetterMessage, DeadLetterSink};
use student_query_service::{
    InMemoryStudentRepository, ServiceResult, Student, StudentQueryService, StudentRepository,
};

mock! {
    pub StudentRepo {}

    #[async_trait::async_trait]
    impl StudentRepository for StudentRepo {
        async fn find_all(&self) -> ServiceResult<Vec<Student>>;
        async fn find_by_id(&self, code: &str) -> ServiceResult<Option<Student>>;
        async fn save(&self, student: &Student) -> ServiceResult<Student>;
        async fn health_check(&self) -> ServiceResult<()>;
    }
}

mock! {
    pub DeadLetters {}

    #[async_trait::async_trait]
    impl DeadLetterSink for DeadLetters {
        async fn send(&self, message: &DeadLetterMessage) -> ServiceResult<()>;
    }
}

pub fn ann() -> Student {
    Student::new("S1", "Ann", "Lee", "a@x.com")
}

/// Service over a fresh in-memory store, plus a handle to the store
pub fn in_memory_service() -> (Arc<StudentQueryService>, Arc<InMemoryStudentRepository>) {
    let repo = Arc::new(InMemoryStudentRepository::new());
    let service = Arc::new(StudentQueryService::new(repo.clone()));
    (service, repo)
}

pub fn mock_service(repo: MockStudentRepo) -> Arc<StudentQueryService> {
    Arc::new(StudentQueryService::new(Arc::new(repo)))
}
