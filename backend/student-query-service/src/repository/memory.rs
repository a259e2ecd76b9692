use crate::domain::Student;
use crate::error::ServiceResult;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::StudentRepository;

/// Process-local student projection, keyed by code.
/// Contents are lost on restart; replaying the topic from `earliest` rebuilds it.
#[derive(Default)]
pub struct InMemoryStudentRepository {
    students: RwLock<BTreeMap<String, Student>>,
}

impl InMemoryStudentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.students.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.students.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl StudentRepository for InMemoryStudentRepository {
    async fn find_all(&self) -> ServiceResult<Vec<Student>> {
        Ok(self.students.read().await.values().cloned().collect())
    }

    async fn find_by_id(&self, code: &str) -> ServiceResult<Option<Student>> {
        Ok(self.students.read().await.get(code).cloned())
    }

    async fn save(&self, student: &Student) -> ServiceResult<Student> {
        self.students
            .write()
            .await
            .insert(student.code.clone(), student.clone());
        Ok(student.clone())
    }
}
