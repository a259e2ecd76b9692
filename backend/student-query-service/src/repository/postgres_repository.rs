use crate::domain::Student;
use crate::error::ServiceResult;
use sqlx::PgPool;
use tracing::debug;

use super::StudentRepository;

/// PostgreSQL-backed student projection (table `students`)
#[derive(Clone)]
pub struct PostgresStudentRepository {
    pool: PgPool,
}

impl PostgresStudentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl StudentRepository for PostgresStudentRepository {
    async fn find_all(&self) -> ServiceResult<Vec<Student>> {
        let students = sqlx::query_as::<_, Student>(
            r#"
            SELECT code, first_name, last_name, email
            FROM students
            ORDER BY code
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(students)
    }

    async fn find_by_id(&self, code: &str) -> ServiceResult<Option<Student>> {
        let student = sqlx::query_as::<_, Student>(
            r#"
            SELECT code, first_name, last_name, email
            FROM students
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(student)
    }

    async fn save(&self, student: &Student) -> ServiceResult<Student> {
        let saved = sqlx::query_as::<_, Student>(
            r#"
            INSERT INTO students (code, first_name, last_name, email)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (code) DO UPDATE
            SET first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                email = EXCLUDED.email,
                updated_at = NOW()
            RETURNING code, first_name, last_name, email
            "#,
        )
        .bind(&student.code)
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(&student.email)
        .fetch_one(&self.pool)
        .await?;

        debug!(code = %saved.code, "Saved student");
        Ok(saved)
    }

    async fn health_check(&self) -> ServiceResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
