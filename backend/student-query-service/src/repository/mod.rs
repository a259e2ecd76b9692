mod memory;
mod postgres_repository;
mod r#trait;

pub use memory::InMemoryStudentRepository;
pub use postgres_repository::PostgresStudentRepository;
pub use r#trait::StudentRepository;
