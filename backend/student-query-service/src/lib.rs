pub mod config;
pub mod consumers;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod repository;
pub mod services;

pub use domain::{Student, StudentEvent, StudentEventKind};
pub use error::{ServiceError, ServiceResult};
pub use repository::{InMemoryStudentRepository, PostgresStudentRepository, StudentRepository};
pub use services::StudentQueryService;
