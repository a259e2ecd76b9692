pub mod student;

pub use student::{Student, StudentEvent, StudentEventKind};
