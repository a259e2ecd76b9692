//! Student read model and the event envelope it is projected from.

use serde::{Deserialize, Serialize};

/// Event type published by the command side when a student is registered.
pub const CREATE_STUDENT: &str = "CreateStudent";
/// Event type published by the command side when a student's details change.
pub const UPDATE_STUDENT: &str = "UpdateStudent";

/// Student as stored in the query-side projection.
///
/// `code` is the identity and never changes once the record exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl Student {
    pub fn new(
        code: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
        }
    }

    /// Overwrite the mutable fields from `other`, keeping this record's code.
    pub fn apply_changes(&mut self, other: &Student) {
        self.first_name = other.first_name.clone();
        self.last_name = other.last_name.clone();
        self.email = other.email.clone();
    }
}

/// Envelope consumed from `student-event-topic`.
///
/// ```json
/// {"eventType": "CreateStudent", "student": {"code": "S1", "firstName": "Ann", ...}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentEvent {
    pub event_type: String,
    pub student: Student,
}

impl StudentEvent {
    pub fn new(event_type: impl Into<String>, student: Student) -> Self {
        Self {
            event_type: event_type.into(),
            student,
        }
    }

    pub fn create(student: Student) -> Self {
        Self::new(CREATE_STUDENT, student)
    }

    pub fn update(student: Student) -> Self {
        Self::new(UPDATE_STUDENT, student)
    }

    pub fn kind(&self) -> StudentEventKind {
        StudentEventKind::from(self.event_type.as_str())
    }
}

/// Discriminator of a [`StudentEvent`]. The set of types on the topic is open,
/// anything not recognised maps to `Unknown` and is ignored by the projector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudentEventKind {
    Create,
    Update,
    Unknown(String),
}

impl From<&str> for StudentEventKind {
    fn from(event_type: &str) -> Self {
        match event_type {
            CREATE_STUDENT => StudentEventKind::Create,
            UPDATE_STUDENT => StudentEventKind::Update,
            other => StudentEventKind::Unknown(other.to_string()),
        }
    }
}
