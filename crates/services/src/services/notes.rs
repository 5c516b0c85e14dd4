use chrono::{DateTime, NaiveTime, Utc};
use db::{
    DBService, DbErr,
    models::{
        employee::Employee,
        note::{CreateNote, Note, NoteError},
    },
};
use serde::Deserialize;
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::auth::Caller;

#[derive(Debug, Error)]
pub enum NoteServiceError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Note(#[from] NoteError),
    #[error("Employee profile not found")]
    EmployeeNotFound,
}

/// Body of a manually written note. The deadline defaults to today at the
/// configured hour.
#[derive(Debug, Clone, Deserialize, TS)]
pub struct NewNoteRequest {
    pub title: String,
    pub content: Option<String>,
    pub note_type: db::types::NoteType,
    pub project_id: Option<Uuid>,
    #[ts(type = "Date | null")]
    pub deadline: Option<DateTime<Utc>>,
}

/// Today (UTC) at `hour`:00.
pub fn default_deadline(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    now.date_naive().and_time(time).and_utc()
}

#[derive(Clone)]
pub struct NoteService {
    db: DBService,
    default_deadline_hour: u32,
}

impl NoteService {
    pub fn new(db: DBService, default_deadline_hour: u32) -> Self {
        Self {
            db,
            default_deadline_hour,
        }
    }

    pub async fn create(
        &self,
        caller: &Caller,
        request: NewNoteRequest,
    ) -> Result<Note, NoteServiceError> {
        let employee = Employee::find_model_by_user_id(&self.db.pool, caller.user_id)
            .await?
            .ok_or(NoteServiceError::EmployeeNotFound)?;
        let deadline = request
            .deadline
            .unwrap_or_else(|| default_deadline(Utc::now(), self.default_deadline_hour));

        let note = Note::create(
            &self.db.pool,
            employee.id,
            employee.uuid,
            &CreateNote {
                title: request.title,
                content: request.content,
                note_type: request.note_type,
                project_id: request.project_id,
                deadline: Some(deadline),
            },
        )
        .await?;
        tracing::debug!(note_id = %note.id, employee_id = %employee.uuid, "note created");
        Ok(note)
    }

    /// The caller's own notes. A caller without a profile has none.
    pub async fn list_own(&self, caller: &Caller) -> Result<Vec<Note>, NoteServiceError> {
        let Some(employee) = Employee::find_model_by_user_id(&self.db.pool, caller.user_id).await?
        else {
            return Ok(Vec::new());
        };
        Ok(Note::find_by_employee(&self.db.pool, employee.id, employee.uuid).await?)
    }
}
