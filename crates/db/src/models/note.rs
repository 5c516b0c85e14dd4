use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

pub use crate::types::NoteType;
use crate::{entities::note, models::ids};

#[derive(Debug, Error)]
pub enum NoteError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Project not found")]
    ProjectNotFound,
    #[error("Note title cannot be empty")]
    EmptyTitle,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Note {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub title: String,
    pub content: Option<String>,
    pub note_type: NoteType,
    /// `None` once the referenced project has been deleted.
    pub project_id: Option<Uuid>,
    #[ts(type = "Date | null")]
    pub deadline: Option<DateTime<Utc>>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateNote {
    pub title: String,
    pub content: Option<String>,
    pub note_type: NoteType,
    pub project_id: Option<Uuid>,
    #[ts(type = "Date | null")]
    pub deadline: Option<DateTime<Utc>>,
}

/// A note written as a side effect of a status transition.
#[derive(Debug, Clone)]
pub struct NewNote {
    pub title: String,
    pub content: Option<String>,
    pub note_type: NoteType,
    pub project_row_id: Option<i64>,
    pub deadline: Option<DateTime<Utc>>,
}

impl Note {
    fn from_model(model: note::Model, employee_id: Uuid, project_id: Option<Uuid>) -> Self {
        Self {
            id: model.uuid,
            employee_id,
            title: model.title,
            content: model.content,
            note_type: model.note_type,
            project_id,
            deadline: model.deadline,
            created_at: model.created_at,
        }
    }

    pub async fn append<C: ConnectionTrait>(
        db: &C,
        employee_row_id: i64,
        new_note: NewNote,
    ) -> Result<note::Model, DbErr> {
        let active = note::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            employee_id: Set(employee_row_id),
            title: Set(new_note.title),
            content: Set(new_note.content),
            note_type: Set(new_note.note_type),
            project_id: Set(new_note.project_row_id),
            deadline: Set(new_note.deadline),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        active.insert(db).await
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        employee_row_id: i64,
        employee_id: Uuid,
        data: &CreateNote,
    ) -> Result<Self, NoteError> {
        let title = data.title.trim();
        if title.is_empty() {
            return Err(NoteError::EmptyTitle);
        }
        let project_row_id = match data.project_id {
            Some(project_id) => Some(
                ids::project_id_by_uuid(db, project_id)
                    .await?
                    .ok_or(NoteError::ProjectNotFound)?,
            ),
            None => None,
        };

        let model = Self::append(
            db,
            employee_row_id,
            NewNote {
                title: title.to_string(),
                content: data.content.clone(),
                note_type: data.note_type,
                project_row_id,
                deadline: data.deadline,
            },
        )
        .await?;
        Ok(Self::from_model(model, employee_id, data.project_id))
    }

    /// Notes of one employee, newest first.
    pub async fn find_by_employee<C: ConnectionTrait>(
        db: &C,
        employee_row_id: i64,
        employee_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let records = note::Entity::find()
            .filter(note::Column::EmployeeId.eq(employee_row_id))
            .order_by_desc(note::Column::CreatedAt)
            .order_by_desc(note::Column::Id)
            .all(db)
            .await?;

        let project_ids = records
            .iter()
            .filter_map(|record| record.project_id)
            .collect::<Vec<_>>();
        let project_uuids = ids::project_uuids_by_ids(db, project_ids).await?;

        Ok(records
            .into_iter()
            .map(|record| {
                let project_id = record
                    .project_id
                    .and_then(|row_id| project_uuids.get(&row_id).copied());
                Self::from_model(record, employee_id, project_id)
            })
            .collect())
    }

    pub async fn count_by_employee<C: ConnectionTrait>(
        db: &C,
        employee_row_id: i64,
    ) -> Result<i64, DbErr> {
        let count = note::Entity::find()
            .filter(note::Column::EmployeeId.eq(employee_row_id))
            .count(db)
            .await?;
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }
}
