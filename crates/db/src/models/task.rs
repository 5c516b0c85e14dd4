use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

pub use crate::types::TaskStatus;
use crate::{
    entities::{project, task},
    models::ids,
};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Task not found")]
    TaskNotFound,
    #[error("Project not found")]
    ProjectNotFound,
    #[error("Task description cannot be empty")]
    EmptyDescription,
    #[error("A completed task cannot be reopened")]
    InvalidStatusTransition,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub description: String,
    pub created_by: i64,
    #[ts(type = "Date | null")]
    pub deadline: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateTask {
    pub project_id: Uuid,
    pub description: String,
    #[ts(type = "Date | null")]
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateTask {
    pub description: Option<String>,
    #[ts(type = "Date | null")]
    pub deadline: Option<DateTime<Utc>>,
    pub status: Option<TaskStatus>,
}

impl Task {
    fn from_model(model: task::Model, project_id: Uuid) -> Self {
        Self {
            id: model.uuid,
            project_id,
            description: model.description,
            created_by: model.created_by,
            deadline: model.deadline,
            status: model.status,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    async fn hydrate<C: ConnectionTrait>(db: &C, model: task::Model) -> Result<Self, DbErr> {
        let project_uuid = ids::project_uuid_by_id(db, model.project_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;
        Ok(Self::from_model(model, project_uuid))
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let record = task::Entity::find()
            .filter(task::Column::Uuid.eq(id))
            .one(db)
            .await?;
        match record {
            Some(model) => Ok(Some(Self::hydrate(db, model).await?)),
            None => Ok(None),
        }
    }

    /// Tasks of a project, newest first. An unknown project yields an empty list.
    pub async fn find_by_project_id<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(project_row_id) = ids::project_id_by_uuid(db, project_id).await? else {
            return Ok(Vec::new());
        };
        let records = task::Entity::find()
            .filter(task::Column::ProjectId.eq(project_row_id))
            .order_by_desc(task::Column::CreatedAt)
            .order_by_desc(task::Column::Id)
            .all(db)
            .await?;
        Ok(records
            .into_iter()
            .map(|model| Self::from_model(model, project_id))
            .collect())
    }

    pub async fn count_by_project_and_status<C: ConnectionTrait>(
        db: &C,
        project_row_id: i64,
        status: TaskStatus,
    ) -> Result<i64, DbErr> {
        let count = task::Entity::find()
            .filter(task::Column::ProjectId.eq(project_row_id))
            .filter(task::Column::Status.eq(status))
            .count(db)
            .await?;
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateTask,
        created_by: i64,
        task_id: Uuid,
    ) -> Result<Self, TaskError> {
        let project = project::Entity::find()
            .filter(project::Column::Uuid.eq(data.project_id))
            .one(db)
            .await?
            .ok_or(TaskError::ProjectNotFound)?;
        Self::create_in_project(db, &project, &data.description, data.deadline, created_by, task_id)
            .await
    }

    /// Inserts a pending task into an already loaded project row.
    pub async fn create_in_project<C: ConnectionTrait>(
        db: &C,
        project: &project::Model,
        description: &str,
        deadline: Option<DateTime<Utc>>,
        created_by: i64,
        task_id: Uuid,
    ) -> Result<Self, TaskError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(TaskError::EmptyDescription);
        }

        let now = Utc::now();
        let active = task::ActiveModel {
            uuid: Set(task_id),
            project_id: Set(project.id),
            description: Set(description.to_string()),
            created_by: Set(created_by),
            deadline: Set(deadline),
            status: Set(TaskStatus::Pending),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        Ok(Self::from_model(model, project.uuid))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        payload: &UpdateTask,
    ) -> Result<Self, TaskError> {
        let record = task::Entity::find()
            .filter(task::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(TaskError::TaskNotFound)?;

        if record.status == TaskStatus::Completed
            && payload.status == Some(TaskStatus::Pending)
        {
            return Err(TaskError::InvalidStatusTransition);
        }

        let mut active: task::ActiveModel = record.into();
        if let Some(description) = &payload.description {
            let description = description.trim();
            if description.is_empty() {
                return Err(TaskError::EmptyDescription);
            }
            active.description = Set(description.to_string());
        }
        if payload.deadline.is_some() {
            active.deadline = Set(payload.deadline);
        }
        if let Some(status) = payload.status {
            active.status = Set(status);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await?;
        Ok(Self::hydrate(db, updated).await?)
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let result = task::Entity::delete_many()
            .filter(task::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn delete_by_project<C: ConnectionTrait>(
        db: &C,
        project_row_id: i64,
    ) -> Result<u64, DbErr> {
        let result = task::Entity::delete_many()
            .filter(task::Column::ProjectId.eq(project_row_id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
