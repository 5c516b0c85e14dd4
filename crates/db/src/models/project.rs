use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

pub use crate::types::ProjectStatus;
use crate::entities::project;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Project not found")]
    ProjectNotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub project_type: String,
    pub owner_id: i64,
    pub scope: Option<String>,
    pub objectives: Option<String>,
    pub deliverables: Option<String>,
    pub contract: Option<String>,
    pub status: ProjectStatus,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateProject {
    pub name: String,
    pub project_type: String,
    pub scope: Option<String>,
    pub objectives: Option<String>,
    pub deliverables: Option<String>,
    pub contract: Option<String>,
    pub status: Option<ProjectStatus>,
}

impl CreateProject {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            project_type: "internal".to_string(),
            scope: None,
            objectives: None,
            deliverables: None,
            contract: None,
            status: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub project_type: Option<String>,
    pub scope: Option<String>,
    pub objectives: Option<String>,
    pub deliverables: Option<String>,
    pub contract: Option<String>,
    pub status: Option<ProjectStatus>,
}

impl Project {
    pub fn from_model(model: project::Model) -> Self {
        Self {
            id: model.uuid,
            name: model.name,
            project_type: model.project_type,
            owner_id: model.owner_id,
            scope: model.scope,
            objectives: model.objectives,
            deliverables: model.deliverables,
            contract: model.contract,
            status: model.status,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    pub async fn count<C: ConnectionTrait>(db: &C) -> Result<i64, DbErr> {
        let count = project::Entity::find().count(db).await?;
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    pub async fn count_by_status<C: ConnectionTrait>(
        db: &C,
        status: ProjectStatus,
    ) -> Result<i64, DbErr> {
        let count = project::Entity::find()
            .filter(project::Column::Status.eq(status))
            .count(db)
            .await?;
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = project::Entity::find()
            .order_by_desc(project::Column::CreatedAt)
            .order_by_desc(project::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        Ok(Self::find_model_by_id(db, id).await?.map(Self::from_model))
    }

    pub async fn find_model_by_id<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<project::Model>, DbErr> {
        project::Entity::find()
            .filter(project::Column::Uuid.eq(id))
            .one(db)
            .await
    }

    /// Reads the project under a shared row lock, so a concurrent status
    /// change or delete of it waits for the reading transaction to finish.
    pub async fn find_model_by_id_shared<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<project::Model>, DbErr> {
        project::Entity::find()
            .filter(project::Column::Uuid.eq(id))
            .lock_shared()
            .one(db)
            .await
    }

    /// Claims the project row for writing with a no-op update, before the
    /// surrounding transaction reads anything. Returns false when the project
    /// does not exist.
    pub async fn lock_for_write<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<bool, DbErr> {
        let result = project::Entity::update_many()
            .col_expr(
                project::Column::UpdatedAt,
                Expr::col(project::Column::UpdatedAt).into(),
            )
            .filter(project::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn find_model_by_row_id<C: ConnectionTrait>(
        db: &C,
        row_id: i64,
    ) -> Result<Option<project::Model>, DbErr> {
        project::Entity::find_by_id(row_id).one(db).await
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateProject,
        owner_id: i64,
        project_id: Uuid,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = project::ActiveModel {
            uuid: Set(project_id),
            name: Set(data.name.trim().to_string()),
            project_type: Set(data.project_type.trim().to_string()),
            owner_id: Set(owner_id),
            scope: Set(data.scope.clone()),
            objectives: Set(data.objectives.clone()),
            deliverables: Set(data.deliverables.clone()),
            contract: Set(data.contract.clone()),
            status: Set(data.status.unwrap_or_default()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        payload: &UpdateProject,
    ) -> Result<Self, ProjectError> {
        let record = Self::find_model_by_id(db, id)
            .await?
            .ok_or(ProjectError::ProjectNotFound)?;

        let mut active: project::ActiveModel = record.into();
        if let Some(name) = &payload.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(project_type) = &payload.project_type {
            active.project_type = Set(project_type.trim().to_string());
        }
        if payload.scope.is_some() {
            active.scope = Set(payload.scope.clone());
        }
        if payload.objectives.is_some() {
            active.objectives = Set(payload.objectives.clone());
        }
        if payload.deliverables.is_some() {
            active.deliverables = Set(payload.deliverables.clone());
        }
        if payload.contract.is_some() {
            active.contract = Set(payload.contract.clone());
        }
        if let Some(status) = payload.status {
            active.status = Set(status);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let result = project::Entity::delete_many()
            .filter(project::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
