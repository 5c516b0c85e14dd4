use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, SqlErr, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

pub use crate::types::EmployeeStatus;
use crate::{entities::employee, models::ids};

#[derive(Debug, Error)]
pub enum EmployeeError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Employee not found")]
    EmployeeNotFound,
    #[error("An employee profile already exists for this user")]
    AlreadyExists,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Employee {
    pub id: Uuid,
    pub user_id: i64,
    pub name: String,
    pub photo: Option<String>,
    pub specialties: Option<String>,
    pub qualities: Option<String>,
    pub pomodoro_work_time: i32,
    pub pomodoro_rest_time: i32,
    pub current_project_id: Option<Uuid>,
    pub status: EmployeeStatus,
    #[ts(type = "Date | null")]
    pub state_start_time: Option<DateTime<Utc>>,
    #[ts(type = "number")]
    pub version: i64,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateEmployee {
    pub name: String,
    pub photo: Option<String>,
    pub specialties: Option<String>,
    pub qualities: Option<String>,
}

impl CreateEmployee {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            photo: None,
            specialties: None,
            qualities: None,
        }
    }
}

/// Focus and rest durations (minutes) given to newly created profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmployeeDefaults {
    pub work_minutes: i32,
    pub rest_minutes: i32,
}

impl Default for EmployeeDefaults {
    fn default() -> Self {
        Self {
            work_minutes: 25,
            rest_minutes: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateEmployeeSettings {
    pub pomodoro_work_time: Option<i32>,
    pub pomodoro_rest_time: Option<i32>,
    pub specialties: Option<String>,
    pub qualities: Option<String>,
}

/// The state written by a status transition.
#[derive(Debug, Clone, Copy)]
pub struct EmployeeTransition {
    pub status: EmployeeStatus,
    pub current_project_id: Option<i64>,
    pub at: DateTime<Utc>,
}

impl Employee {
    fn from_model(model: employee::Model, current_project_id: Option<Uuid>) -> Self {
        Self {
            id: model.uuid,
            user_id: model.user_id,
            name: model.name,
            photo: model.photo,
            specialties: model.specialties,
            qualities: model.qualities,
            pomodoro_work_time: model.pomodoro_work_time,
            pomodoro_rest_time: model.pomodoro_rest_time,
            current_project_id,
            status: model.status,
            state_start_time: model.state_start_time,
            version: model.version,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    /// Builds the API view of a row, resolving the current project to its uuid.
    pub async fn hydrate<C: ConnectionTrait>(
        db: &C,
        model: employee::Model,
    ) -> Result<Self, DbErr> {
        let current_project_id = match model.current_project_id {
            Some(row_id) => ids::project_uuid_by_id(db, row_id).await?,
            None => None,
        };
        Ok(Self::from_model(model, current_project_id))
    }

    pub async fn count<C: ConnectionTrait>(db: &C) -> Result<i64, DbErr> {
        let count = employee::Entity::find().count(db).await?;
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    /// Employees in any state other than inactive.
    pub async fn count_active<C: ConnectionTrait>(db: &C) -> Result<i64, DbErr> {
        let count = employee::Entity::find()
            .filter(employee::Column::Status.ne(EmployeeStatus::Inactive))
            .count(db)
            .await?;
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    pub async fn count_on_project<C: ConnectionTrait>(
        db: &C,
        project_row_id: i64,
    ) -> Result<i64, DbErr> {
        let count = employee::Entity::find()
            .filter(employee::Column::CurrentProjectId.eq(project_row_id))
            .count(db)
            .await?;
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = employee::Entity::find()
            .order_by_asc(employee::Column::Name)
            .order_by_asc(employee::Column::Id)
            .all(db)
            .await?;

        let project_ids = records
            .iter()
            .filter_map(|record| record.current_project_id)
            .collect::<Vec<_>>();
        let project_uuids = ids::project_uuids_by_ids(db, project_ids).await?;

        Ok(records
            .into_iter()
            .map(|record| {
                let current = record
                    .current_project_id
                    .and_then(|row_id| project_uuids.get(&row_id).copied());
                Self::from_model(record, current)
            })
            .collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        match Self::find_model_by_id(db, id).await? {
            Some(model) => Ok(Some(Self::hydrate(db, model).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_user_id<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
    ) -> Result<Option<Self>, DbErr> {
        match Self::find_model_by_user_id(db, user_id).await? {
            Some(model) => Ok(Some(Self::hydrate(db, model).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_model_by_id<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<employee::Model>, DbErr> {
        employee::Entity::find()
            .filter(employee::Column::Uuid.eq(id))
            .one(db)
            .await
    }

    pub async fn find_model_by_row_id<C: ConnectionTrait>(
        db: &C,
        row_id: i64,
    ) -> Result<Option<employee::Model>, DbErr> {
        employee::Entity::find_by_id(row_id).one(db).await
    }

    pub async fn find_model_by_user_id<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
    ) -> Result<Option<employee::Model>, DbErr> {
        employee::Entity::find()
            .filter(employee::Column::UserId.eq(user_id))
            .one(db)
            .await
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateEmployee,
        user_id: i64,
        defaults: EmployeeDefaults,
        employee_id: Uuid,
    ) -> Result<Self, EmployeeError> {
        if Self::find_model_by_user_id(db, user_id).await?.is_some() {
            return Err(EmployeeError::AlreadyExists);
        }

        let now = Utc::now();
        let active = employee::ActiveModel {
            uuid: Set(employee_id),
            user_id: Set(user_id),
            name: Set(data.name.trim().to_string()),
            photo: Set(data.photo.clone()),
            specialties: Set(data.specialties.clone()),
            qualities: Set(data.qualities.clone()),
            pomodoro_work_time: Set(defaults.work_minutes),
            pomodoro_rest_time: Set(defaults.rest_minutes),
            current_project_id: Set(None),
            status: Set(EmployeeStatus::Inactive),
            state_start_time: Set(None),
            version: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        // A concurrent create for the same user can pass the check above; the
        // unique user_id index decides the winner.
        let model = active.insert(db).await.map_err(|err| match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => EmployeeError::AlreadyExists,
            _ => EmployeeError::Database(err),
        })?;
        Ok(Self::from_model(model, None))
    }

    pub async fn update_photo<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        photo: &str,
    ) -> Result<Self, EmployeeError> {
        let record = Self::find_model_by_id(db, id)
            .await?
            .ok_or(EmployeeError::EmployeeNotFound)?;
        let mut active: employee::ActiveModel = record.into();
        active.photo = Set(Some(photo.to_string()));
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;
        Ok(Self::hydrate(db, updated).await?)
    }

    /// Claims the employee row for writing with a no-op update. Transitions
    /// call this first so SQLite takes its write lock (waiting on the busy
    /// timeout) instead of failing a read-to-write upgrade, and other
    /// backends hold the row lock for the rest of the transaction. Returns
    /// false when the employee does not exist.
    pub async fn lock_for_write<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<bool, DbErr> {
        let result = employee::Entity::update_many()
            .col_expr(
                employee::Column::Version,
                Expr::col(employee::Column::Version).into(),
            )
            .filter(employee::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Writes the settings only if the row still carries `expected_version`.
    /// Returns false when another writer got there first.
    pub async fn update_settings_if_version<C: ConnectionTrait>(
        db: &C,
        row_id: i64,
        expected_version: i64,
        payload: &UpdateEmployeeSettings,
    ) -> Result<bool, DbErr> {
        let mut active = employee::ActiveModel {
            version: Set(expected_version + 1),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        if let Some(minutes) = payload.pomodoro_work_time {
            active.pomodoro_work_time = Set(minutes);
        }
        if let Some(minutes) = payload.pomodoro_rest_time {
            active.pomodoro_rest_time = Set(minutes);
        }
        if payload.specialties.is_some() {
            active.specialties = Set(payload.specialties.clone());
        }
        if payload.qualities.is_some() {
            active.qualities = Set(payload.qualities.clone());
        }

        let result = employee::Entity::update_many()
            .set(active)
            .filter(employee::Column::Id.eq(row_id))
            .filter(employee::Column::Version.eq(expected_version))
            .exec(db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// Applies a status transition only if the row still carries
    /// `expected_version`. Returns false when another writer got there first.
    pub async fn apply_transition_if_version<C: ConnectionTrait>(
        db: &C,
        row_id: i64,
        expected_version: i64,
        transition: EmployeeTransition,
    ) -> Result<bool, DbErr> {
        let active = employee::ActiveModel {
            status: Set(transition.status),
            current_project_id: Set(transition.current_project_id),
            state_start_time: Set(Some(transition.at)),
            version: Set(expected_version + 1),
            updated_at: Set(transition.at),
            ..Default::default()
        };

        let result = employee::Entity::update_many()
            .set(active)
            .filter(employee::Column::Id.eq(row_id))
            .filter(employee::Column::Version.eq(expected_version))
            .exec(db)
            .await?;
        Ok(result.rows_affected == 1)
    }
}
