use sea_orm::entity::prelude::*;

use crate::types::EmployeeStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "employees")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub uuid: Uuid,
    pub user_id: i64,
    pub name: String,
    pub photo: Option<String>,
    pub specialties: Option<String>,
    pub qualities: Option<String>,
    pub pomodoro_work_time: i32,
    pub pomodoro_rest_time: i32,
    pub current_project_id: Option<i64>,
    pub status: EmployeeStatus,
    pub state_start_time: Option<DateTimeUtc>,
    pub version: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
