use sea_orm::entity::prelude::*;

use crate::types::NoteType;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "notes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub uuid: Uuid,
    pub employee_id: i64,
    pub title: String,
    pub content: Option<String>,
    pub note_type: NoteType,
    pub project_id: Option<i64>,
    pub deadline: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
