use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::entities::invite_link;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct InviteLink {
    #[serde(skip)]
    #[ts(skip)]
    pub row_id: i64,
    pub token: String,
    pub created_by: i64,
    pub used_by: Option<i64>,
    #[ts(type = "Date | null")]
    pub expires_at: Option<DateTime<Utc>>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
}

impl InviteLink {
    fn from_model(model: invite_link::Model) -> Self {
        Self {
            row_id: model.id,
            token: model.token,
            created_by: model.created_by,
            used_by: model.used_by,
            expires_at: model.expires_at,
            created_at: model.created_at,
        }
    }

    /// Unused and not yet expired. A link expiring exactly at `now` is expired.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.used_by.is_none() && self.expires_at.is_none_or(|expires_at| expires_at > now)
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        token: &str,
        created_by: i64,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Self, DbErr> {
        let active = invite_link::ActiveModel {
            token: Set(token.to_string()),
            created_by: Set(created_by),
            used_by: Set(None),
            expires_at: Set(expires_at),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn find_by_token<C: ConnectionTrait>(
        db: &C,
        token: &str,
    ) -> Result<Option<Self>, DbErr> {
        let record = invite_link::Entity::find()
            .filter(invite_link::Column::Token.eq(token))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    /// Claims the link for `user_id` unless someone already did. Returns true
    /// only for the single caller whose update took effect.
    pub async fn mark_used_if_unused<C: ConnectionTrait>(
        db: &C,
        row_id: i64,
        user_id: i64,
    ) -> Result<bool, DbErr> {
        let active = invite_link::ActiveModel {
            used_by: Set(Some(user_id)),
            ..Default::default()
        };
        let result = invite_link::Entity::update_many()
            .set(active)
            .filter(invite_link::Column::Id.eq(row_id))
            .filter(invite_link::Column::UsedBy.is_null())
            .exec(db)
            .await?;
        Ok(result.rows_affected == 1)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    fn link(used_by: Option<i64>, expires_at: Option<DateTime<Utc>>) -> InviteLink {
        InviteLink {
            row_id: 1,
            token: "t".to_string(),
            created_by: 1,
            used_by,
            expires_at,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn validity_boundaries() {
        let now = Utc::now();
        assert!(link(None, None).is_valid_at(now));
        assert!(link(None, Some(now + Duration::microseconds(1))).is_valid_at(now));
        assert!(!link(None, Some(now)).is_valid_at(now));
        assert!(!link(None, Some(now - Duration::seconds(1))).is_valid_at(now));
        assert!(!link(Some(4), None).is_valid_at(now));
    }

    #[tokio::test]
    async fn only_first_claim_wins() {
        let db = setup_db().await;
        let invite = InviteLink::create(&db, "abc", 1, None).await.unwrap();

        assert!(InviteLink::mark_used_if_unused(&db, invite.row_id, 10).await.unwrap());
        assert!(!InviteLink::mark_used_if_unused(&db, invite.row_id, 11).await.unwrap());

        let stored = InviteLink::find_by_token(&db, "abc").await.unwrap().unwrap();
        assert_eq!(stored.used_by, Some(10));
        assert!(InviteLink::find_by_token(&db, "missing").await.unwrap().is_none());
    }
}
