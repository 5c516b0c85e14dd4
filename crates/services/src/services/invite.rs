use chrono::{DateTime, Duration, Utc};
use db::{
    DBService, DbErr,
    models::invite_link::InviteLink,
    retry::{SqliteBusy, retry_on_sqlite_busy},
};
use rand::{Rng, distributions::Alphanumeric};
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

use super::auth::{AuthError, Caller};

/// 32 alphanumeric characters, roughly 190 bits of entropy.
pub const INVITE_TOKEN_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum InviteError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Invite link not found")]
    NotFound,
    #[error("Invite link is invalid or expired")]
    InvalidOrExpired,
}

impl SqliteBusy for InviteError {
    fn is_sqlite_busy(&self) -> bool {
        match self {
            InviteError::Database(err) => err.is_sqlite_busy(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct GeneratedInvite {
    pub token: String,
    pub link: String,
    #[ts(type = "Date")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct InviteService {
    db: DBService,
    ttl: Duration,
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(INVITE_TOKEN_LEN)
        .map(char::from)
        .collect()
}

impl InviteService {
    pub fn new(db: DBService, ttl: Duration) -> Self {
        Self { db, ttl }
    }

    /// Issues a fresh single-use invite. Managers only.
    pub async fn generate(&self, caller: &Caller) -> Result<GeneratedInvite, InviteError> {
        caller.require_admin("generate invite links")?;

        let token = generate_token();
        let expires_at = Utc::now() + self.ttl;
        InviteLink::create(&self.db.pool, &token, caller.user_id, Some(expires_at)).await?;
        tracing::info!(created_by = caller.user_id, %expires_at, "invite link generated");

        Ok(GeneratedInvite {
            link: format!("/invite/{token}"),
            token,
            expires_at,
        })
    }

    /// Whether the token could be redeemed right now. Unknown tokens are
    /// simply invalid.
    pub async fn validate(&self, token: &str) -> Result<bool, InviteError> {
        let link = InviteLink::find_by_token(&self.db.pool, token).await?;
        Ok(link.is_some_and(|link| link.is_valid_at(Utc::now())))
    }

    /// Marks the invite as used by `user_id`. Exactly one of any number of
    /// concurrent redemptions succeeds.
    pub async fn redeem(&self, token: &str, user_id: i64) -> Result<(), InviteError> {
        retry_on_sqlite_busy(move || self.try_redeem(token, user_id)).await?;
        tracing::info!(user_id, "invite link redeemed");
        Ok(())
    }

    async fn try_redeem(&self, token: &str, user_id: i64) -> Result<(), InviteError> {
        let link = InviteLink::find_by_token(&self.db.pool, token)
            .await?
            .ok_or(InviteError::NotFound)?;
        if !link.is_valid_at(Utc::now()) {
            return Err(InviteError::InvalidOrExpired);
        }
        if !InviteLink::mark_used_if_unused(&self.db.pool, link.row_id, user_id).await? {
            tracing::debug!(user_id, "invite link claimed by a concurrent redemption");
            return Err(InviteError::InvalidOrExpired);
        }
        Ok(())
    }
}
