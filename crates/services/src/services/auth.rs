use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use ts_rs::TS;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
    Employee,
}

/// The authenticated principal of a request, as vouched for by the session
/// token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i64,
    pub role: UserRole,
}

impl Caller {
    pub fn new(user_id: i64, role: UserRole) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn require_admin(&self, action: &str) -> Result<(), AuthError> {
        if self.is_admin() {
            Ok(())
        } else {
            tracing::debug!(user_id = self.user_id, action, "admin role required");
            Err(AuthError::Forbidden(format!("Only managers can {action}")))
        }
    }
}
