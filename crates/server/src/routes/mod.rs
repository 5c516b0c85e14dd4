use axum::extract::FromRequest;

use crate::error::ApiError;

pub mod dashboard;
pub mod employees;
pub mod health;
pub mod invites;
pub mod notes;
pub mod projects;
pub mod tasks;

/// `Json` extractor whose rejections use the standard error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
