use std::sync::Arc;

use async_trait::async_trait;
use db::{DBService, DbErr};
use services::services::{
    config::{Config, ConfigError},
    dashboard::DashboardService,
    invite::InviteService,
    notes::NoteService,
    photo::PhotoService,
    project::ProjectService,
    status::StatusEngine,
};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Everything a request handler can reach. Built once at startup and cloned
/// into each request.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn config(&self) -> &Arc<RwLock<Config>>;

    fn db(&self) -> &DBService;

    fn status(&self) -> &StatusEngine;

    fn invites(&self) -> &InviteService;

    fn projects(&self) -> &ProjectService;

    fn notes(&self) -> &NoteService;

    fn dashboard(&self) -> &DashboardService;

    fn photos(&self) -> &PhotoService;

    /// Secret used to verify session tokens.
    fn session_secret(&self) -> &str;
}
