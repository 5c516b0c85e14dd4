use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use rand::{Rng, distributions::Alphanumeric};
use services::services::{
    config::{Config, load_config_from_file, save_config_to_file},
    dashboard::DashboardService,
    invite::InviteService,
    notes::NoteService,
    photo::{LocalBlobStore, PhotoService},
    project::ProjectService,
    status::StatusEngine,
};
use tokio::sync::RwLock;
use utils::assets::{blob_dir, config_path};

const SESSION_SECRET_ENV: &str = "FOCUSBOARD_SESSION_SECRET";
const GENERATED_SECRET_LEN: usize = 48;

#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<RwLock<Config>>,
    db: DBService,
    status: StatusEngine,
    invites: InviteService,
    projects: ProjectService,
    notes: NoteService,
    dashboard: DashboardService,
    photos: PhotoService,
    session_secret: Arc<str>,
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        let (config, session_secret) = Self::load_runtime_config().await?;
        let db = DBService::new().await?;
        Ok(Self::from_parts(config, db, session_secret))
    }

    fn config(&self) -> &Arc<RwLock<Config>> {
        &self.config
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn status(&self) -> &StatusEngine {
        &self.status
    }

    fn invites(&self) -> &InviteService {
        &self.invites
    }

    fn projects(&self) -> &ProjectService {
        &self.projects
    }

    fn notes(&self) -> &NoteService {
        &self.notes
    }

    fn dashboard(&self) -> &DashboardService {
        &self.dashboard
    }

    fn photos(&self) -> &PhotoService {
        &self.photos
    }

    fn session_secret(&self) -> &str {
        &self.session_secret
    }
}

impl LocalDeployment {
    /// Wires every service around an already connected database.
    pub fn from_parts(config: Config, db: DBService, session_secret: String) -> Self {
        let invite_ttl = Duration::days(config.invite.ttl_days);
        let deadline_hour = config.notes.default_deadline_hour;
        let blob_store = Arc::new(LocalBlobStore::new(blob_dir()));

        Self {
            status: StatusEngine::new(db.clone(), deadline_hour),
            invites: InviteService::new(db.clone(), invite_ttl),
            projects: ProjectService::new(db.clone()),
            notes: NoteService::new(db.clone(), deadline_hour),
            dashboard: DashboardService::new(db.clone()),
            photos: PhotoService::new(db.clone(), blob_store),
            config: Arc::new(RwLock::new(config)),
            db,
            session_secret: Arc::from(session_secret),
        }
    }

    async fn load_runtime_config() -> Result<(Config, String), DeploymentError> {
        let mut config = load_config_from_file(&config_path()).await;
        let env_secret = std::env::var(SESSION_SECRET_ENV).ok();
        let secret = Self::resolve_session_secret(&mut config, env_secret);
        save_config_to_file(&config, &config_path()).await?;
        Ok((config, secret))
    }

    /// The environment wins over the config file. With neither, a secret is
    /// generated and kept in the config so sessions survive restarts.
    fn resolve_session_secret(config: &mut Config, env_secret: Option<String>) -> String {
        if let Some(secret) = env_secret.filter(|secret| !secret.trim().is_empty()) {
            return secret;
        }
        if let Some(secret) = config.session.secret.clone() {
            return secret;
        }

        tracing::info!("No session secret configured, generating one");
        let secret: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(GENERATED_SECRET_LEN)
            .map(char::from)
            .collect();
        config.session.secret = Some(secret.clone());
        secret
    }
}

#[cfg(test)]
mod tests {
    use services::services::config::Config;

    use super::LocalDeployment;

    #[test]
    fn env_secret_overrides_config() {
        let mut config = Config::default();
        config.session.secret = Some("from-file".to_string());

        let secret =
            LocalDeployment::resolve_session_secret(&mut config, Some("from-env".to_string()));

        assert_eq!(secret, "from-env");
        assert_eq!(config.session.secret.as_deref(), Some("from-file"));
    }

    #[test]
    fn missing_secret_is_generated_and_persisted_in_config() {
        let mut config = Config::default();

        let secret = LocalDeployment::resolve_session_secret(&mut config, Some("  ".to_string()));

        assert_eq!(secret.len(), 48);
        assert_eq!(config.session.secret.as_deref(), Some(secret.as_str()));

        let again = LocalDeployment::resolve_session_secret(&mut config, None);
        assert_eq!(again, secret);
    }
}
