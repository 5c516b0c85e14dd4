use std::time::Duration;

use sea_orm::{
    ConnectOptions, Database, DatabaseConnection,
    sqlx::sqlite::{SqliteJournalMode, SqliteSynchronous},
};
use sea_orm_migration::MigratorTrait;
use utils::assets::database_path;

pub mod entities;
pub mod models;
pub mod retry;
pub mod types;

pub use sea_orm::{DatabaseTransaction, DbErr, TransactionTrait};

pub type DbPool = DatabaseConnection;

const DATABASE_URL_ENV: &str = "DATABASE_URL";
const MAX_CONNECTIONS: u32 = 8;

#[derive(Clone)]
pub struct DBService {
    pub pool: DbPool,
}

pub fn database_url() -> String {
    match std::env::var(DATABASE_URL_ENV) {
        Ok(url) if !url.trim().is_empty() => url.trim().to_string(),
        _ => format!("sqlite://{}?mode=rwc", database_path().to_string_lossy()),
    }
}

impl DBService {
    /// Connects to `DATABASE_URL` (or the SQLite file in the asset directory)
    /// and brings the schema up to date.
    pub async fn new() -> Result<DBService, DbErr> {
        Self::connect(&database_url()).await
    }

    pub async fn connect(url: &str) -> Result<DBService, DbErr> {
        let mut options = ConnectOptions::new(url.to_string());
        options
            .max_connections(MAX_CONNECTIONS)
            .connect_timeout(Duration::from_secs(30))
            .acquire_timeout(Duration::from_secs(30))
            .sqlx_logging(false)
            .map_sqlx_sqlite_opts(|opts| {
                opts.journal_mode(SqliteJournalMode::Wal)
                    .synchronous(SqliteSynchronous::Normal)
                    .busy_timeout(Duration::from_secs(30))
            });

        let pool = Database::connect(options).await?;
        db_migration::Migrator::up(&pool, None).await?;
        tracing::debug!("Database ready");
        Ok(DBService { pool })
    }
}
