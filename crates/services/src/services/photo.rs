use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use db::{
    DBService, DbErr,
    models::employee::{Employee, EmployeeError},
};
use rand::{Rng, distributions::Alphanumeric};
use thiserror::Error;

use super::auth::Caller;

pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;
const PHOTO_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Error)]
pub enum BlobError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Invalid blob key: {0}")]
    InvalidKey(String),
}

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Employee(#[from] EmployeeError),
    #[error(transparent)]
    Blob(#[from] BlobError),
    #[error("Invalid photo data: {0}")]
    InvalidData(String),
    #[error("Photo exceeds {MAX_PHOTO_BYTES} bytes")]
    TooLarge,
    #[error("Employee profile not found")]
    EmployeeNotFound,
}

/// Object storage for uploaded files. `put` returns the URL the object is
/// reachable under.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str)
    -> Result<String, BlobError>;
}

/// Stores blobs as files below `root`. A key `photos/a.jpg` is served as
/// `/photos/a.jpg`.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, BlobError> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !is_plain {
            return Err(BlobError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BlobError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(key, content_type, path = %path.display(), "blob stored");
        Ok(format!("/{key}"))
    }
}

/// Accepts either a `data:<mime>;base64,<payload>` URL or bare base64.
pub fn decode_photo_data(data: &str) -> Result<Vec<u8>, PhotoError> {
    let payload = match data.split_once(',') {
        Some((header, payload)) if header.starts_with("data:") => payload,
        _ => data,
    };
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|err| PhotoError::InvalidData(err.to_string()))?;
    if bytes.is_empty() {
        return Err(PhotoError::InvalidData("empty photo".to_string()));
    }
    if bytes.len() > MAX_PHOTO_BYTES {
        return Err(PhotoError::TooLarge);
    }
    Ok(bytes)
}

/// `photos/employee-<name>-<random>.jpg`, with whitespace runs in the name
/// collapsed to dashes and anything outside `[A-Za-z0-9_-]` dropped.
pub fn photo_key(employee_name: &str) -> String {
    let name = employee_name
        .split_whitespace()
        .map(|part| {
            part.chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
                .collect::<String>()
        })
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("photos/employee-{name}-{suffix}.jpg")
}

#[derive(Clone)]
pub struct PhotoService {
    db: DBService,
    store: Arc<dyn BlobStore>,
}

impl PhotoService {
    pub fn new(db: DBService, store: Arc<dyn BlobStore>) -> Self {
        Self { db, store }
    }

    /// Stores already decoded photo bytes for an existing profile and points
    /// the profile at them.
    pub async fn attach_photo(
        &self,
        employee: &Employee,
        bytes: Vec<u8>,
    ) -> Result<Employee, PhotoError> {
        let key = photo_key(&employee.name);
        let url = self.store.put(&key, bytes, PHOTO_CONTENT_TYPE).await?;
        let updated = Employee::update_photo(&self.db.pool, employee.id, &url).await?;
        tracing::info!(employee_id = %employee.id, "employee photo updated");
        Ok(updated)
    }

    /// Replaces the caller's profile photo.
    pub async fn upload_employee_photo(
        &self,
        caller: &Caller,
        data: &str,
    ) -> Result<Employee, PhotoError> {
        let bytes = decode_photo_data(data)?;
        let employee = Employee::find_by_user_id(&self.db.pool, caller.user_id)
            .await?
            .ok_or(PhotoError::EmployeeNotFound)?;
        self.attach_photo(&employee, bytes).await
    }
}
