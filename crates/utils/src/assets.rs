//! On-disk locations. Nothing here touches the filesystem; callers create
//! directories when they first write into them.

use std::path::PathBuf;

use directories::ProjectDirs;

const PROJECT_ROOT: &str = env!("CARGO_MANIFEST_DIR");
const ASSET_DIR_ENV: &str = "FOCUSBOARD_ASSET_DIR";
const FALLBACK_DIR: &str = ".focusboard";

fn asset_dir_override() -> Option<PathBuf> {
    let value = std::env::var(ASSET_DIR_ENV).ok()?;
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
}

/// `FOCUSBOARD_ASSET_DIR` if set, `dev_assets/` at the workspace root in
/// debug builds, otherwise the platform data directory.
pub fn asset_dir() -> PathBuf {
    if let Some(path) = asset_dir_override() {
        return path;
    }

    if cfg!(debug_assertions) {
        return PathBuf::from(PROJECT_ROOT).join("../../dev_assets");
    }

    match ProjectDirs::from("app", "focusboard", "focusboard") {
        Some(dirs) => dirs.data_dir().to_path_buf(),
        None => {
            tracing::warn!("No home directory found, storing data in {FALLBACK_DIR}");
            PathBuf::from(FALLBACK_DIR)
        }
    }
}

pub fn config_path() -> PathBuf {
    asset_dir().join("config.json")
}

/// Root of the local blob store; photo keys are resolved relative to it.
pub fn blob_dir() -> PathBuf {
    asset_dir().join("blobs")
}

pub fn database_path() -> PathBuf {
    asset_dir().join("db.sqlite")
}
