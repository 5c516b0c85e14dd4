//! Scratch locations for tests that need a real file-backed database or an
//! asset directory on disk.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A temporary directory holding a SQLite file. The directory and the
/// database are removed when this value is dropped.
pub struct TempDatabase {
    dir: TempDir,
    path: PathBuf,
}

impl TempDatabase {
    pub fn new() -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("focusboard-db-").tempdir()?;
        let path = dir.path().join("test.sqlite");
        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Connection URL with create-if-missing enabled.
    pub fn url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.path.to_string_lossy())
    }
}

pub fn temp_dir() -> std::io::Result<TempDir> {
    tempfile::Builder::new().prefix("focusboard-").tempdir()
}
