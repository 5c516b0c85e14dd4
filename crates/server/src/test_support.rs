use std::{
    path::Path,
    sync::{Mutex, MutexGuard, OnceLock},
};

pub const TEST_SESSION_SECRET: &str = "focusboard-test-secret";

const ENV_VARS: [&str; 3] = [
    "FOCUSBOARD_ASSET_DIR",
    "DATABASE_URL",
    "FOCUSBOARD_SESSION_SECRET",
];

pub fn test_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Points the process environment at a scratch asset directory and database
/// for the lifetime of the guard.
pub struct TestEnvGuard {
    _lock: MutexGuard<'static, ()>,
    previous: Vec<(&'static str, Option<String>)>,
}

impl TestEnvGuard {
    pub fn new(temp_root: &Path, db_url: String) -> Self {
        let lock = test_lock().lock().unwrap_or_else(|err| err.into_inner());
        let previous = ENV_VARS
            .iter()
            .map(|name| (*name, std::env::var(name).ok()))
            .collect();

        // SAFETY: tests using TestEnvGuard are serialized by test_lock.
        unsafe {
            std::env::set_var("FOCUSBOARD_ASSET_DIR", temp_root);
            std::env::set_var("DATABASE_URL", db_url);
            std::env::set_var("FOCUSBOARD_SESSION_SECRET", TEST_SESSION_SECRET);
        }

        Self {
            _lock: lock,
            previous,
        }
    }
}

impl Drop for TestEnvGuard {
    fn drop(&mut self) {
        // SAFETY: tests using TestEnvGuard are serialized by test_lock.
        unsafe {
            for (name, value) in &self.previous {
                match value {
                    Some(value) => std::env::set_var(name, value),
                    None => std::env::remove_var(name),
                }
            }
        }
    }
}
