#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Mutex;

/// Serialises tests that mutate process environment variables.
pub static ENV_LOCK: Mutex<()> = Mutex::new(());

/// A scratch file path that is removed again on drop.
pub struct TempGdx(pub PathBuf);

impl TempGdx {
    pub fn new(name: &str) -> TempGdx {
        let mut path = std::env::temp_dir();
        path.push(format!("gdx-test-{}-{}.gdx", std::process::id(), name));
        let _ = std::fs::remove_file(&path);
        TempGdx(path)
    }

    pub fn as_str(&self) -> &str {
        self.0.to_str().unwrap()
    }
}

impl Drop for TempGdx {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}
