//! Common test utilities for wtf integration tests
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

/// Create a test environment with an isolated home directory
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub config_dir: PathBuf,
}

impl TestEnv {
    /// Create a new test environment
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempdir()?;
        let config_dir = temp_dir.path().join(".wtf");

        Ok(Self {
            temp_dir,
            config_dir,
        })
    }

    /// Path of the config file the binary will read
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }

    /// A path inside the temp directory
    pub fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Create a command that sees only the test environment
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_wtf"));
        cmd.env("HOME", self.temp_dir.path());
        cmd.env_remove("OPENAI_API_KEY");
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// Write a config file from raw JSON
    pub fn write_config(&self, json: &str) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::write(self.config_file(), json)?;
        Ok(())
    }

    /// Create a small SQLite database and return its path
    pub fn create_db(&self, name: &str) -> anyhow::Result<PathBuf> {
        let path = self.path(name);
        let conn = rusqlite::Connection::open(&path)?;
        conn.execute_batch(
            "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT, city TEXT);
             INSERT INTO customers (name, city) VALUES ('Smith', 'Leeds'), ('Jones', 'Hull');",
        )?;
        Ok(path)
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}
