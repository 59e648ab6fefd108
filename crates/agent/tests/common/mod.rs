//! Shared fixtures for agent tests

#![allow(dead_code)]

use async_trait::async_trait;
use mockall::mock;
use rusqlite::Connection;
use tempfile::TempDir;

use wtf_agent::{AgentLoop, Database, RetryPolicy};
use wtf_config::Config;
use wtf_provider::{Completion, CompletionParams, Provider, ProviderError};

mock! {
    pub Provider {}

    #[async_trait]
    impl Provider for Provider {
        async fn complete(&self, params: CompletionParams) -> Result<Completion, ProviderError>;
    }
}

pub const SHOP_SCHEMA: &str = "
    CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL, city TEXT);
    CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INTEGER, total REAL);
    INSERT INTO customers (name, city) VALUES
        ('Smith', 'Leeds'), ('Smith', 'York'), ('Smith', 'Bath'), ('Jones', 'Hull');
    INSERT INTO orders (customer_id, total) VALUES (1, 9.5), (1, 20.0), (4, 3.25);
";

/// Shop database on disk, opened read-only. Keep the `TempDir` alive.
pub fn shop_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.db");
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(SHOP_SCHEMA).unwrap();
    }
    let db = Database::open_read_only(&path).unwrap();
    (dir, db)
}

/// Agent over the shop database with no retry delays
pub fn agent(provider: MockProvider, task: &str) -> (TempDir, AgentLoop<MockProvider>) {
    agent_with_config(provider, task, &Config::default())
}

pub fn agent_with_config(
    provider: MockProvider,
    task: &str,
    config: &Config,
) -> (TempDir, AgentLoop<MockProvider>) {
    let (dir, db) = shop_db();
    let agent = AgentLoop::with_config(provider, db, task, config)
        .with_retry(RetryPolicy::immediate(config.retry.attempts));
    (dir, agent)
}

/// Completion continuing an open `FINAL:` line
pub fn reply(is_final: bool, reason: &str, query: &str) -> Completion {
    Completion::text(format!(
        " {}\nREASON: {}\n\nSTART-QUERY\n{}\n",
        if is_final { "True" } else { "False" },
        reason,
        query
    ))
}
