//! Transcript: the ordered turn history shown to the model

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::turn::Turn;

/// Ordered turn records. Append-only apart from tail pops during failover.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Transcript opening with the table-listing example
    pub fn seeded() -> Self {
        Self {
            turns: vec![Turn::seed()],
        }
    }

    /// Append a turn. Empty turns are dropped; returns whether it was kept.
    pub fn push(&mut self, turn: Turn) -> bool {
        if turn.is_empty() {
            debug!("◆ EMPTY TURN DISCARDED");
            return false;
        }
        self.turns.push(turn);
        true
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn last_mut(&mut self) -> Option<&mut Turn> {
        self.turns.last_mut()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Turns currently holding an execution error
    pub fn error_count(&self) -> usize {
        self.turns.iter().filter(|t| t.errored()).count()
    }

    /// Remove up to `count` turns from the end, oldest first in the result
    pub fn pop_tail(&mut self, count: usize) -> Vec<Turn> {
        let keep = self.turns.len().saturating_sub(count);
        self.turns.split_off(keep)
    }

    /// Most recent turn that carries a query
    pub fn last_with_query(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| !t.query().trim().is_empty())
    }

    /// Every turn in the scaffolding grammar
    pub fn render(&self) -> String {
        self.turns
            .iter()
            .map(Turn::format)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// An accepted final turn exists
    Answered,
    /// The turn or empty-output budget ran out
    Exhausted,
    /// Still producing turns
    Running,
}

/// Exportable record of a whole session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLog {
    pub session_id: Uuid,
    pub task: String,
    pub models: [String; 2],
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: Outcome,
    pub turns: Vec<Turn>,
}

impl SessionLog {
    /// Write as pretty JSON, creating parent directories
    pub async fn save_to(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        info!("◆ TRANSCRIPT SAVED: {}", path.display());
        Ok(())
    }
}
