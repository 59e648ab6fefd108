//! Query sanitizer: classifies model SQL, bounds its row count, runs it
//! read-only and renders a length-bounded response.

use tracing::{debug, warn};

use wtf_config::SanitizerConfig;

use crate::database::Database;
use crate::sql::{Statement, StatementKind};
use crate::table::Table;

/// Response for text with nothing runnable in it
pub const NOTHING_TO_RUN: &str = "Only SELECT and PRAGMA statements can be run.";

/// Result of sanitizing and running one query text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Rendered response for the model
    pub response: String,
    /// Query text as actually executed, limits included
    pub query: String,
    /// A statement failed validation or raised inside SQLite
    pub errored: bool,
}

/// Synthetic one-row result standing in for a failure
fn error_table(message: impl std::fmt::Display) -> Table {
    Table::message("error", format!("Error: {}. Try a different way.", message))
}

/// Row limits and output caps
#[derive(Debug, Clone)]
pub struct Sanitizer {
    explore_limit: u32,
    final_limit: u32,
    truncate_at: usize,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::from_config(&SanitizerConfig::default())
    }
}

impl Sanitizer {
    pub fn from_config(config: &SanitizerConfig) -> Self {
        Self {
            explore_limit: config.explore_limit,
            final_limit: config.final_limit,
            truncate_at: config.truncate_at,
        }
    }

    /// Rewrite a statement's limit for the current mode, committing the
    /// rewrite only if it still validates and compiles.
    fn bounded(&self, db: &Database, statement: &Statement, is_final: bool) -> Statement {
        let candidate = if is_final {
            statement.relaxed(self.final_limit)
        } else {
            statement.with_limit(self.explore_limit)
        };

        if candidate == *statement {
            return candidate;
        }

        let sql = candidate.to_string();
        if candidate.validate().is_ok() && db.compiles(&sql) {
            candidate
        } else {
            debug!("◆ LIMIT REWRITE DISCARDED: {}", sql.trim());
            statement.clone()
        }
    }

    /// Run every executable statement in `raw`.
    ///
    /// Returns `None` when nothing in the text is a `SELECT` or read-only
    /// `PRAGMA`. Database errors never escape; they become error rows.
    pub fn execute(&self, db: &Database, raw: &str, is_final: bool) -> Option<Execution> {
        let mut responses = Vec::new();
        let mut rewritten = String::new();
        let mut errored = false;
        let mut ran = false;

        for statement in Statement::split(raw) {
            if statement.is_blank() {
                rewritten.push_str(&statement.to_string());
                continue;
            }

            let kind = statement.kind();
            if kind == StatementKind::Other {
                warn!("◆ STATEMENT REFUSED: {}", statement.trimmed());
                rewritten.push_str(&statement.to_string());
                continue;
            }
            ran = true;

            if let Err(message) = statement.validate() {
                debug!("◆ SYNTAX CHECK FAILED: {}", message);
                errored = true;
                rewritten.push_str(&statement.to_string());
                responses.push(error_table(message).render_bounded(Some(self.truncate_at)));
                continue;
            }

            // Catalog reads and pragmas run untouched and untruncated
            let unbounded = kind == StatementKind::Pragma || statement.is_catalog();
            let (statement, max_rows, cap) = if unbounded {
                (statement, None, None)
            } else if is_final {
                (self.bounded(db, &statement, true), None, None)
            } else {
                let rows = self.explore_limit as usize;
                (
                    self.bounded(db, &statement, false),
                    Some(rows),
                    Some(self.truncate_at),
                )
            };

            let sql = statement.to_string();
            rewritten.push_str(&sql);

            let table = match db.run(&sql, max_rows) {
                Ok(table) => table,
                Err(e) => {
                    debug!("◆ EXECUTION FAILED: {}", e);
                    errored = true;
                    error_table(e)
                }
            };

            let rendered = table.render_bounded(cap);
            if !rendered.is_empty() {
                responses.push(rendered);
            }
        }

        if !ran {
            return None;
        }

        Some(Execution {
            response: responses.join("\n"),
            query: rewritten.trim().to_string(),
            errored,
        })
    }
}
