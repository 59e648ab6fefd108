//! Read-only SQLite access for the exploration agent.
//!
//! The file is opened with `SQLITE_OPEN_READ_ONLY` and then locked further
//! with `PRAGMA query_only`, so writes fail inside SQLite even if a statement
//! slips past classification.

use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use crate::table::Table;

/// Rendering of SQL NULL
pub const NULL_TEXT: &str = "NONE";

/// Read-only database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open an existing database file read-only
    pub fn open_read_only(path: &Path) -> crate::Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        debug!("◆ DATABASE OPENED: {}", path.display());
        Self::from_connection(conn)
    }

    /// Wrap an existing connection, switching it to query-only mode.
    ///
    /// Tests use this with an in-memory database they populated first.
    pub fn from_connection(conn: Connection) -> crate::Result<Self> {
        conn.execute_batch("PRAGMA query_only = 1;")?;
        Ok(Self { conn })
    }

    /// Run one statement, fetching at most `max_rows` rows (all when `None`)
    pub fn run(&self, sql: &str, max_rows: Option<usize>) -> rusqlite::Result<Table> {
        let mut stmt = self.conn.prepare(sql)?;
        let headers: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let columns = headers.len();

        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while max_rows.map_or(true, |max| out.len() < max) {
            let Some(row) = rows.next()? else {
                break;
            };
            let mut cells = Vec::with_capacity(columns);
            for i in 0..columns {
                cells.push(render_value(row.get::<_, Value>(i)?));
            }
            out.push(cells);
        }

        Ok(Table::new(headers, out))
    }

    /// SQLite accepts the statement
    pub fn compiles(&self, sql: &str) -> bool {
        self.conn.prepare(sql).is_ok()
    }
}

fn render_value(value: Value) -> String {
    match value {
        Value::Null => NULL_TEXT.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => format!("{:?}", f),
        Value::Text(s) => s,
        Value::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Database {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER, name TEXT, score REAL, data BLOB);
             INSERT INTO t VALUES (1, 'a', 1.5, NULL), (2, NULL, 2.0, x'0102'), (3, 'c', NULL, NULL);",
        )
        .unwrap();
        Database::from_connection(conn).unwrap()
    }

    #[test]
    fn test_run_fetches_all_rows() {
        let db = fixture();
        let table = db.run("SELECT id FROM t ORDER BY id", None).unwrap();
        assert_eq!(table.headers, vec!["id"]);
        assert_eq!(table.rows.len(), 3);
    }

    #[test]
    fn test_run_respects_row_cap() {
        let db = fixture();
        let table = db.run("SELECT id FROM t", Some(2)).unwrap();
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn test_value_rendering() {
        let db = fixture();
        let table = db
            .run("SELECT name, score, data FROM t WHERE id = 2", None)
            .unwrap();
        assert_eq!(table.rows[0], vec!["NONE", "2.0", "<2 bytes>"]);
    }

    #[test]
    fn test_writes_are_refused() {
        let db = fixture();
        assert!(db.run("DELETE FROM t", None).is_err());
        assert!(db.run("CREATE TABLE u (x)", None).is_err());
        assert_eq!(db.run("SELECT count(*) AS n FROM t", None).unwrap().rows[0][0], "3");
    }

    #[test]
    fn test_compiles() {
        let db = fixture();
        assert!(db.compiles("SELECT * FROM t LIMIT 2"));
        assert!(!db.compiles("SELECT * FROM missing"));
        assert!(!db.compiles("SELECT * FROM t WHERE name = 'a LIMIT 2"));
    }

    #[test]
    fn test_open_read_only_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Database::open_read_only(&dir.path().join("missing.db")).is_err());
    }
}
