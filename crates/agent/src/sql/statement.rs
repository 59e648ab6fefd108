//! Immutable SQL statement values
//!
//! Every rewrite (limit injection, limit relaxation) produces a new
//! `Statement`; the source value is never touched.

use std::fmt;

use super::lexer::{tokenize, Token, TokenKind};

/// Catalog tables that always run with full results
pub const CATALOG_TABLES: &[&str] = &[
    "sqlite_master",
    "sqlite_schema",
    "sqlite_temp_master",
    "sqlite_temp_schema",
];

/// Keywords a statement may start with
const STATEMENT_VERBS: &[&str] = &[
    "SELECT", "VALUES", "WITH", "PRAGMA", "INSERT", "UPDATE", "DELETE", "REPLACE", "CREATE",
    "DROP", "ALTER", "EXPLAIN", "ANALYZE", "ATTACH", "DETACH", "BEGIN", "COMMIT", "END",
    "ROLLBACK", "SAVEPOINT", "RELEASE", "REINDEX", "VACUUM",
];

/// Keywords that mutate data when they appear inside a `WITH` statement
const DATA_MODIFYING: &[&str] = &["INSERT", "UPDATE", "DELETE", "REPLACE", "UPSERT"];

/// Clause keywords that cannot end a statement
const DANGLING: &[&str] = &[
    "SELECT", "FROM", "WHERE", "AND", "OR", "NOT", "LIMIT", "OFFSET", "BY", "ORDER", "GROUP",
    "HAVING", "JOIN", "ON", "AS", "IN", "LIKE", "GLOB", "IS", "BETWEEN", "UNION", "ALL",
    "DISTINCT", "SET", "VALUES", "WITH", "CASE", "WHEN", "THEN", "ELSE", "INTO", "LEFT",
    "INNER", "OUTER", "CROSS", "NATURAL", "USING", "EXCEPT", "INTERSECT", "PRAGMA",
];

/// Statement classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Read-only query: `SELECT`, `VALUES`, or a `WITH` that does not modify data
    Select,
    /// Read-only `PRAGMA`
    Pragma,
    /// Anything else; never executed
    Other,
}

/// Location of a top-level `LIMIT` clause
#[derive(Debug, Clone, Copy)]
struct LimitClause {
    /// Index of the row-count token, if the clause has one
    count: Option<usize>,
}

/// A single SQL statement, including its terminator and surrounding trivia
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    tokens: Vec<Token>,
}

impl Statement {
    /// Parse text as one statement without splitting
    pub fn parse(sql: &str) -> Self {
        Self {
            tokens: tokenize(sql),
        }
    }

    /// Split text into statements at top-level semicolons.
    ///
    /// Lossless: the concatenation of every piece's text is the input. Trivia
    /// after a terminator belongs to the following piece, so pieces may be
    /// blank; callers skip those with [`Statement::is_blank`].
    pub fn split(sql: &str) -> Vec<Self> {
        let mut statements = Vec::new();
        let mut current = Vec::new();

        for token in tokenize(sql) {
            let terminator = token.kind == TokenKind::Semicolon;
            current.push(token);
            if terminator {
                statements.push(Self {
                    tokens: std::mem::take(&mut current),
                });
            }
        }
        if !current.is_empty() {
            statements.push(Self { tokens: current });
        }

        statements
    }

    /// No tokens besides trivia and terminators
    pub fn is_blank(&self) -> bool {
        self.significant().next().is_none()
    }

    /// Significant tokens (no trivia, no terminator) with their indexes
    fn significant(&self) -> impl Iterator<Item = (usize, &Token)> {
        self.tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_trivia() && t.kind != TokenKind::Semicolon)
    }

    /// Significant tokens at parenthesis depth zero
    fn top_level(&self) -> Vec<(usize, &Token)> {
        let mut depth = 0i32;
        let mut out = Vec::new();
        for (i, token) in self.significant() {
            match token.kind {
                TokenKind::OpenParen => depth += 1,
                TokenKind::CloseParen => depth -= 1,
                _ if depth == 0 => out.push((i, token)),
                _ => {}
            }
        }
        out
    }

    fn first_word(&self) -> Option<&Token> {
        self.significant().map(|(_, t)| t).next()
    }

    /// Classify by the first keyword
    pub fn kind(&self) -> StatementKind {
        let Some(first) = self.first_word() else {
            return StatementKind::Other;
        };

        if first.is_keyword("SELECT") || first.is_keyword("VALUES") {
            return StatementKind::Select;
        }

        if first.is_keyword("WITH") {
            let modifies = self
                .significant()
                .any(|(_, t)| DATA_MODIFYING.iter().any(|k| t.is_keyword(k)));
            return if modifies {
                StatementKind::Other
            } else {
                StatementKind::Select
            };
        }

        if first.is_keyword("PRAGMA") {
            let assigns = self
                .significant()
                .any(|(_, t)| t.kind == TokenKind::Punct && t.text == "=");
            let toggles_guard = self.significant().any(|(_, t)| {
                t.identifier()
                    .is_some_and(|id| id.eq_ignore_ascii_case("query_only"))
            });
            return if assigns || toggles_guard {
                StatementKind::Other
            } else {
                StatementKind::Pragma
            };
        }

        StatementKind::Other
    }

    /// Table named by the first top-level `FROM`, unquoted, without schema
    pub fn from_target(&self) -> Option<String> {
        let top = self.top_level();
        let from = top.iter().position(|(_, t)| t.is_keyword("FROM"))?;

        let first = top.get(from + 1)?.1.identifier()?;
        let qualified = top
            .get(from + 2)
            .is_some_and(|(_, t)| t.kind == TokenKind::Punct && t.text == ".");
        if qualified {
            if let Some(name) = top.get(from + 3).and_then(|(_, t)| t.identifier()) {
                return Some(name);
            }
        }
        Some(first)
    }

    /// Reads a catalog table
    pub fn is_catalog(&self) -> bool {
        self.from_target().is_some_and(|table| {
            CATALOG_TABLES
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&table))
        })
    }

    fn limit_clause(&self) -> Option<LimitClause> {
        let top = self.top_level();
        let at = top.iter().position(|(_, t)| t.is_keyword("LIMIT"))?;

        let mut count = top.get(at + 1).map(|(i, _)| *i);
        // LIMIT <offset>, <count>
        let comma = top
            .get(at + 2)
            .is_some_and(|(_, t)| t.kind == TokenKind::Punct && t.text == ",");
        if comma {
            count = top.get(at + 3).map(|(i, _)| *i);
        }

        Some(LimitClause { count })
    }

    /// Has a top-level `LIMIT` clause
    pub fn has_limit(&self) -> bool {
        self.limit_clause().is_some()
    }

    /// Literal row count of the top-level `LIMIT`, if it is an integer
    pub fn limit(&self) -> Option<u64> {
        let index = self.limit_clause()?.count?;
        self.tokens[index].as_integer()
    }

    /// Position right after the last significant token
    fn insertion_point(&self) -> usize {
        self.significant()
            .last()
            .map(|(i, _)| i + 1)
            .unwrap_or(self.tokens.len())
    }

    fn inserting_limit(&self, rows: u32) -> Self {
        let at = self.insertion_point();
        let mut tokens = Vec::with_capacity(self.tokens.len() + 4);
        tokens.extend_from_slice(&self.tokens[..at]);
        tokens.push(Token::new(TokenKind::Whitespace, " "));
        tokens.push(Token::new(TokenKind::Word, "LIMIT"));
        tokens.push(Token::new(TokenKind::Whitespace, " "));
        tokens.push(Token::new(TokenKind::Number, rows.to_string()));
        tokens.extend_from_slice(&self.tokens[at..]);
        Self { tokens }
    }

    /// Copy with `LIMIT rows` appended, unless a limit is already present
    pub fn with_limit(&self, rows: u32) -> Self {
        if self.has_limit() {
            return self.clone();
        }
        self.inserting_limit(rows)
    }

    /// Copy with the limit set to `rows`. An explicit `LIMIT 1` is kept.
    pub fn relaxed(&self, rows: u32) -> Self {
        match self.limit_clause() {
            None => self.inserting_limit(rows),
            Some(_) if self.limit() == Some(1) => self.clone(),
            Some(LimitClause { count: Some(index) }) => {
                let mut tokens = self.tokens.clone();
                tokens[index] = Token::new(TokenKind::Number, rows.to_string());
                Self { tokens }
            }
            // A bare LIMIT fails validation either way
            Some(LimitClause { count: None }) => self.clone(),
        }
    }

    /// Structural check. Returns the first problem found.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let Some(first) = self.first_word() else {
            return Err("Empty statement".to_string());
        };

        if !STATEMENT_VERBS.iter().any(|v| first.is_keyword(v)) {
            return Err(format!("Unexpected '{}' at start of statement", first.text));
        }

        let mut depth = 0i32;
        for (_, token) in self.significant() {
            match token.kind {
                TokenKind::OpenParen => depth += 1,
                TokenKind::CloseParen => {
                    depth -= 1;
                    if depth < 0 {
                        return Err("Unmatched ')'".to_string());
                    }
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err("Unclosed '('".to_string());
        }

        if let Some((_, last)) = self.significant().last() {
            if DANGLING.iter().any(|k| last.is_keyword(k)) {
                return Err(format!("Incomplete input after '{}'", last.text));
            }
        }

        Ok(())
    }

    /// Statement text without surrounding whitespace
    pub fn trimmed(&self) -> String {
        self.to_string().trim().to_string()
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            f.write_str(&token.text)?;
        }
        Ok(())
    }
}
