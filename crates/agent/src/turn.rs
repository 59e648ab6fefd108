//! Turn records: one model proposal plus the result of running it

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::sanitizer::{Sanitizer, NOTHING_TO_RUN};
use crate::sql::Statement;

/// Sentinel response for a turn whose prompt overflowed the model context
pub const TOO_LONG: &str = "(too long)";

/// Where a turn is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Extracted from model text, not yet run
    Parsed,
    /// Run, not final
    Continuing,
    /// Run cleanly and final
    Accepted,
    /// Claimed final but errored when run
    Demoted,
}

/// One exchange with the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    #[serde(rename = "final")]
    is_final: bool,
    reason: String,
    query: String,
    original_query: String,
    errored: bool,
    #[serde(default)]
    demoted: bool,
    response: Option<String>,
}

impl Turn {
    pub fn new(is_final: bool, reason: impl Into<String>, query: impl Into<String>) -> Self {
        let query = query.into();
        Self {
            is_final,
            reason: reason.into(),
            original_query: query.clone(),
            query,
            errored: false,
            demoted: false,
            response: None,
        }
    }

    /// Worked example that opens every transcript
    pub fn seed() -> Self {
        Self::new(
            false,
            "I need to know what tables exist.",
            "SELECT name FROM sqlite_master WHERE type='table';",
        )
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Query as last executed, limits included
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Query exactly as the model wrote it
    pub fn original_query(&self) -> &str {
        &self.original_query
    }

    pub fn errored(&self) -> bool {
        self.errored
    }

    pub fn response(&self) -> Option<&str> {
        self.response.as_deref()
    }

    pub fn is_executed(&self) -> bool {
        self.response.is_some()
    }

    /// Carries nothing worth showing the model
    pub fn is_empty(&self) -> bool {
        self.query.trim().is_empty() && self.reason.trim().is_empty() && !self.is_final
    }

    pub fn state(&self) -> TurnState {
        if !self.is_executed() {
            TurnState::Parsed
        } else if self.demoted {
            TurnState::Demoted
        } else if self.is_final && !self.errored {
            TurnState::Accepted
        } else {
            TurnState::Continuing
        }
    }

    /// Run the query once and store the response. Later calls are no-ops.
    /// Returns whether anything ran.
    pub fn populate(&mut self, db: &Database, sanitizer: &Sanitizer) -> bool {
        if self.response.is_some() {
            return false;
        }

        if self.query.trim().is_empty() {
            self.response = Some(String::new());
            return true;
        }

        match sanitizer.execute(db, &self.query, self.is_final) {
            Some(execution) => {
                self.query = execution.query;
                self.errored = execution.errored;
                self.response = Some(execution.response);
            }
            None => self.response = Some(NOTHING_TO_RUN.to_string()),
        }
        true
    }

    /// Re-run an accepted query with final limits, leaving this record untouched
    pub fn rerun(&self, db: &Database, sanitizer: &Sanitizer) -> String {
        match sanitizer.execute(db, &self.original_query, true) {
            Some(execution) => execution.response,
            None => NOTHING_TO_RUN.to_string(),
        }
    }

    /// Flip an errored final turn back to non-final
    pub fn demote(&mut self) {
        if self.is_final && self.errored {
            self.is_final = false;
            self.demoted = true;
        }
    }

    /// Replace the response with the overflow sentinel.
    ///
    /// The one write allowed after `populate`: the prompt carrying this
    /// response did not fit, so the response itself is dropped.
    pub fn mark_too_long(&mut self) {
        self.response = Some(TOO_LONG.to_string());
    }

    /// Render in the scaffolding grammar the model reads and writes
    pub fn format(&self) -> String {
        format!(
            "FINAL: {}\nREASON: {}\n\nSTART-QUERY\n{}\nEND-QUERY\n\nRESPONSE:\n{}\n",
            if self.is_final { "True" } else { "False" },
            self.reason,
            self.query,
            self.response.as_deref().unwrap_or("")
        )
    }

    /// Parse model text in the scaffolding grammar. Never fails.
    pub fn parse(raw: &str) -> Parsed {
        let fields = Fields::scan(raw);

        if !fields.has_scaffolding() {
            let body = raw.trim();
            if is_bare_sql(body) {
                return Parsed::Bare(Turn::new(true, "", body));
            }
            return Parsed::Empty;
        }

        let complete = fields.is_complete();
        let turn = Turn::new(
            fields.is_final.unwrap_or(false),
            fields.reason.unwrap_or_default(),
            fields.query.unwrap_or_default(),
        );

        if turn.is_empty() {
            Parsed::Empty
        } else if complete {
            Parsed::Complete(turn)
        } else {
            Parsed::Partial(turn)
        }
    }

    /// Parse a completion of a prompt that ends on an open `FINAL:` line
    pub fn parse_completion(raw: &str) -> Parsed {
        let head = raw.trim_start();
        let continues = ["true", "false"].iter().any(|b| {
            head.get(..b.len())
                .is_some_and(|word| word.eq_ignore_ascii_case(b))
        });

        if continues {
            Self::parse(&format!("FINAL: {}", head))
        } else {
            Self::parse(raw)
        }
    }
}

/// Outcome of parsing model text
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    /// All three fields present
    Complete(Turn),
    /// Scaffolding present, some fields defaulted
    Partial(Turn),
    /// No scaffolding; the whole text was valid SQL and is taken as final
    Bare(Turn),
    /// Nothing usable
    Empty,
}

impl Parsed {
    pub fn into_turn(self) -> Option<Turn> {
        match self {
            Parsed::Complete(turn) | Parsed::Partial(turn) | Parsed::Bare(turn) => Some(turn),
            Parsed::Empty => None,
        }
    }
}

fn final_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)FINAL:[ \t]*(true|false)\b").unwrap())
}

fn final_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)FINAL:").unwrap())
}

fn reason_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)REASON:[ \t]*(.*)$").unwrap())
}

fn query_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)START-QUERY(.*?)(?:END-QUERY|\z)").unwrap())
}

/// Raw field matches
struct Fields {
    final_marker: bool,
    is_final: Option<bool>,
    reason: Option<String>,
    query: Option<String>,
}

impl Fields {
    fn scan(raw: &str) -> Self {
        let is_final = final_re()
            .captures(raw)
            .map(|c| c[1].eq_ignore_ascii_case("true"));
        let reason = reason_re()
            .captures(raw)
            .map(|c| c[1].trim().to_string());
        let query = query_re()
            .captures(raw)
            .map(|c| c[1].trim().to_string());

        Self {
            final_marker: final_marker_re().is_match(raw),
            is_final,
            reason,
            query,
        }
    }

    fn has_scaffolding(&self) -> bool {
        self.final_marker || self.reason.is_some() || self.query.is_some()
    }

    fn is_complete(&self) -> bool {
        self.is_final.is_some() && self.reason.is_some() && self.query.is_some()
    }
}

/// Every statement in the text passes structural validation
fn is_bare_sql(body: &str) -> bool {
    let statements: Vec<Statement> = Statement::split(body)
        .into_iter()
        .filter(|s| !s.is_blank())
        .collect();
    !statements.is_empty() && statements.iter().all(|s| s.validate().is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_snapshots_original_query() {
        let turn = Turn::new(false, "why", "SELECT 1");
        assert_eq!(turn.query(), "SELECT 1");
        assert_eq!(turn.original_query(), "SELECT 1");
        assert_eq!(turn.state(), TurnState::Parsed);
    }

    #[test]
    fn test_is_empty() {
        assert!(Turn::new(false, "", "").is_empty());
        assert!(Turn::new(false, "  ", "\n").is_empty());
        assert!(!Turn::new(true, "", "").is_empty());
        assert!(!Turn::new(false, "r", "").is_empty());
        assert!(!Turn::new(false, "", "SELECT 1").is_empty());
    }

    #[test]
    fn test_format() {
        let turn = Turn::seed();
        assert_eq!(
            turn.format(),
            "FINAL: False\nREASON: I need to know what tables exist.\n\nSTART-QUERY\nSELECT name FROM sqlite_master WHERE type='table';\nEND-QUERY\n\nRESPONSE:\n\n"
        );
    }

    #[test]
    fn test_parse_complete() {
        let parsed = Turn::parse(
            "FINAL: True\nREASON: Counted them.\n\nSTART-QUERY\nSELECT count(*) FROM t;\nEND-QUERY",
        );
        let Parsed::Complete(turn) = parsed else {
            panic!("expected complete parse, got {:?}", parsed);
        };
        assert!(turn.is_final());
        assert_eq!(turn.reason(), "Counted them.");
        assert_eq!(turn.query(), "SELECT count(*) FROM t;");
    }

    #[test]
    fn test_parse_is_case_insensitive_on_final() {
        let turn = Turn::parse("final: TRUE\nREASON: x\nSTART-QUERY\nSELECT 1\nEND-QUERY")
            .into_turn()
            .unwrap();
        assert!(turn.is_final());
    }

    #[test]
    fn test_parse_missing_end_marker() {
        let turn = Turn::parse("FINAL: False\nREASON: look\nSTART-QUERY\nSELECT * FROM t\n")
            .into_turn()
            .unwrap();
        assert_eq!(turn.query(), "SELECT * FROM t");
    }

    #[test]
    fn test_parse_partial_defaults() {
        let parsed = Turn::parse("REASON: just thinking");
        let Parsed::Partial(turn) = parsed else {
            panic!("expected partial parse, got {:?}", parsed);
        };
        assert!(!turn.is_final());
        assert_eq!(turn.query(), "");
        assert_eq!(turn.reason(), "just thinking");
    }

    #[test]
    fn test_parse_bare_sql_is_final() {
        let parsed = Turn::parse("SELECT name FROM customers WHERE name = 'Smith';");
        let Parsed::Bare(turn) = parsed else {
            panic!("expected bare parse, got {:?}", parsed);
        };
        assert!(turn.is_final());
        assert_eq!(turn.reason(), "");
        assert_eq!(turn.query(), "SELECT name FROM customers WHERE name = 'Smith';");
    }

    #[test]
    fn test_parse_prose_is_empty() {
        assert!(matches!(Turn::parse("I am not sure what to do here."), Parsed::Empty));
        assert!(matches!(Turn::parse(""), Parsed::Empty));
        assert!(matches!(Turn::parse("   \n "), Parsed::Empty));
    }

    #[test]
    fn test_parse_scaffolding_without_content_is_empty() {
        assert!(matches!(
            Turn::parse("FINAL: False\nREASON:\nSTART-QUERY\nEND-QUERY"),
            Parsed::Empty
        ));
    }

    #[test]
    fn test_parse_completion_continues_final_line() {
        let turn = Turn::parse_completion(" True\nREASON: done\n\nSTART-QUERY\nSELECT 1;\n")
            .into_turn()
            .unwrap();
        assert!(turn.is_final());
        assert_eq!(turn.reason(), "done");
        assert_eq!(turn.query(), "SELECT 1;");
    }

    #[test]
    fn test_parse_completion_without_boolean() {
        let turn = Turn::parse_completion("SELECT 1")
            .into_turn()
            .unwrap();
        assert!(turn.is_final());
    }

    #[test]
    fn test_demote_only_errored_final() {
        let mut turn = Turn::new(true, "r", "SELECT 1");
        turn.demote();
        assert!(turn.is_final());

        turn.errored = true;
        turn.response = Some("Error".to_string());
        turn.demote();
        assert!(!turn.is_final());
        assert_eq!(turn.state(), TurnState::Demoted);
    }

    #[test]
    fn test_mark_too_long() {
        let mut turn = Turn::seed();
        turn.response = Some("huge".to_string());
        turn.mark_too_long();
        assert_eq!(turn.response(), Some(TOO_LONG));
    }

    #[test]
    fn test_serializes_final_field_name() {
        let json = serde_json::to_value(Turn::seed()).unwrap();
        assert_eq!(json["final"], false);
        assert_eq!(json["reason"], "I need to know what tables exist.");
        assert!(json["response"].is_null());
    }
}
