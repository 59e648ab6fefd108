//! SQL text handling: tokenizing, classification and limit rewrites

pub mod lexer;
pub mod statement;

pub use lexer::{tokenize, Token, TokenKind};
pub use statement::{Statement, StatementKind, CATALOG_TABLES};
