//! SQL tokenizer
//!
//! Lossless: concatenating every token's text reproduces the input exactly,
//! so rewrites only ever touch the tokens they mean to.

/// Token classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Whitespace,
    Comment,
    /// Bare word: keyword or unquoted identifier
    Word,
    /// `"ident"`, `` `ident` `` or `[ident]`
    QuotedIdent,
    /// `'text'`, possibly unterminated
    String,
    Number,
    /// `?`, `?1`, `:name`, `@name`, `$name`
    Parameter,
    Semicolon,
    OpenParen,
    CloseParen,
    Punct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    /// Whitespace and comments
    pub fn is_trivia(&self) -> bool {
        matches!(self.kind, TokenKind::Whitespace | TokenKind::Comment)
    }

    /// Case-insensitive keyword match
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }

    /// Identifier text with any quoting removed
    pub fn identifier(&self) -> Option<String> {
        match self.kind {
            TokenKind::Word => Some(self.text.clone()),
            TokenKind::QuotedIdent if self.text.chars().count() >= 2 => {
                let mut chars = self.text.chars();
                chars.next();
                chars.next_back();
                Some(chars.as_str().to_string())
            }
            _ => None,
        }
    }

    /// Parsed integer value for number tokens
    pub fn as_integer(&self) -> Option<u64> {
        if self.kind == TokenKind::Number {
            self.text.parse().ok()
        } else {
            None
        }
    }
}

fn is_word_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Split SQL text into tokens. Never fails; malformed input yields
/// best-effort tokens (an unterminated string runs to end of input).
pub fn tokenize(sql: &str) -> Vec<Token> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;

        let kind = if c.is_whitespace() {
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            TokenKind::Whitespace
        } else if c == '-' && chars.get(i + 1) == Some(&'-') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            TokenKind::Comment
        } else if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                i += 1;
            }
            i = (i + 2).min(chars.len());
            TokenKind::Comment
        } else if c == '\'' {
            i = scan_quoted(&chars, i, '\'');
            TokenKind::String
        } else if c == '"' || c == '`' {
            i = scan_quoted(&chars, i, c);
            TokenKind::QuotedIdent
        } else if c == '[' {
            i += 1;
            while i < chars.len() && chars[i] != ']' {
                i += 1;
            }
            i = (i + 1).min(chars.len());
            TokenKind::QuotedIdent
        } else if c.is_ascii_digit()
            || (c == '.' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit()))
        {
            i = scan_number(&chars, i);
            TokenKind::Number
        } else if is_word_start(c) {
            while i < chars.len() && is_word_char(chars[i]) {
                i += 1;
            }
            TokenKind::Word
        } else if c == '?' {
            i += 1;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            TokenKind::Parameter
        } else if matches!(c, ':' | '@' | '$')
            && chars.get(i + 1).is_some_and(|&n| is_word_start(n))
        {
            i += 1;
            while i < chars.len() && is_word_char(chars[i]) {
                i += 1;
            }
            TokenKind::Parameter
        } else {
            i += 1;
            match c {
                ';' => TokenKind::Semicolon,
                '(' => TokenKind::OpenParen,
                ')' => TokenKind::CloseParen,
                _ => TokenKind::Punct,
            }
        };

        tokens.push(Token::new(kind, chars[start..i].iter().collect::<String>()));
    }

    tokens
}

/// Scan a quoted run starting at `start`, where a doubled quote escapes itself.
/// Returns the index just past the closing quote, or the end of input.
fn scan_quoted(chars: &[char], start: usize, quote: char) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

fn scan_number(chars: &[char], start: usize) -> usize {
    let mut i = start;
    if chars[i] == '0' && matches!(chars.get(i + 1), Some('x') | Some('X')) {
        i += 2;
        while i < chars.len() && chars[i].is_ascii_hexdigit() {
            i += 1;
        }
        return i;
    }
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i < chars.len() && chars[i] == '.' {
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < chars.len() && matches!(chars[i], 'e' | 'E') {
        let mut j = i + 1;
        if j < chars.len() && matches!(chars[j], '+' | '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            i = j;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    i
}
