use std::fmt;

use crate::config::DEFAULT_MAX_DEPTH;
use crate::error::FormatError;

/// One term of a bracketed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A run of alphanumerics, `-`, `.`, `(` and `)`
    Literal(String),
    /// A single `,`. Kept so callers can tell list fragments from scalars.
    Separator,
    /// The contents of one `[ ... ]` pair.
    Group(Vec<Token>),
}

/// Terms in input order; nesting mirrors the brackets exactly.
pub type TokenTree = Vec<Token>;

impl Token {
    pub fn literal(s: &str) -> Self {
        Token::Literal(s.to_string())
    }

    pub fn is_separator(&self) -> bool {
        matches!(self, Token::Separator)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Literal(s) => f.write_str(s),
            Token::Separator => f.write_str(","),
            Token::Group(terms) => {
                f.write_str("[")?;
                for term in terms {
                    write!(f, "{}", term)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Canonical text for a token tree: terms concatenated, groups bracketed,
/// no whitespace.
pub fn to_source(tree: &[Token]) -> String {
    tree.iter().map(|t| t.to_string()).collect()
}

/// Tokenizer state: tracks position in the input string.
struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    max_depth: usize,
}

/// Tokenize a bracketed expression such as `[a,b,[c,d]]`.
pub fn parse_enclosed(input: &str) -> Result<TokenTree, FormatError> {
    parse_enclosed_with_depth(input, DEFAULT_MAX_DEPTH)
}

/// Like [`parse_enclosed`], failing with `depth-exceeded` once groups nest
/// more than `max_depth` levels.
pub fn parse_enclosed_with_depth(input: &str, max_depth: usize) -> Result<TokenTree, FormatError> {
    let mut tokenizer = Tokenizer {
        input,
        pos: 0,
        max_depth,
    };
    let mut terms = Vec::new();

    tokenizer.skip_ws();
    while tokenizer.pos < tokenizer.input.len() {
        let term = tokenizer.parse_term(0)?;
        terms.push(term);
        tokenizer.skip_ws();
    }

    Ok(terms)
}

impl<'a> Tokenizer<'a> {
    // ── Helpers ──────────────────────────────────────────────────────

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    fn eat_char(&mut self, ch: char) -> bool {
        if self.peek_char() == Some(ch) {
            self.advance(ch.len_utf8());
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch == ' ' || ch == '\t' || ch == '\r' || ch == '\n' {
                self.advance(ch.len_utf8());
            } else {
                break;
            }
        }
    }

    // ── Terms ───────────────────────────────────────────────────────

    fn parse_term(&mut self, depth: usize) -> Result<Token, FormatError> {
        match self.peek_char() {
            Some('[') => self.parse_group(depth + 1),
            Some(',') => {
                self.advance(1);
                Ok(Token::Separator)
            }
            Some(']') => Err(FormatError::new(
                "unbalanced-bracket",
                "Unexpected ']'",
                self.input,
            )
            .at(self.pos)),
            Some(ch) if is_literal_char(ch) => Ok(Token::Literal(self.parse_literal())),
            Some(ch) => Err(FormatError::new(
                "unexpected-character",
                format!("Unexpected character '{}'", ch),
                self.input,
            )
            .at(self.pos)),
            None => Err(FormatError::new("unbalanced-bracket", "Expected a term", self.input)
                .at(self.pos)),
        }
    }

    fn parse_literal(&mut self) -> String {
        let start = self.pos;
        while let Some(ch) = self.peek_char() {
            if is_literal_char(ch) {
                self.advance(ch.len_utf8());
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_group(&mut self, depth: usize) -> Result<Token, FormatError> {
        let begin = self.pos;
        if depth > self.max_depth {
            return Err(FormatError::depth_exceeded(self.max_depth, self.input).at(begin));
        }
        self.advance(1); // '['

        let mut terms = Vec::new();
        loop {
            self.skip_ws();
            if self.eat_char(']') {
                return Ok(Token::Group(terms));
            }
            if self.pos >= self.input.len() {
                return Err(
                    FormatError::new("unbalanced-bracket", "Unclosed '['", self.input).at(begin)
                );
            }
            let term = self.parse_term(depth)?;
            terms.push(term);
        }
    }
}

/// Check if a character may appear in a bare literal.
fn is_literal_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '.' || ch == '(' || ch == ')'
}
