//! Typed values from untyped literal tokens.
//!
//! A token taken from an imported table or a query string is turned into a
//! [`ParsedValue`]: a quoted string, a number, a date or time, a geometry,
//! a (nested) list, or the records of a named source queried with
//! parameters. Sources, date reading, shape construction and entity
//! decoding are injected collaborators; default implementations are
//! provided for standalone use.
//!
//! ```
//! use litval_rust::{parse_value, ParsedValue, SourceRegistry};
//!
//! let sources = SourceRegistry::new();
//! let value = parse_value("[1,2,[3,4]]", &sources).unwrap();
//! assert_eq!(
//!     value,
//!     ParsedValue::List(vec![
//!         ParsedValue::Int(1),
//!         ParsedValue::Int(2),
//!         ParsedValue::List(vec![ParsedValue::Int(3), ParsedValue::Int(4)]),
//!     ])
//! );
//! ```

pub mod config;
pub mod enclosed;
pub mod entities;
pub mod error;
pub mod geometry;
pub mod json;
pub mod number;
pub mod observe;
pub mod parser;
pub mod range;
pub mod row;
pub mod source;
pub mod temporal;
pub mod value;

pub use config::{NegativePolicy, ParserConfig, RangeOrder};
pub use enclosed::{Token, TokenTree};
pub use error::{FormatError, ParseError, SourceError};
pub use geometry::{GeometryKind, GeometryValue};
pub use number::Number;
pub use parser::ValueParser;
pub use row::RowDecoder;
pub use source::{Parameters, Source, SourceLookup, SourceRegistry, StaticSource};
pub use value::{ParsedValue, Record};

// ── Core API ───────────────────────────────────────────────────────

/// Parse one token with the default config and collaborators, resolving
/// references against `sources`.
pub fn parse_value(text: &str, sources: &dyn SourceLookup) -> Result<ParsedValue, ParseError> {
    ValueParser::new(sources).parse(text)
}

/// Read a grouped / currency / parenthesised-negative numeric literal.
pub fn convert_to_number(text: &str) -> Result<Number, FormatError> {
    number::convert_to_number(text)
}

/// Expand `1-3,5` style ranges into sorted unique integers.
pub fn parse_range(text: &str) -> Result<Vec<i64>, FormatError> {
    range::parse_range(text)
}

/// Tokenize a bracketed expression into a nested token tree.
pub fn parse_enclosed(text: &str) -> Result<TokenTree, FormatError> {
    enclosed::parse_enclosed(text)
}

/// Decode one row of raw fields, UTF-8 first, ISO-8859-1 second. An
/// undecodable row comes back empty.
pub fn decode_row<B: AsRef<[u8]>>(fields: &[B]) -> Vec<String> {
    row::decode_row(fields)
}

#[cfg(test)]
mod tests;
