use std::fmt;

use crate::config::ParserConfig;
use crate::error::FormatError;

/// A numeric literal, integer or fractional.
///
/// The kind is decided by the presence of the decimal symbol alone, so
/// `"2.0"` is a `Float` and `"2"` an `Int` regardless of magnitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn negate(self, fragment: &str) -> Result<Number, FormatError> {
        match self {
            Number::Int(n) => n
                .checked_neg()
                .map(Number::Int)
                .ok_or_else(|| FormatError::invalid_number(fragment)),
            Number::Float(n) => Ok(Number::Float(-n)),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(n) => write!(f, "{}", n),
            Number::Float(n) => write!(f, "{:?}", n),
        }
    }
}

/// Normalise `text` with the default symbols (`,` thousands, `.` decimal, `$` currency).
pub fn convert_to_number(text: &str) -> Result<Number, FormatError> {
    convert_to_number_with(text, &ParserConfig::default())
}

/// Strip grouping and currency symbols, then read the remainder as a number.
///
/// A parenthesised amount is negative; which texts count as parenthesised is
/// governed by [`NegativePolicy`](crate::config::NegativePolicy).
pub fn convert_to_number_with(text: &str, config: &ParserConfig) -> Result<Number, FormatError> {
    convert_at(text, config, 0)
}

pub(crate) fn convert_at(
    text: &str,
    config: &ParserConfig,
    depth: usize,
) -> Result<Number, FormatError> {
    if depth > config.max_depth {
        return Err(FormatError::depth_exceeded(config.max_depth, text));
    }

    let stripped: String = text
        .chars()
        .filter(|&ch| ch != config.thousand_symbol && ch != config.currency_symbol)
        .collect();

    if config.negative_policy.is_negative(&stripped) {
        let interior: String = stripped.chars().filter(|&ch| ch != '(' && ch != ')').collect();
        return convert_at(&interior, config, depth + 1)?.negate(text);
    }

    let literal = stripped.trim();
    if literal.contains(config.decimal_symbol) {
        let normalized = if config.decimal_symbol == '.' {
            literal.to_string()
        } else {
            literal.replace(config.decimal_symbol, ".")
        };
        normalized
            .parse::<f64>()
            .map(Number::Float)
            .map_err(|_| FormatError::invalid_number(text))
    } else {
        literal
            .parse::<i64>()
            .map(Number::Int)
            .map_err(|_| FormatError::invalid_number(text))
    }
}
