use std::fmt;

use thiserror::Error;

/// Error returned by a [`Source`](crate::source::Source) fetch. Passed through untouched.
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Malformed syntax found while reading a literal.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatError {
    /// Machine-readable error code (e.g. `unbalanced-bracket`)
    pub code: &'static str,
    pub message: String,
    /// The offending piece of input
    pub fragment: String,
    /// Byte offset of the problem within the text handed to the component, when known
    pub offset: Option<usize>,
}

impl FormatError {
    pub fn new(code: &'static str, message: impl Into<String>, fragment: impl Into<String>) -> Self {
        FormatError {
            code,
            message: message.into(),
            fragment: fragment.into(),
            offset: None,
        }
    }

    pub fn at(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn invalid_number(fragment: &str) -> Self {
        FormatError::new("invalid-number", "Invalid number", fragment)
    }

    pub fn depth_exceeded(limit: usize, fragment: &str) -> Self {
        FormatError::new(
            "depth-exceeded",
            format!("Nesting deeper than {} levels", limit),
            fragment,
        )
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(offset) => write!(
                f,
                "{} at offset {}: `{}` ({})",
                self.message, offset, self.fragment, self.code
            ),
            None => write!(f, "{}: `{}` ({})", self.message, self.fragment, self.code),
        }
    }
}

impl std::error::Error for FormatError {}

/// Failure of [`ValueParser::parse`](crate::parser::ValueParser::parse).
#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Format(#[from] FormatError),

    /// The token names no known source and is not a number either.
    #[error("Invalid value or unknown source: {token}")]
    ClientInput { token: String },

    #[error("Source `{slug}` failed: {source}")]
    Source {
        slug: String,
        #[source]
        source: SourceError,
    },
}

impl ParseError {
    pub fn is_format(&self) -> bool {
        matches!(self, ParseError::Format(_))
    }

    pub fn is_client_input(&self) -> bool {
        matches!(self, ParseError::ClientInput { .. })
    }
}
