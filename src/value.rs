use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::geometry::GeometryValue;
use crate::number::Number;

/// One row returned by a source fetch. Opaque to the parser.
pub type Record = serde_json::Value;

/// A typed value produced from one literal token.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedValue {
    Str(String),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Geometry(GeometryValue),
    List(Vec<ParsedValue>),
    /// Whatever the referenced source returned for the given parameters.
    Reference(Vec<Record>),
}

impl From<Number> for ParsedValue {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(n) => ParsedValue::Int(n),
            Number::Float(n) => ParsedValue::Float(n),
        }
    }
}

impl ParsedValue {
    /// Name of the variant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ParsedValue::Str(_) => "string",
            ParsedValue::Int(_) => "integer",
            ParsedValue::Float(_) => "float",
            ParsedValue::Date(_) => "date",
            ParsedValue::Time(_) => "time",
            ParsedValue::DateTime(_) => "datetime",
            ParsedValue::Geometry(_) => "geometry",
            ParsedValue::List(_) => "list",
            ParsedValue::Reference(_) => "reference",
        }
    }

    /// Numeric value of an `Int` or `Float`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParsedValue::Int(n) => Some(*n as f64),
            ParsedValue::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ParsedValue]> {
        match self {
            ParsedValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Serialize to compact JSON.
    pub fn to_json(&self) -> String {
        crate::json::to_json(self)
    }

    /// Serialize to pretty-printed JSON (2-space indent).
    pub fn to_json_pretty(&self) -> String {
        crate::json::to_json_pretty(self)
    }
}
