use std::collections::BTreeMap;

use crate::error::{FormatError, SourceError};
use crate::value::Record;

/// Named query parameters of a reference expression.
pub type Parameters = BTreeMap<String, String>;

/// An external data provider addressed by slug.
pub trait Source {
    /// Return every record matching `parameters`.
    fn fetch(&self, parameters: &Parameters) -> Result<Vec<Record>, SourceError>;
}

impl<F> Source for F
where
    F: Fn(&Parameters) -> Result<Vec<Record>, SourceError>,
{
    fn fetch(&self, parameters: &Parameters) -> Result<Vec<Record>, SourceError> {
        self(parameters)
    }
}

/// Resolves a slug to a source.
pub trait SourceLookup {
    fn lookup(&self, slug: &str) -> Option<&dyn Source>;
}

/// Split the tail of a reference expression (`key1=val1&key2=val2`) into
/// parameters. Values are kept raw. A repeated key keeps its last value.
/// An empty tail gives no parameters.
pub fn parse_parameters(tail: &str) -> Result<Parameters, FormatError> {
    let mut parameters = Parameters::new();
    if tail.is_empty() {
        return Ok(parameters);
    }

    let mut offset = 0;
    for part in tail.split('&') {
        let mut pieces = part.split('=');
        match (pieces.next(), pieces.next(), pieces.next()) {
            (Some(key), Some(value), None) => {
                if let Some(previous) = parameters.insert(key.to_string(), value.to_string()) {
                    tracing::debug!(key, previous = %previous, value, "duplicate parameter, keeping last");
                }
            }
            _ => {
                return Err(FormatError::new(
                    "invalid-parameter",
                    "Expected key=value",
                    part,
                )
                .at(offset));
            }
        }
        offset += part.len() + 1;
    }

    Ok(parameters)
}

// ── In-memory registry ──────────────────────────────────────────────

/// A slug-keyed set of sources.
#[derive(Default)]
pub struct SourceRegistry {
    sources: BTreeMap<String, Box<dyn Source>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, slug: impl Into<String>, source: impl Source + 'static) {
        self.sources.insert(slug.into(), Box::new(source));
    }

    pub fn with(mut self, slug: impl Into<String>, source: impl Source + 'static) -> Self {
        self.register(slug, source);
        self
    }

    pub fn slugs(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    /// Load `{ "slug": [ {row}, ... ], ... }` into [`StaticSource`]s.
    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        let tables: BTreeMap<String, Vec<Record>> = serde_json::from_str(input)?;
        let mut registry = SourceRegistry::new();
        for (slug, rows) in tables {
            registry.register(slug, StaticSource::new(rows));
        }
        Ok(registry)
    }
}

impl SourceLookup for SourceRegistry {
    fn lookup(&self, slug: &str) -> Option<&dyn Source> {
        self.sources.get(slug).map(|s| s.as_ref())
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.sources.keys()).finish()
    }
}

/// A fixed table of records. `fetch` keeps rows whose fields equal every
/// parameter, comparing numbers and booleans by their JSON text.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    rows: Vec<Record>,
}

impl StaticSource {
    pub fn new(rows: Vec<Record>) -> Self {
        StaticSource { rows }
    }
}

impl Source for StaticSource {
    fn fetch(&self, parameters: &Parameters) -> Result<Vec<Record>, SourceError> {
        Ok(self
            .rows
            .iter()
            .filter(|row| {
                parameters.iter().all(|(key, wanted)| match row.get(key) {
                    Some(Record::String(s)) => s == wanted,
                    Some(other) => other.to_string() == *wanted,
                    None => false,
                })
            })
            .cloned()
            .collect())
    }
}
