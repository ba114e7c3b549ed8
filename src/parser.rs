use crate::config::ParserConfig;
use crate::enclosed::{self, Token, TokenTree};
use crate::entities::{EntityDecoder, HtmlEntities};
use crate::error::{FormatError, ParseError};
use crate::geometry::{CoordinateBuilder, GeometryBuilder, GeometryKind, GeometryValue};
use crate::number::{self, Number};
use crate::observe::{Branch, ParseObserver, TracingObserver};
use crate::range;
use crate::source::{self, SourceLookup};
use crate::temporal::{ChronoDateParser, DateTimeParser, TemporalKind};
use crate::value::ParsedValue;

// ── Dispatch tables ─────────────────────────────────────────────────

type Constructor = fn(&dyn GeometryBuilder, &ParsedValue) -> Result<GeometryValue, FormatError>;

enum GeometryForm {
    /// `Point(x,y)` with optional buffer
    Point,
    /// A keyword whose payload is a parsed coordinate structure
    Structured(GeometryKind, Constructor),
    /// `Geometry(..)` with optional buffer
    Shape,
}

/// Geometry keywords, tested in this order.
const GEOMETRY_FORMS: &[(&str, GeometryForm)] = &[
    ("Point", GeometryForm::Point),
    (
        "LineStrings",
        GeometryForm::Structured(GeometryKind::LineString, build_line_strings),
    ),
    (
        "LinearRings",
        GeometryForm::Structured(GeometryKind::LinearRing, build_linear_rings),
    ),
    (
        "Polygon",
        GeometryForm::Structured(GeometryKind::Polygon, build_polygon),
    ),
    (
        "MultiPoint",
        GeometryForm::Structured(GeometryKind::MultiPoint, build_multi_point),
    ),
    (
        "MultiLineString",
        GeometryForm::Structured(GeometryKind::MultiLineString, build_multi_line_string),
    ),
    (
        "MultiPolygon",
        GeometryForm::Structured(GeometryKind::MultiPolygon, build_multi_polygon),
    ),
    ("Geometry", GeometryForm::Shape),
];

/// `DateTime` must precede `Date`.
const TEMPORAL_FORMS: &[(&str, TemporalKind)] = &[
    ("DateTime", TemporalKind::DateTime),
    ("Date", TemporalKind::Date),
    ("Time", TemporalKind::Time),
];

fn build_line_strings(b: &dyn GeometryBuilder, s: &ParsedValue) -> Result<GeometryValue, FormatError> {
    b.line_strings(s)
}

fn build_linear_rings(b: &dyn GeometryBuilder, s: &ParsedValue) -> Result<GeometryValue, FormatError> {
    b.linear_rings(s)
}

fn build_polygon(b: &dyn GeometryBuilder, s: &ParsedValue) -> Result<GeometryValue, FormatError> {
    b.polygon(s)
}

fn build_multi_point(b: &dyn GeometryBuilder, s: &ParsedValue) -> Result<GeometryValue, FormatError> {
    b.multi_point(s)
}

fn build_multi_line_string(
    b: &dyn GeometryBuilder,
    s: &ParsedValue,
) -> Result<GeometryValue, FormatError> {
    b.multi_line_string(s)
}

fn build_multi_polygon(b: &dyn GeometryBuilder, s: &ParsedValue) -> Result<GeometryValue, FormatError> {
    b.multi_polygon(s)
}

// ── Parser ──────────────────────────────────────────────────────────

/// Turns one literal token into a [`ParsedValue`].
///
/// Holds only read-only collaborators; every call is independent and the
/// returned value is owned by the caller.
pub struct ValueParser<'a> {
    config: ParserConfig,
    sources: &'a dyn SourceLookup,
    dates: &'a dyn DateTimeParser,
    geometry: &'a dyn GeometryBuilder,
    entities: &'a dyn EntityDecoder,
    observer: &'a dyn ParseObserver,
}

impl<'a> ValueParser<'a> {
    /// A parser resolving references against `sources`, with the default
    /// config and collaborators.
    pub fn new(sources: &'a dyn SourceLookup) -> Self {
        ValueParser {
            config: ParserConfig::default(),
            sources,
            dates: &ChronoDateParser,
            geometry: &CoordinateBuilder,
            entities: &HtmlEntities,
            observer: &TracingObserver,
        }
    }

    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_dates(mut self, dates: &'a dyn DateTimeParser) -> Self {
        self.dates = dates;
        self
    }

    pub fn with_geometry(mut self, geometry: &'a dyn GeometryBuilder) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_entities(mut self, entities: &'a dyn EntityDecoder) -> Self {
        self.entities = entities;
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn ParseObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Decode entities in `text`, then parse it.
    pub fn parse(&self, text: &str) -> Result<ParsedValue, ParseError> {
        let decoded = self.entities.unescape(text);
        self.parse_at(&decoded, 0)
    }

    pub fn convert_to_number(&self, text: &str) -> Result<Number, FormatError> {
        number::convert_to_number_with(text, &self.config)
    }

    pub fn parse_range(&self, text: &str) -> Result<Vec<i64>, FormatError> {
        range::parse_range_with(text, &self.config)
    }

    pub fn parse_enclosed(&self, text: &str) -> Result<TokenTree, FormatError> {
        enclosed::parse_enclosed_with_depth(text, self.config.max_depth)
    }

    // ── Dispatch ────────────────────────────────────────────────────

    fn parse_at(&self, text: &str, depth: usize) -> Result<ParsedValue, ParseError> {
        if depth > self.config.max_depth {
            return Err(FormatError::depth_exceeded(self.config.max_depth, text).into());
        }
        let text = text.trim();

        if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
            return self.observe(Branch::Quoted, text, depth, || {
                Ok(ParsedValue::Str(text[1..text.len() - 1].to_string()))
            });
        }

        if let Some((keyword, form)) = GEOMETRY_FORMS.iter().find(|(k, _)| text.starts_with(k)) {
            return self.parse_geometry(text, keyword, form, depth);
        }

        if text.starts_with('[') && text.ends_with(']') {
            return self.observe(Branch::List, text, depth, || self.parse_list(text, depth));
        }

        if let Some((keyword, kind)) = TEMPORAL_FORMS.iter().find(|(k, _)| text.starts_with(k)) {
            return self.observe(Branch::Temporal(*kind), text, depth, || {
                self.parse_temporal(text, keyword, *kind)
            });
        }

        self.observe(Branch::Reference, text, depth, || {
            self.parse_reference(text, depth)
        })
    }

    fn observe<F>(
        &self,
        branch: Branch,
        token: &str,
        depth: usize,
        f: F,
    ) -> Result<ParsedValue, ParseError>
    where
        F: FnOnce() -> Result<ParsedValue, ParseError>,
    {
        self.observer.enter(branch, token, depth);
        let result = f();
        self.observer.exit(branch, depth, result.as_ref());
        result
    }

    // ── Geometry ────────────────────────────────────────────────────

    fn parse_geometry(
        &self,
        text: &str,
        keyword: &str,
        form: &GeometryForm,
        depth: usize,
    ) -> Result<ParsedValue, ParseError> {
        match form {
            GeometryForm::Point => {
                self.observe(Branch::Geometry(GeometryKind::Point), text, depth, || {
                    let call = split_call(text, keyword, true)?;
                    let (x, y) = call.args.split_once(',').ok_or_else(|| {
                        FormatError::new("invalid-coordinate", "Expected x,y", call.args)
                    })?;
                    let point = self.geometry.point(coordinate(x)?, coordinate(y)?)?;
                    self.finish_shape(point, call.buffer)
                })
            }
            GeometryForm::Structured(kind, build) => {
                self.observe(Branch::Geometry(*kind), text, depth, || {
                    let call = split_call(text, keyword, false)?;
                    let structure = self.parse_at(call.args, depth + 1)?;
                    Ok(ParsedValue::Geometry(build(self.geometry, &structure)?))
                })
            }
            GeometryForm::Shape => self.observe(Branch::Shape, text, depth, || {
                let call = split_call(text, keyword, true)?;
                let structure = self.parse_at(call.args, depth + 1)?;
                let shape = self.geometry.shape(&structure)?;
                self.finish_shape(shape, call.buffer)
            }),
        }
    }

    fn finish_shape(
        &self,
        shape: GeometryValue,
        buffer: Option<&str>,
    ) -> Result<ParsedValue, ParseError> {
        let shape = match buffer {
            Some(radius) => {
                let radius = radius.trim().parse::<f64>().map_err(|_| {
                    FormatError::new("invalid-geometry", "Buffer radius is not a number", radius)
                })?;
                self.geometry.buffer(shape, radius)?
            }
            None => shape,
        };
        Ok(ParsedValue::Geometry(shape))
    }

    // ── Lists ───────────────────────────────────────────────────────

    fn parse_list(&self, text: &str, depth: usize) -> Result<ParsedValue, ParseError> {
        let budget = self.config.max_depth.saturating_sub(depth);
        let tree = enclosed::parse_enclosed_with_depth(text, budget)?;
        let terms = match tree.as_slice() {
            [Token::Group(terms)] => terms,
            _ => {
                return Err(FormatError::new(
                    "trailing-content",
                    "Expected a single bracketed list",
                    text,
                )
                .into())
            }
        };

        let mut items = Vec::with_capacity(terms.len());
        for term in terms {
            match term {
                Token::Separator => {}
                // Nested fragment: re-bracket and parse as a list of its own
                Token::Group(_) => items.push(self.parse_at(&term.to_string(), depth + 1)?),
                Token::Literal(literal) => items.push(self.parse_at(literal, depth + 1)?),
            }
        }
        Ok(ParsedValue::List(items))
    }

    // ── Dates and times ─────────────────────────────────────────────

    fn parse_temporal(
        &self,
        text: &str,
        keyword: &str,
        kind: TemporalKind,
    ) -> Result<ParsedValue, ParseError> {
        let call = split_call(text, keyword, false)?;
        let timestamp = self.dates.parse_datetime(call.args)?;
        Ok(match kind {
            TemporalKind::DateTime => ParsedValue::DateTime(timestamp),
            TemporalKind::Date => ParsedValue::Date(timestamp.date()),
            TemporalKind::Time => ParsedValue::Time(timestamp.time()),
        })
    }

    // ── References ──────────────────────────────────────────────────

    fn parse_reference(&self, text: &str, depth: usize) -> Result<ParsedValue, ParseError> {
        let (slug, tail) = text.split_once('.').unwrap_or((text, ""));

        match self.sources.lookup(slug) {
            Some(found) => {
                let parameters = source::parse_parameters(tail)?;
                let records = found
                    .fetch(&parameters)
                    .map_err(|err| ParseError::Source {
                        slug: slug.to_string(),
                        source: err,
                    })?;
                Ok(ParsedValue::Reference(records))
            }
            None => self.observe(Branch::Number, text, depth, || {
                number::convert_to_number_with(text, &self.config)
                    .map(ParsedValue::from)
                    .map_err(|_| ParseError::ClientInput {
                        token: text.to_string(),
                    })
            }),
        }
    }
}

// ── Call syntax ─────────────────────────────────────────────────────

const BUFFER: &str = ".buffer(";

/// The pieces of `Keyword(args)` and its optional buffer suffix.
struct Call<'t> {
    args: &'t str,
    buffer: Option<&'t str>,
}

/// Split `Keyword(args)`. With `allow_buffer`, a radius may be given either
/// inside (`Point(1,2.buffer(5))`) or after (`Point(1,2).buffer(5)`) the call.
fn split_call<'t>(text: &'t str, keyword: &str, allow_buffer: bool) -> Result<Call<'t>, FormatError> {
    let malformed = || FormatError::new("invalid-call", format!("Expected {}(...)", keyword), text);

    let rest = text
        .get(keyword.len()..)
        .and_then(|r| r.strip_prefix('('))
        .ok_or_else(malformed)?;
    let close = matching_paren(rest).ok_or_else(malformed)?;
    let args = &rest[..close];
    let tail = rest[close + 1..].trim();

    if tail.is_empty() {
        if allow_buffer {
            if let Some(at) = rfind_top_level(args, BUFFER) {
                let radius = args[at + BUFFER.len()..]
                    .strip_suffix(')')
                    .ok_or_else(malformed)?;
                return Ok(Call {
                    args: &args[..at],
                    buffer: Some(radius),
                });
            }
        }
        return Ok(Call { args, buffer: None });
    }

    if !allow_buffer {
        return Err(FormatError::new(
            "trailing-content",
            format!("Unexpected text after {}(...)", keyword),
            tail,
        ));
    }
    let radius = tail
        .strip_prefix(BUFFER)
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(malformed)?;
    Ok(Call {
        args,
        buffer: Some(radius),
    })
}

/// Byte index of the `)` closing an already-open parenthesis.
fn matching_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' if depth == 0 => return Some(i),
            ')' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Last occurrence of `needle` outside any parentheses.
fn rfind_top_level(text: &str, needle: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut found = None;
    for (i, ch) in text.char_indices() {
        if depth == 0 && text[i..].starts_with(needle) {
            found = Some(i);
        }
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    found
}

fn coordinate(text: &str) -> Result<f64, FormatError> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| FormatError::new("invalid-coordinate", "Coordinate is not a number", text))
}
