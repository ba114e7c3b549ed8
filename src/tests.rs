use std::cell::RefCell;
use std::error::Error as _;

use chrono::{NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use serde_json::json;

use crate::config::{NegativePolicy, ParserConfig, RangeOrder};
use crate::enclosed::{parse_enclosed_with_depth, to_source, Token};
use crate::entities::{EntityDecoder, HtmlEntities, NoEntities};
use crate::error::{FormatError, ParseError};
use crate::geometry::{Coord, CoordinateBuilder, GeometryBuilder, GeometryKind, GeometryValue};
use crate::json::{self, JsonStyle};
use crate::number::{convert_to_number_with, Number};
use crate::observe::{Branch, NoopObserver, ParseObserver};
use crate::parser::ValueParser;
use crate::range::parse_range_with;
use crate::row::RowDecoder;
use crate::source::{parse_parameters, Parameters, SourceRegistry, StaticSource};
use crate::temporal::DateTimeParser;
use crate::value::{ParsedValue, Record};
use crate::{convert_to_number, decode_row, parse_enclosed, parse_range, parse_value};

// ── Shared fixture runners ──────────────────────────────────────────

/// Embed fixture files at compile time.
const VALUE_FIXTURES: &str = include_str!("../test-data/fixtures/values.json");
const ERROR_FIXTURES: &str = include_str!("../test-data/fixtures/errors.json");

#[test]
fn test_fixture_values() {
    let fixtures: Vec<serde_json::Value> = serde_json::from_str(VALUE_FIXTURES).unwrap();
    let sources = SourceRegistry::new();

    for fixture in &fixtures {
        let name = fixture["name"].as_str().unwrap();
        let input = fixture["input"].as_str().unwrap();
        let expected = &fixture["expected"];

        let value = match parse_value(input, &sources) {
            Ok(value) => value,
            Err(e) => panic!("Fixture '{}': unexpected error: {}", name, e),
        };
        let actual: serde_json::Value = serde_json::from_str(&value.to_json()).unwrap();
        assert_eq!(
            &actual, expected,
            "Fixture '{}': value mismatch for input '{}'",
            name, input
        );
    }
}

#[test]
fn test_fixture_errors() {
    let fixtures: Vec<serde_json::Value> = serde_json::from_str(ERROR_FIXTURES).unwrap();
    let sources = SourceRegistry::new();

    for fixture in &fixtures {
        let name = fixture["name"].as_str().unwrap();
        let input = fixture["input"].as_str().unwrap();
        let kind = fixture["error"].as_str().unwrap();

        let err = match parse_value(input, &sources) {
            Ok(value) => panic!("Fixture '{}': expected an error, got {:?}", name, value),
            Err(err) => err,
        };
        match (kind, &err) {
            ("client", ParseError::ClientInput { token }) => {
                assert_eq!(token, input.trim(), "Fixture '{}': token", name);
            }
            ("format", ParseError::Format(e)) => {
                if let Some(code) = fixture.get("code").and_then(|c| c.as_str()) {
                    assert_eq!(e.code, code, "Fixture '{}': {}", name, e);
                }
            }
            _ => panic!("Fixture '{}': expected a {} error, got {:?}", name, kind, err),
        }
    }
}

fn format_error(result: Result<ParsedValue, ParseError>) -> FormatError {
    match result {
        Err(ParseError::Format(e)) => e,
        other => panic!("expected a format error, got {:?}", other),
    }
}

// ── Numbers ─────────────────────────────────────────────────────────

#[test]
fn number_strips_grouping_and_currency() {
    assert_eq!(convert_to_number("1,234.50").unwrap(), Number::Float(1234.5));
    assert_eq!(convert_to_number("$1,200").unwrap(), Number::Int(1200));
    assert_eq!(convert_to_number(" 7 ").unwrap(), Number::Int(7));
}

#[test]
fn number_kind_follows_decimal_symbol() {
    assert_eq!(convert_to_number("2").unwrap(), Number::Int(2));
    assert_eq!(convert_to_number("2.0").unwrap(), Number::Float(2.0));
}

#[test]
fn number_parenthesised_negative() {
    assert_eq!(convert_to_number("(500)").unwrap(), Number::Int(-500));
    assert_eq!(convert_to_number("($1,234.50)").unwrap(), Number::Float(-1234.5));
}

#[test]
fn number_negative_policy() {
    // A lone closing paren is enough by default
    assert_eq!(convert_to_number("500)").unwrap(), Number::Int(-500));
    assert!(convert_to_number("(500").is_err());

    let strict = ParserConfig {
        negative_policy: NegativePolicy::Strict,
        ..ParserConfig::default()
    };
    assert_eq!(convert_to_number_with("(500)", &strict).unwrap(), Number::Int(-500));
    assert!(convert_to_number_with("500)", &strict).is_err());
}

#[test]
fn number_european_symbols() {
    let config = ParserConfig::european();
    assert_eq!(
        convert_to_number_with("1.234,50", &config).unwrap(),
        Number::Float(1234.5)
    );
    assert_eq!(convert_to_number_with("1.234", &config).unwrap(), Number::Int(1234));
}

#[test]
fn number_errors_keep_original_text() {
    let err = convert_to_number("$12abc").unwrap_err();
    assert_eq!(err.code, "invalid-number");
    assert_eq!(err.fragment, "$12abc");

    assert!(convert_to_number("").is_err());
    assert!(convert_to_number("99999999999999999999").is_err());
}

#[test]
fn number_display_keeps_kind() {
    assert_eq!(Number::Int(3).to_string(), "3");
    assert_eq!(Number::Float(3.0).to_string(), "3.0");
}

// ── Ranges ──────────────────────────────────────────────────────────

#[test]
fn range_expands_and_sorts() {
    assert_eq!(parse_range("1-3,5,7-9").unwrap(), vec![1, 2, 3, 5, 7, 8, 9]);
    assert_eq!(parse_range("9,1-2").unwrap(), vec![1, 2, 9]);
}

#[test]
fn range_deduplicates() {
    assert_eq!(parse_range("3,1-3,2").unwrap(), vec![1, 2, 3]);
}

#[test]
fn range_tolerates_spaces() {
    assert_eq!(parse_range(" 1 - 3 , 5 ").unwrap(), vec![1, 2, 3, 5]);
}

#[test]
fn range_uses_first_and_last_component() {
    assert_eq!(parse_range("1-2-4").unwrap(), vec![1, 2, 3, 4]);
}

#[test]
fn range_descending_pair() {
    assert_eq!(parse_range("5-2").unwrap(), Vec::<i64>::new());
    assert_eq!(parse_range("5-2,8").unwrap(), vec![8]);

    let normalized = ParserConfig {
        range_order: RangeOrder::Normalized,
        ..ParserConfig::default()
    };
    assert_eq!(parse_range_with("5-2", &normalized).unwrap(), vec![2, 3, 4, 5]);
}

#[test]
fn range_rejects_non_integers() {
    let err = parse_range("1-3,a-3").unwrap_err();
    assert_eq!(err.code, "invalid-range");
    assert_eq!(err.fragment, "a-3");
    assert_eq!(err.offset, Some(4));

    assert_eq!(parse_range("").unwrap_err().code, "invalid-range");
    assert_eq!(parse_range("1,,2").unwrap_err().code, "invalid-range");
    assert_eq!(parse_range("1.5").unwrap_err().code, "invalid-range");
}

#[test]
fn range_size_is_bounded() {
    let config = ParserConfig {
        max_range_len: 10,
        ..ParserConfig::default()
    };
    assert_eq!(parse_range_with("1-10", &config).unwrap().len(), 10);
    assert_eq!(
        parse_range_with("1-1000", &config).unwrap_err().code,
        "range-too-large"
    );
    assert_eq!(
        parse_range_with("1-6,11-16", &config).unwrap_err().code,
        "range-too-large"
    );
    // Default cap guards against runaway expansions
    assert_eq!(
        parse_range(&format!("0-{}", i64::MAX)).unwrap_err().code,
        "range-too-large"
    );
}

// ── Enclosed tokenizer ──────────────────────────────────────────────

#[test]
fn enclosed_nested_groups() {
    let tree = parse_enclosed("[a,b,[c,d]]").unwrap();
    assert_eq!(
        tree,
        vec![Token::Group(vec![
            Token::literal("a"),
            Token::Separator,
            Token::literal("b"),
            Token::Separator,
            Token::Group(vec![
                Token::literal("c"),
                Token::Separator,
                Token::literal("d"),
            ]),
        ])]
    );
}

/// Drop separators, keeping only the nesting of literals.
fn shape_of(tree: &[Token]) -> serde_json::Value {
    serde_json::Value::Array(
        tree.iter()
            .filter(|t| !t.is_separator())
            .map(|t| match t {
                Token::Literal(s) => json!(s),
                Token::Group(terms) => shape_of(terms),
                Token::Separator => unreachable!(),
            })
            .collect(),
    )
}

#[test]
fn enclosed_structure_without_separators() {
    let tree = parse_enclosed("[a,b,[c,d]]").unwrap();
    assert_eq!(shape_of(&tree), json!([["a", "b", ["c", "d"]]]));
}

#[test]
fn enclosed_whitespace_is_skipped() {
    let tree = parse_enclosed(" [ a , b ] ").unwrap();
    assert_eq!(to_source(&tree), "[a,b]");
}

#[test]
fn enclosed_literal_characters() {
    let tree = parse_enclosed("[Point(1.5,-2)]").unwrap();
    assert_eq!(
        tree,
        vec![Token::Group(vec![
            Token::literal("Point(1.5"),
            Token::Separator,
            Token::literal("-2)"),
        ])]
    );
}

#[test]
fn enclosed_sequence_of_terms() {
    let tree = parse_enclosed("a,[b]").unwrap();
    assert_eq!(
        tree,
        vec![
            Token::literal("a"),
            Token::Separator,
            Token::Group(vec![Token::literal("b")]),
        ]
    );
    assert!(parse_enclosed("").unwrap().is_empty());
}

#[test]
fn enclosed_unbalanced_brackets() {
    let err = parse_enclosed("[a,b").unwrap_err();
    assert_eq!(err.code, "unbalanced-bracket");
    assert_eq!(err.offset, Some(0));

    let err = parse_enclosed("[a]]").unwrap_err();
    assert_eq!(err.code, "unbalanced-bracket");
    assert_eq!(err.offset, Some(3));
}

#[test]
fn enclosed_unexpected_character() {
    let err = parse_enclosed("[a;b]").unwrap_err();
    assert_eq!(err.code, "unexpected-character");
    assert_eq!(err.offset, Some(2));
}

#[test]
fn enclosed_depth_cap() {
    assert!(parse_enclosed_with_depth("[[[a]]]", 3).is_ok());
    let err = parse_enclosed_with_depth("[[[a]]]", 2).unwrap_err();
    assert_eq!(err.code, "depth-exceeded");
    assert_eq!(err.offset, Some(2));
}

#[test]
fn enclosed_deep_input_does_not_overflow() {
    let text = format!("{}a{}", "[".repeat(10_000), "]".repeat(10_000));
    assert_eq!(parse_enclosed(&text).unwrap_err().code, "depth-exceeded");
}

fn token_strategy() -> impl Strategy<Value = Token> {
    let leaf = prop_oneof![
        "[a-zA-Z0-9.()-]{1,6}".prop_map(Token::Literal),
        Just(Token::Separator),
    ];
    leaf.prop_recursive(4, 32, 6, |inner| {
        prop::collection::vec(inner, 0..6).prop_map(Token::Group)
    })
}

proptest! {
    #[test]
    fn enclosed_canonical_text_round_trips(tree in prop::collection::vec(token_strategy(), 0..5)) {
        let text = to_source(&tree);
        let parsed = parse_enclosed(&text).unwrap();
        prop_assert_eq!(to_source(&parsed), text);
        prop_assert_eq!(parse_enclosed(&to_source(&parsed)).unwrap(), parsed);
    }
}

// ── Row decoding ────────────────────────────────────────────────────

#[test]
fn row_utf8() {
    let row = decode_row(&["abc".as_bytes(), "é".as_bytes()]);
    assert_eq!(row, vec!["abc", "é"]);
}

#[test]
fn row_latin1_fallback() {
    assert_eq!(decode_row(&[b"caf\xe9".as_slice()]), vec!["café"]);
}

#[test]
fn row_latin1_keeps_c1_controls() {
    // 0x80..=0x9F map to U+0080..=U+009F, not the windows-1252 glyphs
    assert_eq!(decode_row(&[b"\x80\x9f".as_slice()]), vec!["\u{80}\u{9f}"]);
    assert_eq!(RowDecoder::new().fallback_name(), "ISO-8859-1");
}

#[test]
fn row_windows_1252_fallback_on_request() {
    let decoder = RowDecoder::with_fallback(encoding_rs::WINDOWS_1252);
    assert_eq!(decoder.decode(&[b"\x80".as_slice()]), vec!["€"]);
    assert_eq!(decoder.fallback_name(), "windows-1252");
}

#[test]
fn row_falls_back_as_a_whole() {
    let row = decode_row(&["naïve".as_bytes(), b"caf\xe9".as_slice()]);
    // The first field was valid UTF-8 but is re-read as Latin-1 with the rest
    assert_eq!(row, vec!["naÃ¯ve", "café"]);
}

#[test]
fn row_undecodable_is_empty() {
    let decoder = RowDecoder::with_fallback(encoding_rs::ISO_8859_3);
    assert!(decoder.decode(&[b"ok".as_slice(), b"\xa5".as_slice()]).is_empty());
}

#[test]
fn row_empty_input() {
    assert!(decode_row::<&[u8]>(&[]).is_empty());
}

// ── Value dispatch ──────────────────────────────────────────────────

#[test]
fn value_quoted_string() {
    let sources = SourceRegistry::new();
    assert_eq!(
        parse_value("\"hello\"", &sources).unwrap(),
        ParsedValue::Str("hello".into())
    );
    // Quoted text wins over every other form
    assert_eq!(
        parse_value("\"Point(1,2)\"", &sources).unwrap(),
        ParsedValue::Str("Point(1,2)".into())
    );
}

#[test]
fn value_nested_list() {
    let sources = SourceRegistry::new();
    assert_eq!(
        parse_value("[1,2,[3,4]]", &sources).unwrap(),
        ParsedValue::List(vec![
            ParsedValue::Int(1),
            ParsedValue::Int(2),
            ParsedValue::List(vec![ParsedValue::Int(3), ParsedValue::Int(4)]),
        ])
    );
}

#[test]
fn value_point() {
    let sources = SourceRegistry::new();
    let value = parse_value("Point(1.0,2.0)", &sources).unwrap();
    let ParsedValue::Geometry(geometry) = value else {
        panic!("expected a geometry");
    };
    assert_eq!(geometry, GeometryValue::Point(Coord { x: 1.0, y: 2.0 }));
    assert_eq!(geometry.buffer_radius(), None);
}

#[test]
fn value_point_buffer_forms_agree() {
    let sources = SourceRegistry::new();
    let inside = parse_value("Point(1.0,2.0.buffer(5))", &sources).unwrap();
    let after = parse_value("Point(1.0,2.0).buffer(5)", &sources).unwrap();
    assert_eq!(inside, after);

    let ParsedValue::Geometry(geometry) = inside else {
        panic!("expected a geometry");
    };
    assert_eq!(geometry.kind(), GeometryKind::Point);
    assert_eq!(geometry.buffer_radius(), Some(5.0));
}

#[test]
fn value_structured_geometry_kinds() {
    let sources = SourceRegistry::new();
    let cases = [
        ("LineStrings([[0,0],[1,1]])", GeometryKind::LineString),
        ("LinearRings([[0,0],[1,0],[1,1]])", GeometryKind::LinearRing),
        ("Polygon([[0,0],[1,0],[1,1]])", GeometryKind::Polygon),
        ("MultiPoint([[0,0]])", GeometryKind::MultiPoint),
        ("MultiLineString([[[0,0],[1,1]]])", GeometryKind::MultiLineString),
        ("MultiPolygon([[[0,0],[1,0],[1,1]]])", GeometryKind::MultiPolygon),
    ];
    for (input, kind) in cases {
        match parse_value(input, &sources) {
            Ok(ParsedValue::Geometry(g)) => assert_eq!(g.kind(), kind, "{}", input),
            other => panic!("{}: expected a geometry, got {:?}", input, other),
        }
    }
}

#[test]
fn value_geometry_from_geojson_text() {
    let sources = SourceRegistry::new();
    let value = parse_value(
        r#"Geometry("{"type":"Point","coordinates":[3,4]}")"#,
        &sources,
    )
    .unwrap();
    assert_eq!(
        value,
        ParsedValue::Geometry(GeometryValue::Point(Coord { x: 3.0, y: 4.0 }))
    );
}

#[test]
fn value_geometry_from_referenced_feature() {
    let sources = SourceRegistry::new().with(
        "regions",
        StaticSource::new(vec![json!({
            "type": "Feature",
            "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [2, 0], [2, 2], [0, 0]]]}
        })]),
    );
    let value = parse_value("Geometry(regions).buffer(1.5)", &sources).unwrap();
    let ParsedValue::Geometry(geometry) = value else {
        panic!("expected a geometry");
    };
    assert_eq!(geometry.kind(), GeometryKind::Polygon);
    assert_eq!(geometry.buffer_radius(), Some(1.5));
}

#[test]
fn value_geometry_from_ambiguous_reference() {
    let rows = vec![json!({"type": "Point", "coordinates": [0, 0]}); 2];
    let sources = SourceRegistry::new().with("pins", StaticSource::new(rows));
    let err = format_error(parse_value("Geometry(pins)", &sources));
    assert_eq!(err.code, "invalid-geometry");
}

#[test]
fn value_temporal_kinds() {
    let sources = SourceRegistry::new();
    let date = NaiveDate::from_ymd_opt(2020, 1, 5).unwrap();

    assert_eq!(
        parse_value("Date(2020-01-05)", &sources).unwrap(),
        ParsedValue::Date(date)
    );
    assert_eq!(
        parse_value("DateTime(2020-01-05 10:30:00)", &sources).unwrap(),
        ParsedValue::DateTime(date.and_hms_opt(10, 30, 0).unwrap())
    );
    assert_eq!(
        parse_value("Time(10:30)", &sources).unwrap(),
        ParsedValue::Time(chrono::NaiveTime::from_hms_opt(10, 30, 0).unwrap())
    );
}

struct FixedClock;

impl DateTimeParser for FixedClock {
    fn parse_datetime(&self, _text: &str) -> Result<NaiveDateTime, FormatError> {
        Ok(NaiveDate::from_ymd_opt(1999, 12, 31)
            .unwrap()
            .and_hms_opt(23, 59, 0)
            .unwrap())
    }
}

#[test]
fn value_injected_date_parser() {
    let sources = SourceRegistry::new();
    let parser = ValueParser::new(&sources).with_dates(&FixedClock);
    assert_eq!(
        parser.parse("Date(whenever)").unwrap(),
        ParsedValue::Date(NaiveDate::from_ymd_opt(1999, 12, 31).unwrap())
    );
}

/// Delegates to `CoordinateBuilder`, remembering which operations ran.
#[derive(Default)]
struct RecordingBuilder {
    calls: RefCell<Vec<&'static str>>,
}

impl RecordingBuilder {
    fn record(&self, call: &'static str) {
        self.calls.borrow_mut().push(call);
    }

    fn take(&self) -> Vec<&'static str> {
        self.calls.take()
    }
}

impl GeometryBuilder for RecordingBuilder {
    fn point(&self, x: f64, y: f64) -> Result<GeometryValue, FormatError> {
        self.record("point");
        CoordinateBuilder.point(x, y)
    }

    fn buffer(&self, shape: GeometryValue, radius: f64) -> Result<GeometryValue, FormatError> {
        self.record("buffer");
        CoordinateBuilder.buffer(shape, radius)
    }

    fn line_strings(&self, structure: &ParsedValue) -> Result<GeometryValue, FormatError> {
        self.record("line_strings");
        CoordinateBuilder.line_strings(structure)
    }

    fn linear_rings(&self, structure: &ParsedValue) -> Result<GeometryValue, FormatError> {
        self.record("linear_rings");
        CoordinateBuilder.linear_rings(structure)
    }

    fn polygon(&self, structure: &ParsedValue) -> Result<GeometryValue, FormatError> {
        self.record("polygon");
        CoordinateBuilder.polygon(structure)
    }

    fn multi_point(&self, structure: &ParsedValue) -> Result<GeometryValue, FormatError> {
        self.record("multi_point");
        CoordinateBuilder.multi_point(structure)
    }

    fn multi_line_string(&self, structure: &ParsedValue) -> Result<GeometryValue, FormatError> {
        self.record("multi_line_string");
        CoordinateBuilder.multi_line_string(structure)
    }

    fn multi_polygon(&self, structure: &ParsedValue) -> Result<GeometryValue, FormatError> {
        self.record("multi_polygon");
        CoordinateBuilder.multi_polygon(structure)
    }

    fn shape(&self, structure: &ParsedValue) -> Result<GeometryValue, FormatError> {
        self.record("shape");
        CoordinateBuilder.shape(structure)
    }
}

#[test]
fn value_injected_geometry_builder() {
    let sources = SourceRegistry::new();
    let builder = RecordingBuilder::default();
    let parser = ValueParser::new(&sources).with_geometry(&builder);

    let value = parser.parse("Point(1,2).buffer(3)").unwrap();
    assert_eq!(builder.take(), vec!["point", "buffer"]);
    assert!(matches!(value, ParsedValue::Geometry(g) if g.buffer_radius() == Some(3.0)));

    parser.parse("Point(1,2)").unwrap();
    assert_eq!(builder.take(), vec!["point"]);

    parser.parse("Polygon([[0,0],[1,0],[1,1]])").unwrap();
    assert_eq!(builder.take(), vec!["polygon"]);

    parser.parse("MultiLineString([[[0,0],[1,1]]])").unwrap();
    assert_eq!(builder.take(), vec!["multi_line_string"]);

    parser.parse("Geometry([5,6]).buffer(1)").unwrap();
    assert_eq!(builder.take(), vec!["shape", "buffer"]);

    // The payload of a nested literal goes through the same builder
    parser.parse("Geometry(Point(1,2))").unwrap();
    assert_eq!(builder.take(), vec!["point", "shape"]);
}

/// Rejects every shape, so a default builder answering instead would show.
struct NoShapes;

impl GeometryBuilder for NoShapes {
    fn point(&self, _x: f64, _y: f64) -> Result<GeometryValue, FormatError> {
        Err(FormatError::new("invalid-geometry", "no points", ""))
    }

    fn buffer(&self, shape: GeometryValue, _radius: f64) -> Result<GeometryValue, FormatError> {
        Ok(shape)
    }

    fn line_strings(&self, _: &ParsedValue) -> Result<GeometryValue, FormatError> {
        Err(FormatError::new("invalid-geometry", "no lines", ""))
    }

    fn linear_rings(&self, _: &ParsedValue) -> Result<GeometryValue, FormatError> {
        Err(FormatError::new("invalid-geometry", "no rings", ""))
    }

    fn polygon(&self, _: &ParsedValue) -> Result<GeometryValue, FormatError> {
        Err(FormatError::new("invalid-geometry", "no polygons", ""))
    }

    fn multi_point(&self, _: &ParsedValue) -> Result<GeometryValue, FormatError> {
        Err(FormatError::new("invalid-geometry", "no multi-points", ""))
    }

    fn multi_line_string(&self, _: &ParsedValue) -> Result<GeometryValue, FormatError> {
        Err(FormatError::new("invalid-geometry", "no multi-lines", ""))
    }

    fn multi_polygon(&self, _: &ParsedValue) -> Result<GeometryValue, FormatError> {
        Err(FormatError::new("invalid-geometry", "no multi-polygons", ""))
    }

    fn shape(&self, _: &ParsedValue) -> Result<GeometryValue, FormatError> {
        Err(FormatError::new("invalid-geometry", "no shapes", ""))
    }
}

#[test]
fn value_injected_geometry_errors_surface() {
    let sources = SourceRegistry::new();
    let parser = ValueParser::new(&sources).with_geometry(&NoShapes);
    for (input, message) in [
        ("Point(1,2)", "no points"),
        ("LineStrings([[0,0],[1,1]])", "no lines"),
        ("Geometry([5,6])", "no shapes"),
    ] {
        assert_eq!(format_error(parser.parse(input)).message, message, "{}", input);
    }
}

// ── References ──────────────────────────────────────────────────────

fn people() -> SourceRegistry {
    SourceRegistry::new().with(
        "people",
        StaticSource::new(vec![
            json!({"id": 1, "name": "ada"}),
            json!({"id": 2, "name": "grace"}),
        ]),
    )
}

#[test]
fn reference_fetches_matching_records() {
    let sources = people();
    assert_eq!(
        parse_value("people.id=2", &sources).unwrap(),
        ParsedValue::Reference(vec![json!({"id": 2, "name": "grace"})])
    );
    assert_eq!(
        parse_value("people.name=ada", &sources).unwrap(),
        ParsedValue::Reference(vec![json!({"id": 1, "name": "ada"})])
    );
    assert_eq!(
        parse_value("people.name=nobody", &sources).unwrap(),
        ParsedValue::Reference(vec![])
    );
}

#[test]
fn reference_without_parameters_fetches_everything() {
    let sources = people();
    match parse_value("people", &sources).unwrap() {
        ParsedValue::Reference(records) => assert_eq!(records.len(), 2),
        other => panic!("expected a reference, got {:?}", other),
    }
}

#[test]
fn reference_inside_list() {
    let sources = people();
    let value = parse_value("[people,3]", &sources).unwrap();
    let items = value.as_list().unwrap();
    assert!(matches!(&items[0], ParsedValue::Reference(records) if records.len() == 2));
    assert_eq!(items[1], ParsedValue::Int(3));
}

#[test]
fn reference_duplicate_parameter_keeps_last() {
    let sources = SourceRegistry::new().with(
        "echo",
        |p: &Parameters| -> Result<Vec<Record>, crate::SourceError> {
            Ok(vec![Record::from(p.get("k").cloned().unwrap_or_default())])
        },
    );
    assert_eq!(
        parse_value("echo.k=1&k=2", &sources).unwrap(),
        ParsedValue::Reference(vec![json!("2")])
    );
}

#[test]
fn reference_malformed_parameters() {
    let sources = people();
    let err = format_error(parse_value("people.id", &sources));
    assert_eq!(err.code, "invalid-parameter");

    let err = format_error(parse_value("people.id=1&a=b=c", &sources));
    assert_eq!(err.code, "invalid-parameter");
    assert_eq!(err.offset, Some(5));
}

#[test]
fn reference_fetch_error_propagates() {
    let sources = SourceRegistry::new()
        .with("broken", |_: &Parameters| -> Result<Vec<Record>, crate::SourceError> {
            Err("connection refused".into())
        });
    let err = parse_value("broken.id=1", &sources).unwrap_err();
    match &err {
        ParseError::Source { slug, .. } => assert_eq!(slug, "broken"),
        other => panic!("expected a source error, got {:?}", other),
    }
    assert_eq!(err.source().unwrap().to_string(), "connection refused");
    assert!(!err.is_format() && !err.is_client_input());
}

#[test]
fn reference_unknown_slug_is_client_input() {
    let sources = people();
    let err = parse_value("unknown.field=1", &sources).unwrap_err();
    assert!(err.is_client_input());
    assert_eq!(
        err.to_string(),
        "Invalid value or unknown source: unknown.field=1"
    );
}

#[test]
fn parameters_parse() {
    assert!(parse_parameters("").unwrap().is_empty());
    let params = parse_parameters("a=1&b=&c=x y").unwrap();
    assert_eq!(params["a"], "1");
    assert_eq!(params["b"], "");
    assert_eq!(params["c"], "x y");
}

#[test]
fn registry_from_json() {
    let sources =
        SourceRegistry::from_json(r#"{"colors": [{"name": "red"}, {"name": "blue"}]}"#).unwrap();
    assert_eq!(sources.slugs().collect::<Vec<_>>(), vec!["colors"]);
    assert_eq!(
        parse_value("colors.name=blue", &sources).unwrap(),
        ParsedValue::Reference(vec![json!({"name": "blue"})])
    );
    assert!(SourceRegistry::from_json("[1,2]").is_err());
}

// ── Config, depth, entities ─────────────────────────────────────────

#[test]
fn value_uses_configured_symbols() {
    let sources = SourceRegistry::new();
    let parser = ValueParser::new(&sources).with_config(ParserConfig::european());
    assert_eq!(parser.parse("1.234,50").unwrap(), ParsedValue::Float(1234.5));
    assert_eq!(parser.convert_to_number("2,5").unwrap(), Number::Float(2.5));
    assert_eq!(parser.config().decimal_symbol, ',');
    assert_eq!(parser.config().max_depth, crate::config::DEFAULT_MAX_DEPTH);
}

#[test]
fn value_depth_is_capped() {
    let sources = SourceRegistry::new();
    let deep = format!("{}1{}", "[".repeat(100), "]".repeat(100));
    let err = format_error(parse_value(&deep, &sources));
    assert_eq!(err.code, "depth-exceeded");

    let shallow = ParserConfig {
        max_depth: 2,
        ..ParserConfig::default()
    };
    let parser = ValueParser::new(&sources).with_config(shallow);
    assert!(parser.parse("[[1]]").is_ok());
    assert_eq!(format_error(parser.parse("[[[1]]]")).code, "depth-exceeded");
}

#[test]
fn value_depth_counts_geometry_payloads() {
    let sources = SourceRegistry::new();
    let parser = ValueParser::new(&sources).with_config(ParserConfig {
        max_depth: 1,
        ..ParserConfig::default()
    });
    assert_eq!(
        format_error(parser.parse("Geometry(Geometry(Point(1,2)))")).code,
        "depth-exceeded"
    );
}

#[test]
fn value_entities_decoded_once() {
    let sources = SourceRegistry::new();
    assert_eq!(
        parse_value("&quot;&amp;lt;&quot;", &sources).unwrap(),
        ParsedValue::Str("&lt;".into())
    );
    assert_eq!(
        parse_value("&#34;caf&#xE9;&#34;", &sources).unwrap(),
        ParsedValue::Str("café".into())
    );
}

#[test]
fn value_named_entities() {
    let sources = SourceRegistry::new();
    assert_eq!(
        parse_value("&quot;caf&eacute; &copy; &euro;&nbsp;&Yacute;&yuml;&quot;", &sources).unwrap(),
        ParsedValue::Str("café © €\u{a0}Ýÿ".into())
    );
    // Names outside the table are left alone
    assert_eq!(
        HtmlEntities.unescape("&bogus; &amp;"),
        "&bogus; &"
    );
}

#[test]
fn value_entities_can_be_disabled() {
    let sources = SourceRegistry::new();
    let parser = ValueParser::new(&sources).with_entities(&NoEntities);
    assert!(parser.parse("&quot;x&quot;").unwrap_err().is_client_input());
}

#[derive(Default)]
struct Recorder {
    entered: RefCell<Vec<Branch>>,
    exited: RefCell<Vec<(Branch, bool)>>,
}

impl ParseObserver for Recorder {
    fn enter(&self, branch: Branch, _token: &str, _depth: usize) {
        self.entered.borrow_mut().push(branch);
    }

    fn exit(&self, branch: Branch, _depth: usize, outcome: Result<&ParsedValue, &ParseError>) {
        self.exited.borrow_mut().push((branch, outcome.is_ok()));
    }
}

#[test]
fn observer_sees_every_branch() {
    let sources = SourceRegistry::new();
    let recorder = Recorder::default();
    let parser = ValueParser::new(&sources).with_observer(&recorder);

    parser.parse("[1,2.5]").unwrap();
    assert_eq!(
        *recorder.entered.borrow(),
        vec![
            Branch::List,
            Branch::Reference,
            Branch::Number,
            Branch::Reference,
            Branch::Number,
        ]
    );
    assert_eq!(
        *recorder.exited.borrow(),
        vec![
            (Branch::Number, true),
            (Branch::Reference, true),
            (Branch::Number, true),
            (Branch::Reference, true),
            (Branch::List, true),
        ]
    );
}

#[test]
fn observer_sees_failures() {
    let sources = SourceRegistry::new();
    let recorder = Recorder::default();
    let parser = ValueParser::new(&sources).with_observer(&recorder);

    assert!(parser.parse("Point(x,1)").is_err());
    assert_eq!(
        *recorder.exited.borrow(),
        vec![(Branch::Geometry(GeometryKind::Point), false)]
    );
}

#[test]
fn observer_noop_leaves_results_unchanged() {
    let sources = SourceRegistry::new();
    let quiet = ValueParser::new(&sources).with_observer(&NoopObserver);
    for input in ["[1,2.5]", "Point(1,2).buffer(3)", "Date(2020-01-05)", "\"x\""] {
        assert_eq!(
            quiet.parse(input).unwrap(),
            parse_value(input, &sources).unwrap(),
            "{}",
            input
        );
    }
}

// ── JSON rendering ──────────────────────────────────────────────────

#[test]
fn json_keeps_number_kinds() {
    let value = ParsedValue::List(vec![ParsedValue::Int(2), ParsedValue::Float(2.0)]);
    assert_eq!(json::to_json(&value), "[2,2.0]");
}

#[test]
fn json_pretty() {
    let value = ParsedValue::List(vec![ParsedValue::Int(1), ParsedValue::Str("a".into())]);
    assert_eq!(json::to_json_pretty(&value), "[\n  1,\n  \"a\"\n]");
    assert_eq!(json::to_json_pretty(&ParsedValue::List(vec![])), "[]");
}

#[test]
fn json_wire_tags_temporal_values() {
    let date = NaiveDate::from_ymd_opt(2020, 1, 5).unwrap();
    let value = ParsedValue::List(vec![
        ParsedValue::Date(date),
        ParsedValue::DateTime(date.and_hms_opt(1, 2, 3).unwrap()),
    ]);
    assert_eq!(
        json::to_wire(&value, JsonStyle::Compact),
        r#"[{"$date":"2020-01-05"},{"$datetime":"2020-01-05T01:02:03"}]"#
    );
    assert_eq!(json::to_json(&value), r#"["2020-01-05","2020-01-05T01:02:03"]"#);
}

#[test]
fn json_escapes_strings() {
    let value = ParsedValue::Str("a\"b\\c\n".into());
    assert_eq!(json::to_json(&value), r#""a\"b\\c\n""#);
}

#[test]
fn json_geometry_with_buffer() {
    let value = ParsedValue::Geometry(GeometryValue::Buffered {
        shape: Box::new(GeometryValue::Point(Coord { x: 1.0, y: 2.0 })),
        radius: 3.0,
    });
    assert_eq!(
        json::to_json(&value),
        r#"{"type":"Point","coordinates":[1.0,2.0],"buffer":3.0}"#
    );
}

#[test]
fn json_reference_records_verbatim() {
    let value = ParsedValue::Reference(vec![json!({"id": 1})]);
    assert_eq!(value.to_json(), r#"[{"id":1}]"#);
}
