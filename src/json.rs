use std::fmt::Write;

use crate::geometry::{Coord, GeometryValue, Polygon};
use crate::value::ParsedValue;

/// JSON formatting style.
#[derive(Clone, Copy)]
pub enum JsonStyle {
    /// Compact: no whitespace between tokens.
    Compact,
    /// Pretty: 2-space indented, one entry per line.
    Pretty,
}

struct JsonWriter {
    buf: String,
    style: JsonStyle,
    depth: usize,
    /// When true, temporal values are wrapped as `{"$date": "..."}` etc.
    wire: bool,
}

impl JsonWriter {
    fn new(style: JsonStyle) -> Self {
        JsonWriter {
            buf: String::new(),
            style,
            depth: 0,
            wire: false,
        }
    }

    fn is_pretty(&self) -> bool {
        matches!(self.style, JsonStyle::Pretty)
    }

    fn newline(&mut self) {
        if self.is_pretty() {
            self.buf.push('\n');
            for _ in 0..self.depth {
                self.buf.push_str("  ");
            }
        }
    }

    fn space(&mut self) {
        if self.is_pretty() {
            self.buf.push(' ');
        }
    }

    fn write_value(&mut self, value: &ParsedValue) {
        match value {
            ParsedValue::Str(s) => self.write_string_value(s),
            ParsedValue::Int(n) => write!(&mut self.buf, "{}", n).unwrap(),
            ParsedValue::Float(n) => self.write_float(*n),
            ParsedValue::Date(d) => self.write_temporal("$date", &d.format("%Y-%m-%d").to_string()),
            ParsedValue::Time(t) => self.write_temporal("$time", &t.format("%H:%M:%S%.f").to_string()),
            ParsedValue::DateTime(dt) => {
                self.write_temporal("$datetime", &dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
            ParsedValue::Geometry(g) => self.write_geometry(g, None),
            ParsedValue::List(items) => self.write_array(items, Self::write_value),
            ParsedValue::Reference(records) => {
                self.write_array(records, |w, record| write!(&mut w.buf, "{}", record).unwrap())
            }
        }
    }

    fn write_float(&mut self, n: f64) {
        // Debug keeps the fraction on integral values (`2.0`), so floats stay floats.
        if n.is_finite() {
            write!(&mut self.buf, "{:?}", n).unwrap();
        } else {
            self.buf.push_str("null");
        }
    }

    fn write_temporal(&mut self, wire_key: &str, text: &str) {
        if self.wire {
            self.buf.push('{');
            self.write_key(wire_key);
            self.write_string_value(text);
            self.buf.push('}');
        } else {
            self.write_string_value(text);
        }
    }

    fn write_array<T>(&mut self, items: &[T], mut write_item: impl FnMut(&mut Self, &T)) {
        self.buf.push('[');
        self.depth += 1;

        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.buf.push(',');
            }
            self.newline();
            write_item(self, item);
        }

        self.depth -= 1;
        if !items.is_empty() {
            self.newline();
        }
        self.buf.push(']');
    }

    // ── Geometry as GeoJSON ─────────────────────────────────────────

    fn write_geometry(&mut self, geometry: &GeometryValue, buffer: Option<f64>) {
        if let GeometryValue::Buffered { shape, radius } = geometry {
            return self.write_geometry(shape, Some(*radius));
        }

        self.buf.push('{');
        self.depth += 1;

        let mut first = true;
        self.entry_sep(&mut first);
        self.write_key("type");
        self.write_string_value(geometry.kind().geojson_type());

        self.entry_sep(&mut first);
        self.write_key("coordinates");
        match geometry {
            GeometryValue::Point(c) => self.write_coord(c),
            GeometryValue::LineString(line)
            | GeometryValue::LinearRing(line)
            | GeometryValue::MultiPoint(line) => self.write_coords(line),
            GeometryValue::Polygon(polygon) => self.write_polygon(polygon),
            GeometryValue::MultiLineString(lines) => {
                self.write_array(lines, |w, line| w.write_coords(line))
            }
            GeometryValue::MultiPolygon(polygons) => {
                self.write_array(polygons, |w, polygon| w.write_polygon(polygon))
            }
            GeometryValue::Buffered { .. } => unreachable!(),
        }

        if let Some(radius) = buffer {
            self.entry_sep(&mut first);
            self.write_key("buffer");
            self.write_float(radius);
        }

        self.depth -= 1;
        self.newline();
        self.buf.push('}');
    }

    fn write_coord(&mut self, c: &Coord) {
        self.buf.push('[');
        self.write_float(c.x);
        self.buf.push(',');
        self.write_float(c.y);
        self.buf.push(']');
    }

    fn write_coords(&mut self, coords: &[Coord]) {
        self.write_array(coords, |w, c| w.write_coord(c))
    }

    fn write_polygon(&mut self, polygon: &Polygon) {
        let rings: Vec<&Vec<Coord>> = std::iter::once(&polygon.exterior)
            .chain(polygon.interiors.iter())
            .collect();
        self.write_array(&rings, |w, ring| w.write_coords(ring))
    }

    fn entry_sep(&mut self, first: &mut bool) {
        if *first {
            *first = false;
        } else {
            self.buf.push(',');
        }
        self.newline();
    }

    fn write_key(&mut self, key: &str) {
        self.write_string_value(key);
        self.buf.push(':');
        self.space();
    }

    fn write_string_value(&mut self, s: &str) {
        self.buf.push('"');
        for ch in s.chars() {
            match ch {
                '"' => self.buf.push_str("\\\""),
                '\\' => self.buf.push_str("\\\\"),
                '\n' => self.buf.push_str("\\n"),
                '\r' => self.buf.push_str("\\r"),
                '\t' => self.buf.push_str("\\t"),
                '\u{0008}' => self.buf.push_str("\\b"),
                '\u{000C}' => self.buf.push_str("\\f"),
                c if c < '\u{0020}' => {
                    write!(&mut self.buf, "\\u{:04x}", c as u32).unwrap();
                }
                c => self.buf.push(c),
            }
        }
        self.buf.push('"');
    }
}

/// Serialize a value to a compact JSON string (no whitespace).
pub fn to_json(value: &ParsedValue) -> String {
    let mut w = JsonWriter::new(JsonStyle::Compact);
    w.write_value(value);
    w.buf
}

/// Serialize a value to a pretty-printed JSON string (2-space indent).
pub fn to_json_pretty(value: &ParsedValue) -> String {
    let mut w = JsonWriter::new(JsonStyle::Pretty);
    w.write_value(value);
    w.buf
}

/// Serialize a value to the wire format.
///
/// Identical to [`to_json`] except that dates, times and datetimes are
/// wrapped as `{"$date": ..}`, `{"$time": ..}` and `{"$datetime": ..}` so a
/// consumer can tell them apart from plain strings.
pub fn to_wire(value: &ParsedValue, style: JsonStyle) -> String {
    let mut w = JsonWriter::new(style);
    w.wire = true;
    w.write_value(value);
    w.buf
}
