use serde_json::Value as Json;

use crate::error::FormatError;
use crate::value::ParsedValue;

/// A 2D position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

/// A polygon: one closed exterior ring and any number of closed holes.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub exterior: Vec<Coord>,
    pub interiors: Vec<Vec<Coord>>,
}

/// The shape families a literal can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    Point,
    LineString,
    LinearRing,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
}

impl GeometryKind {
    /// The GeoJSON `type` member for this kind. Linear rings have no GeoJSON
    /// type of their own and are written as line strings.
    pub fn geojson_type(self) -> &'static str {
        match self {
            GeometryKind::Point => "Point",
            GeometryKind::LineString | GeometryKind::LinearRing => "LineString",
            GeometryKind::Polygon => "Polygon",
            GeometryKind::MultiPoint => "MultiPoint",
            GeometryKind::MultiLineString => "MultiLineString",
            GeometryKind::MultiPolygon => "MultiPolygon",
        }
    }
}

/// A constructed shape.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryValue {
    Point(Coord),
    LineString(Vec<Coord>),
    /// Always closed: the last coordinate equals the first.
    LinearRing(Vec<Coord>),
    Polygon(Polygon),
    MultiPoint(Vec<Coord>),
    MultiLineString(Vec<Vec<Coord>>),
    MultiPolygon(Vec<Polygon>),
    /// The region within `radius` of `shape`.
    Buffered {
        shape: Box<GeometryValue>,
        radius: f64,
    },
}

impl GeometryValue {
    /// Kind of the underlying shape, looking through any buffer.
    pub fn kind(&self) -> GeometryKind {
        match self {
            GeometryValue::Point(_) => GeometryKind::Point,
            GeometryValue::LineString(_) => GeometryKind::LineString,
            GeometryValue::LinearRing(_) => GeometryKind::LinearRing,
            GeometryValue::Polygon(_) => GeometryKind::Polygon,
            GeometryValue::MultiPoint(_) => GeometryKind::MultiPoint,
            GeometryValue::MultiLineString(_) => GeometryKind::MultiLineString,
            GeometryValue::MultiPolygon(_) => GeometryKind::MultiPolygon,
            GeometryValue::Buffered { shape, .. } => shape.kind(),
        }
    }

    pub fn buffer_radius(&self) -> Option<f64> {
        match self {
            GeometryValue::Buffered { radius, .. } => Some(*radius),
            _ => None,
        }
    }
}

/// Shape construction used by the geometry literals.
///
/// `structure` arguments are the recursively parsed payload of the literal,
/// normally nested lists of `[x, y]` pairs.
pub trait GeometryBuilder {
    fn point(&self, x: f64, y: f64) -> Result<GeometryValue, FormatError>;
    fn buffer(&self, shape: GeometryValue, radius: f64) -> Result<GeometryValue, FormatError>;
    fn line_strings(&self, structure: &ParsedValue) -> Result<GeometryValue, FormatError>;
    fn linear_rings(&self, structure: &ParsedValue) -> Result<GeometryValue, FormatError>;
    fn polygon(&self, structure: &ParsedValue) -> Result<GeometryValue, FormatError>;
    fn multi_point(&self, structure: &ParsedValue) -> Result<GeometryValue, FormatError>;
    fn multi_line_string(&self, structure: &ParsedValue) -> Result<GeometryValue, FormatError>;
    fn multi_polygon(&self, structure: &ParsedValue) -> Result<GeometryValue, FormatError>;
    /// Build whatever shape `structure` describes (GeoJSON text or object,
    /// an existing geometry, or a bare coordinate).
    fn shape(&self, structure: &ParsedValue) -> Result<GeometryValue, FormatError>;
}

/// Builds [`GeometryValue`]s straight from coordinate lists, without any
/// geometric computation.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinateBuilder;

impl GeometryBuilder for CoordinateBuilder {
    fn point(&self, x: f64, y: f64) -> Result<GeometryValue, FormatError> {
        Ok(GeometryValue::Point(Coord { x, y }))
    }

    fn buffer(&self, shape: GeometryValue, radius: f64) -> Result<GeometryValue, FormatError> {
        if !radius.is_finite() {
            return Err(FormatError::new(
                "invalid-geometry",
                "Buffer radius must be finite",
                radius.to_string(),
            ));
        }
        Ok(GeometryValue::Buffered {
            shape: Box::new(shape),
            radius,
        })
    }

    fn line_strings(&self, structure: &ParsedValue) -> Result<GeometryValue, FormatError> {
        line(structure).map(GeometryValue::LineString)
    }

    fn linear_rings(&self, structure: &ParsedValue) -> Result<GeometryValue, FormatError> {
        ring(structure).map(GeometryValue::LinearRing)
    }

    fn polygon(&self, structure: &ParsedValue) -> Result<GeometryValue, FormatError> {
        polygon(structure).map(GeometryValue::Polygon)
    }

    fn multi_point(&self, structure: &ParsedValue) -> Result<GeometryValue, FormatError> {
        let points = coords(structure)?;
        if points.is_empty() {
            return Err(invalid_geometry("A multi-point needs at least one point", structure));
        }
        Ok(GeometryValue::MultiPoint(points))
    }

    fn multi_line_string(&self, structure: &ParsedValue) -> Result<GeometryValue, FormatError> {
        let lines = items(structure)?
            .iter()
            .map(line)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(GeometryValue::MultiLineString(lines))
    }

    fn multi_polygon(&self, structure: &ParsedValue) -> Result<GeometryValue, FormatError> {
        let polygons = items(structure)?
            .iter()
            .map(polygon)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(GeometryValue::MultiPolygon(polygons))
    }

    fn shape(&self, structure: &ParsedValue) -> Result<GeometryValue, FormatError> {
        match structure {
            ParsedValue::Geometry(g) => Ok(g.clone()),
            ParsedValue::Str(text) => {
                let json: Json = serde_json::from_str(text).map_err(|e| {
                    FormatError::new("invalid-geometry", format!("Invalid GeoJSON: {}", e), text)
                })?;
                from_geojson(&json)
            }
            ParsedValue::Reference(records) if records.len() == 1 => from_geojson(&records[0]),
            ParsedValue::List(_) => coord(structure).map(GeometryValue::Point),
            _ => Err(invalid_geometry(
                "Cannot build a shape from this value",
                structure,
            )),
        }
    }
}

// ── Structure readers ───────────────────────────────────────────────

fn invalid_geometry(message: &str, structure: &ParsedValue) -> FormatError {
    FormatError::new("invalid-geometry", message, structure.to_json())
}

fn items(structure: &ParsedValue) -> Result<&[ParsedValue], FormatError> {
    structure
        .as_list()
        .ok_or_else(|| invalid_geometry("Expected a list", structure))
}

fn coord(structure: &ParsedValue) -> Result<Coord, FormatError> {
    match structure {
        ParsedValue::List(pair) if pair.len() == 2 => match (pair[0].as_f64(), pair[1].as_f64()) {
            (Some(x), Some(y)) => Ok(Coord { x, y }),
            _ => Err(FormatError::new(
                "invalid-coordinate",
                "Coordinate components must be numbers",
                structure.to_json(),
            )),
        },
        ParsedValue::Geometry(GeometryValue::Point(c)) => Ok(*c),
        _ => Err(FormatError::new(
            "invalid-coordinate",
            "Expected an [x, y] pair",
            structure.to_json(),
        )),
    }
}

fn coords(structure: &ParsedValue) -> Result<Vec<Coord>, FormatError> {
    items(structure)?.iter().map(coord).collect()
}

fn line(structure: &ParsedValue) -> Result<Vec<Coord>, FormatError> {
    let points = coords(structure)?;
    if points.len() < 2 {
        return Err(invalid_geometry("A line needs at least two points", structure));
    }
    Ok(points)
}

fn ring(structure: &ParsedValue) -> Result<Vec<Coord>, FormatError> {
    let mut points = coords(structure)?;
    if let (Some(&first), Some(&last)) = (points.first(), points.last()) {
        if first != last {
            points.push(first);
        }
    }
    if points.len() < 4 {
        return Err(invalid_geometry(
            "A ring needs at least three distinct points",
            structure,
        ));
    }
    Ok(points)
}

fn polygon(structure: &ParsedValue) -> Result<Polygon, FormatError> {
    let parts = items(structure)?;
    match parts.first() {
        None => Err(invalid_geometry("A polygon needs an exterior ring", structure)),
        // A flat list of pairs is the exterior alone
        Some(first) if coord(first).is_ok() => Ok(Polygon {
            exterior: ring(structure)?,
            interiors: Vec::new(),
        }),
        Some(first) => Ok(Polygon {
            exterior: ring(first)?,
            interiors: parts[1..].iter().map(ring).collect::<Result<_, _>>()?,
        }),
    }
}

// ── GeoJSON ─────────────────────────────────────────────────────────

/// Read a GeoJSON geometry (or a Feature wrapping one).
pub fn from_geojson(json: &Json) -> Result<GeometryValue, FormatError> {
    let invalid = |message: &str| FormatError::new("invalid-geometry", message, json.to_string());

    let object = json.as_object().ok_or_else(|| invalid("GeoJSON must be an object"))?;
    let kind = object
        .get("type")
        .and_then(Json::as_str)
        .ok_or_else(|| invalid("GeoJSON object has no type"))?;

    if kind == "Feature" {
        let geometry = object
            .get("geometry")
            .ok_or_else(|| invalid("Feature has no geometry"))?;
        return from_geojson(geometry);
    }

    let coordinates = object
        .get("coordinates")
        .ok_or_else(|| invalid("GeoJSON geometry has no coordinates"))?;
    let structure = json_structure(coordinates)?;

    match kind {
        "Point" => coord(&structure).map(GeometryValue::Point),
        "LineString" => line(&structure).map(GeometryValue::LineString),
        "Polygon" => polygon(&structure).map(GeometryValue::Polygon),
        "MultiPoint" => coords(&structure).map(GeometryValue::MultiPoint),
        "MultiLineString" => CoordinateBuilder.multi_line_string(&structure),
        "MultiPolygon" => CoordinateBuilder.multi_polygon(&structure),
        other => Err(invalid(&format!("Unsupported GeoJSON type {}", other))),
    }
}

/// Convert GeoJSON coordinate arrays into the list structure the builders read.
fn json_structure(json: &Json) -> Result<ParsedValue, FormatError> {
    match json {
        Json::Array(items) => items
            .iter()
            .map(json_structure)
            .collect::<Result<Vec<_>, _>>()
            .map(ParsedValue::List),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Ok(ParsedValue::Int(i)),
            None => n.as_f64().map(ParsedValue::Float).ok_or_else(|| {
                FormatError::new("invalid-coordinate", "Coordinate out of range", n.to_string())
            }),
        },
        other => Err(FormatError::new(
            "invalid-coordinate",
            "GeoJSON coordinates must be numbers",
            other.to_string(),
        )),
    }
}
