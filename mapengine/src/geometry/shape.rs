//! Materialized features.

use super::{Point, Rect};
use std::sync::Arc;

/// Geometry type of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Point,
    Line,
    Polygon,
}

impl std::fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Point => write!(f, "point"),
            Self::Line => write!(f, "line"),
            Self::Polygon => write!(f, "polygon"),
        }
    }
}

impl std::str::FromStr for ShapeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "point" => Ok(Self::Point),
            "line" => Ok(Self::Line),
            "polygon" => Ok(Self::Polygon),
            other => Err(format!("unknown shape kind '{}'", other)),
        }
    }
}

/// Geometry and attribute values for one feature.
///
/// Produced on demand from a result entry. A shape owns its data outright, so
/// it stays valid after the result set that named it has been replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeHandle {
    kind: ShapeKind,
    points: Vec<Point>,
    bounds: Rect,
    fields: Arc<[String]>,
    values: Vec<String>,
    tile_index: Option<usize>,
    shape_index: usize,
}

impl ShapeHandle {
    /// Creates an attribute-less shape at ordinal 0.
    pub fn new(kind: ShapeKind, points: Vec<Point>) -> Self {
        let bounds = Rect::from_points(&points).unwrap_or_default();
        Self {
            kind,
            points,
            bounds,
            fields: Arc::from(Vec::new()),
            values: Vec::new(),
            tile_index: None,
            shape_index: 0,
        }
    }

    /// Attaches the attribute schema and the values for this feature.
    pub fn with_attributes(mut self, fields: Arc<[String]>, values: Vec<String>) -> Self {
        self.fields = fields;
        self.values = values;
        self
    }

    /// Sets the feature's position within its backend.
    pub fn with_index(mut self, tile_index: Option<usize>, shape_index: usize) -> Self {
        self.tile_index = tile_index;
        self.shape_index = shape_index;
        self
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn tile_index(&self) -> Option<usize> {
        self.tile_index
    }

    pub fn shape_index(&self) -> usize {
        self.shape_index
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Attribute value by position.
    pub fn value(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }

    /// Attribute value by field name (case-insensitive, as item lookups are).
    pub fn get(&self, field: &str) -> Option<&str> {
        let idx = self
            .fields
            .iter()
            .position(|f| f.eq_ignore_ascii_case(field))?;
        self.value(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Arc<[String]> {
        Arc::from(vec!["FID".to_string(), "FNAME".to_string()])
    }

    #[test]
    fn test_value_lookup_by_name() {
        let shape = ShapeHandle::new(ShapeKind::Point, vec![Point::new(0.0, 51.5)])
            .with_attributes(schema(), vec!["1".into(), "A Point".into()]);

        assert_eq!(shape.get("FNAME"), Some("A Point"));
        assert_eq!(shape.get("fname"), Some("A Point"));
        assert_eq!(shape.get("MISSING"), None);
        assert_eq!(shape.value(0), Some("1"));
    }

    #[test]
    fn test_bounds_computed_from_points() {
        let shape = ShapeHandle::new(
            ShapeKind::Line,
            vec![Point::new(0.0, 0.0), Point::new(2.0, -1.0)],
        );
        assert_eq!(shape.bounds(), Rect::new(0.0, -1.0, 2.0, 0.0));
    }

    #[test]
    fn test_shape_kind_parse() {
        assert_eq!("Polygon".parse::<ShapeKind>(), Ok(ShapeKind::Polygon));
        assert!("circle".parse::<ShapeKind>().is_err());
    }
}
