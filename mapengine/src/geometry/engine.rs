//! Geometry engine contract.
//!
//! Buffering and other geometry operations belong to an external engine that
//! may or may not be compiled in. The core only needs to know whether a call
//! produced a shape.

use super::{Point, ShapeHandle, ShapeKind};

/// Geometry operations the core delegates.
pub trait GeometryEngine: Send + Sync {
    /// Buffers `shape` by `distance`.
    ///
    /// Returns `None` when the capability is unavailable. Callers treat that
    /// as "feature unavailable" and carry on, never as an error.
    fn buffer(&self, shape: &ShapeHandle, distance: f64) -> Option<ShapeHandle>;
}

/// Engine with no geometry support compiled in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullGeometryEngine;

impl GeometryEngine for NullGeometryEngine {
    fn buffer(&self, _shape: &ShapeHandle, _distance: f64) -> Option<ShapeHandle> {
        None
    }
}

/// Buffers a shape to its expanded bounding box.
///
/// Coarse, but enough for coverage previews and for exercising the buffer
/// step of a work cycle without a full geometry library.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeGeometryEngine;

impl GeometryEngine for EnvelopeGeometryEngine {
    fn buffer(&self, shape: &ShapeHandle, distance: f64) -> Option<ShapeHandle> {
        if shape.points().is_empty() || !distance.is_finite() || distance < 0.0 {
            return None;
        }
        let r = shape.bounds().expand(distance);
        let ring = vec![
            Point::new(r.minx, r.miny),
            Point::new(r.maxx, r.miny),
            Point::new(r.maxx, r.maxy),
            Point::new(r.minx, r.maxy),
            Point::new(r.minx, r.miny),
        ];
        Some(
            ShapeHandle::new(ShapeKind::Polygon, ring)
                .with_attributes(shape.fields().into(), shape.values().to_vec())
                .with_index(shape.tile_index(), shape.shape_index()),
        )
    }
}
