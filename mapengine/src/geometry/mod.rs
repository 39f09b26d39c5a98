//! Geometry primitives shared by backends, queries and renderers.
//!
//! Only what the core needs to carry features around: points, bounding
//! rectangles and materialized shapes. Spatial predicates beyond bounding-box
//! intersection live behind the [`GeometryEngine`] trait.

mod engine;
mod shape;

pub use engine::{EnvelopeGeometryEngine, GeometryEngine, NullGeometryEngine};
pub use shape::{ShapeHandle, ShapeKind};

/// A 2D point in map units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl Rect {
    /// Creates a rectangle, normalizing swapped corners.
    pub fn new(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Self {
        Self {
            minx: minx.min(maxx),
            miny: miny.min(maxy),
            maxx: minx.max(maxx),
            maxy: miny.max(maxy),
        }
    }

    /// Bounding rectangle of a point set, `None` when empty.
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let mut rect = Rect::new(first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            rect.minx = rect.minx.min(p.x);
            rect.miny = rect.miny.min(p.y);
            rect.maxx = rect.maxx.max(p.x);
            rect.maxy = rect.maxy.max(p.y);
        }
        Some(rect)
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            minx: self.minx.min(other.minx),
            miny: self.miny.min(other.miny),
            maxx: self.maxx.max(other.maxx),
            maxy: self.maxy.max(other.maxy),
        }
    }

    /// Whether the rectangles overlap. Touching edges count as overlap.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.minx <= other.maxx
            && other.minx <= self.maxx
            && self.miny <= other.maxy
            && other.miny <= self.maxy
    }

    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.minx && p.x <= self.maxx && p.y >= self.miny && p.y <= self.maxy
    }

    /// Grows the rectangle by `distance` on every side.
    pub fn expand(&self, distance: f64) -> Rect {
        Rect::new(
            self.minx - distance,
            self.miny - distance,
            self.maxx + distance,
            self.maxy + distance,
        )
    }

    pub fn width(&self) -> f64 {
        self.maxx - self.minx
    }

    pub fn height(&self) -> f64 {
        self.maxy - self.miny
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_normalizes_corners() {
        let r = Rect::new(10.0, 5.0, -10.0, -5.0);
        assert_eq!(r, Rect::new(-10.0, -5.0, 10.0, 5.0));
        assert_eq!(r.width(), 20.0);
        assert_eq!(r.height(), 10.0);
    }

    #[test]
    fn test_from_points() {
        assert!(Rect::from_points(&[]).is_none());
        let r = Rect::from_points(&[Point::new(1.0, 2.0), Point::new(-3.0, 4.0)]).unwrap();
        assert_eq!(r, Rect::new(-3.0, 2.0, 1.0, 4.0));
    }

    #[test]
    fn test_intersects_and_union() {
        let a = Rect::new(0.0, 0.0, 2.0, 2.0);
        let b = Rect::new(2.0, 2.0, 3.0, 3.0);
        let c = Rect::new(5.0, 5.0, 6.0, 6.0);

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert_eq!(a.union(&c), Rect::new(0.0, 0.0, 6.0, 6.0));
    }

    #[test]
    fn test_expand() {
        let r = Rect::new(0.0, 0.0, 1.0, 1.0).expand(0.5);
        assert_eq!(r, Rect::new(-0.5, -0.5, 1.5, 1.5));
        assert!(r.contains(&Point::new(-0.5, 1.5)));
    }
}
