//! Query predicates and options.

use crate::geometry::Rect;
use std::fmt;
use std::time::{Duration, Instant};

/// How many matches a query keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Stop at the first match in natural order.
    Single,
    /// Keep every match, in ascending shape index.
    #[default]
    Multiple,
}

/// Selects features of one layer.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryFilter {
    /// String equality on one attribute.
    Attribute { field: String, value: String },
    /// Feature bounds intersect the rectangle.
    Intersects(Rect),
    /// The feature with this shape index.
    Index(usize),
}

impl QueryFilter {
    pub fn attribute(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Attribute {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for QueryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute { field, value } => write!(f, "{} = '{}'", field, value),
            Self::Intersects(r) => write!(
                f,
                "intersects({} {} {} {})",
                r.minx, r.miny, r.maxx, r.maxy
            ),
            Self::Index(i) => write!(f, "index {}", i),
        }
    }
}

/// Match mode plus an optional deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub mode: MatchMode,
    pub deadline: Option<Instant>,
}

impl QueryOptions {
    pub fn new(mode: MatchMode) -> Self {
        Self {
            mode,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets a deadline `timeout` from now; `None` leaves it unbounded.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.deadline = timeout.map(|t| Instant::now() + t);
        self
    }

    pub(crate) fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() > d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = QueryOptions::default();
        assert_eq!(options.mode, MatchMode::Multiple);
        assert!(options.deadline.is_none());
        assert!(!options.expired());
    }

    #[test]
    fn test_past_deadline_is_expired() {
        let past = Instant::now() - Duration::from_millis(1);
        assert!(QueryOptions::new(MatchMode::Single)
            .with_deadline(past)
            .expired());
    }

    #[test]
    fn test_filter_display() {
        assert_eq!(
            QueryFilter::attribute("FNAME", "A Point").to_string(),
            "FNAME = 'A Point'"
        );
        assert_eq!(QueryFilter::Index(3).to_string(), "index 3");
    }
}
