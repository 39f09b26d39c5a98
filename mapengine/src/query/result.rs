//! Query results.

use super::QueryFilter;
use crate::geometry::Rect;

/// Address of one matched feature. Carries no geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResultEntry {
    /// Tile the feature came from, for tiled backends.
    pub tile_index: Option<usize>,
    /// Feature ordinal within its backend.
    pub shape_index: usize,
}

impl ResultEntry {
    pub fn new(tile_index: Option<usize>, shape_index: usize) -> Self {
        Self {
            tile_index,
            shape_index,
        }
    }
}

/// Ordered matches of one completed query.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    entries: Vec<ResultEntry>,
    bounds: Option<Rect>,
    filter: QueryFilter,
}

impl ResultSet {
    pub(crate) fn new(filter: QueryFilter) -> Self {
        Self {
            entries: Vec::new(),
            bounds: None,
            filter,
        }
    }

    pub(crate) fn push(&mut self, entry: ResultEntry, shape_bounds: Rect) {
        self.entries.push(entry);
        self.bounds = Some(match self.bounds {
            Some(b) => b.union(&shape_bounds),
            None => shape_bounds,
        });
    }

    pub fn entries(&self) -> &[ResultEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Union of the matched features' bounds; `None` when nothing matched.
    pub fn bounds(&self) -> Option<Rect> {
        self.bounds
    }

    /// The filter that produced this set.
    pub fn filter(&self) -> &QueryFilter {
        &self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_accumulate() {
        let mut set = ResultSet::new(QueryFilter::Index(0));
        assert!(set.bounds().is_none());

        set.push(ResultEntry::new(None, 0), Rect::new(0.0, 0.0, 1.0, 1.0));
        set.push(ResultEntry::new(None, 4), Rect::new(5.0, -2.0, 6.0, 0.5));

        assert_eq!(set.len(), 2);
        assert_eq!(set.bounds(), Some(Rect::new(0.0, -2.0, 6.0, 1.0)));
        assert_eq!(set.entries()[1].shape_index, 4);
    }
}
