//! Per-layer result cache.

use super::{QueryError, ResultEntry, ResultSet};
use crate::geometry::Rect;

/// Holds the result set of a layer's most recent completed query.
///
/// A failed query leaves the previous set in place; a successful one
/// replaces it wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultCache {
    current: Option<ResultSet>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of results, 0 if never queried.
    pub fn result_count(&self) -> usize {
        self.current.as_ref().map_or(0, ResultSet::len)
    }

    /// Result at `ordinal`.
    pub fn result_at(&self, ordinal: usize) -> Result<ResultEntry, QueryError> {
        self.current
            .as_ref()
            .and_then(|set| set.entries().get(ordinal).copied())
            .ok_or(QueryError::IndexOutOfRange {
                index: ordinal,
                count: self.result_count(),
            })
    }

    /// Whether any query has completed, as opposed to one matching nothing.
    pub fn has_queried(&self) -> bool {
        self.current.is_some()
    }

    /// Ordinal of the `(tile, shape)` pair, if present.
    pub fn find(&self, tile_index: Option<usize>, shape_index: usize) -> Option<usize> {
        let target = ResultEntry::new(tile_index, shape_index);
        self.entries().iter().position(|e| *e == target)
    }

    pub fn bounds(&self) -> Option<Rect> {
        self.current.as_ref().and_then(ResultSet::bounds)
    }

    pub fn entries(&self) -> &[ResultEntry] {
        self.current
            .as_ref()
            .map(ResultSet::entries)
            .unwrap_or(&[])
    }

    pub fn current(&self) -> Option<&ResultSet> {
        self.current.as_ref()
    }

    pub(crate) fn replace(&mut self, set: ResultSet) {
        self.current = Some(set);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryFilter;

    fn cache_with(indices: &[usize]) -> ResultCache {
        let mut set = ResultSet::new(QueryFilter::attribute("FNAME", "x"));
        for &i in indices {
            set.push(ResultEntry::new(None, i), Rect::new(0.0, 0.0, i as f64, 1.0));
        }
        let mut cache = ResultCache::new();
        cache.replace(set);
        cache
    }

    #[test]
    fn test_never_queried() {
        let cache = ResultCache::new();
        assert_eq!(cache.result_count(), 0);
        assert!(!cache.has_queried());
        assert!(cache.bounds().is_none());
        assert!(matches!(
            cache.result_at(0),
            Err(QueryError::IndexOutOfRange { index: 0, count: 0 })
        ));
    }

    #[test]
    fn test_empty_result_is_distinguishable() {
        let cache = cache_with(&[]);
        assert_eq!(cache.result_count(), 0);
        assert!(cache.has_queried());
    }

    #[test]
    fn test_result_at_bounds() {
        let cache = cache_with(&[2, 5, 9]);
        assert_eq!(cache.result_at(1).unwrap().shape_index, 5);
        assert!(matches!(
            cache.result_at(cache.result_count()),
            Err(QueryError::IndexOutOfRange { index: 3, count: 3 })
        ));
    }

    #[test]
    fn test_find() {
        let cache = cache_with(&[2, 5, 9]);
        assert_eq!(cache.find(None, 9), Some(2));
        assert_eq!(cache.find(Some(0), 9), None);
        assert_eq!(cache.find(None, 3), None);
    }

    #[test]
    fn test_replace_is_wholesale() {
        let mut cache = cache_with(&[1, 2, 3]);
        let mut set = ResultSet::new(QueryFilter::Index(7));
        set.push(ResultEntry::new(None, 7), Rect::default());
        cache.replace(set);

        assert_eq!(cache.entries(), &[ResultEntry::new(None, 7)]);
        assert_eq!(cache.current().unwrap().filter(), &QueryFilter::Index(7));
    }
}
