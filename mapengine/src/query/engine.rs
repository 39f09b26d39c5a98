//! Query execution.

use super::{MatchMode, QueryError, QueryFilter, QueryOptions, ResultEntry, ResultSet};
use crate::backend::BackendConnection;
use crate::geometry::{Rect, ShapeHandle};
use crate::log::Logger;
use crate::log_debug;
use crate::map::LayerHandle;
use crate::pool::{ConnectionLease, ConnectionPool, PoolError};
use std::sync::Arc;

/// Runs queries against layers and materializes their results.
///
/// Holds only shared, thread-safe state; each thread's layers stay local to
/// that thread.
#[derive(Clone)]
pub struct LayerQueryEngine {
    pool: ConnectionPool,
    logger: Arc<dyn Logger>,
}

impl LayerQueryEngine {
    pub fn new(pool: ConnectionPool, logger: Arc<dyn Logger>) -> Self {
        Self { pool, logger }
    }

    /// Selects features whose `field` equals `value`.
    pub fn query_by_attribute(
        &self,
        layer: &LayerHandle,
        field: &str,
        value: &str,
        mode: MatchMode,
    ) -> Result<usize, QueryError> {
        self.query(
            layer,
            QueryFilter::attribute(field, value),
            QueryOptions::new(mode),
        )
    }

    /// Selects the feature with shape index `index`.
    pub fn query_by_index(
        &self,
        layer: &LayerHandle,
        index: usize,
        mode: MatchMode,
    ) -> Result<usize, QueryError> {
        self.query(layer, QueryFilter::Index(index), QueryOptions::new(mode))
    }

    /// Selects features whose bounds intersect `rect`.
    pub fn query_by_rect(
        &self,
        layer: &LayerHandle,
        rect: Rect,
        mode: MatchMode,
    ) -> Result<usize, QueryError> {
        self.query(layer, QueryFilter::Intersects(rect), QueryOptions::new(mode))
    }

    /// Runs `filter` on an open layer and stores the matches in its cache.
    ///
    /// Returns the number of matches.
    pub fn query(
        &self,
        layer: &LayerHandle,
        filter: QueryFilter,
        options: QueryOptions,
    ) -> Result<usize, QueryError> {
        let not_open = || QueryError::LayerNotOpen(layer.name().to_string());
        if !layer.is_open() {
            return Err(not_open());
        }
        if options.expired() {
            return Err(QueryError::Timeout(layer.name().to_string()));
        }

        let set = layer
            .with_lease(|lease| {
                lease.with_connection_until(options.deadline, |conn| {
                    execute(conn, layer.name(), &filter, &options)
                })
            })
            .unwrap_or_else(|| Err(not_open()))
            .map_err(|e| match e {
                QueryError::Pool(PoolError::Timeout { .. }) => {
                    QueryError::Timeout(layer.name().to_string())
                }
                other => other,
            })?;

        let count = set.len();
        log_debug!(
            self.logger,
            "Query '{}' on layer '{}' matched {} features",
            filter,
            layer.name(),
            count
        );
        layer.replace_results(set);
        Ok(count)
    }

    /// Fetches the feature a result entry names.
    ///
    /// Uses the layer's own connection when it is open; otherwise borrows one
    /// from the pool for the duration of the read.
    pub fn materialize_shape(
        &self,
        layer: &LayerHandle,
        entry: &ResultEntry,
    ) -> Result<ShapeHandle, QueryError> {
        let read = |lease: &ConnectionLease| {
            lease.with_connection(|conn| {
                conn.read_feature(entry.shape_index)
                    .map_err(QueryError::from)
            })
        };

        if let Some(shape) = layer.with_lease(read) {
            return shape;
        }

        let lease = self
            .pool
            .acquire_with_policy(layer.connection_key(), layer.definition().policy)?;
        let shape = read(&lease);
        lease.release()?;
        shape
    }
}

fn execute(
    conn: &mut dyn BackendConnection,
    layer: &str,
    filter: &QueryFilter,
    options: &QueryOptions,
) -> Result<ResultSet, QueryError> {
    let count = conn.feature_count()?;
    let mut set = ResultSet::new(filter.clone());

    match filter {
        QueryFilter::Index(index) => {
            if *index >= count {
                return Err(QueryError::IndexOutOfRange {
                    index: *index,
                    count,
                });
            }
            let shape = conn.read_feature(*index)?;
            set.push(ResultEntry::new(shape.tile_index(), *index), shape.bounds());
        }
        QueryFilter::Attribute { field, value } => {
            let column = conn
                .fields()
                .iter()
                .position(|f| f.eq_ignore_ascii_case(field))
                .ok_or_else(|| QueryError::FieldNotFound {
                    layer: layer.to_string(),
                    field: field.clone(),
                })?;
            scan(conn, count, layer, options, &mut set, |shape| {
                shape.value(column) == Some(value.as_str())
            })?;
        }
        QueryFilter::Intersects(rect) => {
            scan(conn, count, layer, options, &mut set, |shape| {
                shape.bounds().intersects(rect)
            })?;
        }
    }
    Ok(set)
}

/// Walks features in ascending shape index, keeping those `matches` accepts.
fn scan(
    conn: &mut dyn BackendConnection,
    count: usize,
    layer: &str,
    options: &QueryOptions,
    set: &mut ResultSet,
    matches: impl Fn(&ShapeHandle) -> bool,
) -> Result<(), QueryError> {
    for index in 0..count {
        if options.expired() {
            return Err(QueryError::Timeout(layer.to_string()));
        }
        let shape = conn.read_feature(index)?;
        if !matches(&shape) {
            continue;
        }
        set.push(ResultEntry::new(shape.tile_index(), index), shape.bounds());
        if options.mode == MatchMode::Single {
            break;
        }
    }
    Ok(())
}
