//! The per-thread context facade.

use super::{ContextConfig, ContextState, EngineServices, TeardownReport, LEAK_POLL_INTERVAL};
use crate::backend::ConnectionKey;
use crate::dispatch::{DispatchResponse, RequestParams};
use crate::definition::MapDefinition;
use crate::error::EngineError;
use crate::geometry::{Rect, ShapeHandle};
use crate::handle::RefCount;
use crate::map::{LayerHandle, MapHandle};
use crate::pool::ConnectionLease;
use crate::query::{
    LayerQueryEngine, MatchMode, QueryFilter, QueryOptions, ResultCache, ResultEntry,
};
use crate::render::Image;
use crate::{log_debug, log_error, log_warn};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// One thread's view of a map.
///
/// Not `Send`: the map and its layers live on the thread that built the
/// context. Everything shared (pool, renderer, geometry, dispatcher) sits in
/// [`EngineServices`].
///
/// # Example
///
/// ```
/// use mapengine::backend::{ConnectionKind, Dataset, MemoryBackend};
/// use mapengine::context::{ConcurrentMapContext, ContextConfig, EngineServices};
/// use mapengine::definition::{LayerDefinition, LayerKind, MapDefinition};
/// use mapengine::geometry::{Point, ShapeKind};
/// use mapengine::log::NoOpLogger;
/// use mapengine::pool::ConnectionPool;
/// use mapengine::query::MatchMode;
/// use std::sync::Arc;
///
/// let layer = LayerDefinition::new("POINT", LayerKind::Point, ConnectionKind::Local, "pts");
/// let backend = Arc::new(MemoryBackend::new());
/// backend.register(
///     layer.connection_key(),
///     Dataset::new(ShapeKind::Point, &["FNAME"])
///         .with_feature(vec![Point::new(1.0, 1.0)], &["A Point"]),
/// );
/// let definition = Arc::new(MapDefinition::new("demo").with_layer(layer));
///
/// let pool = ConnectionPool::new(backend, Arc::new(NoOpLogger));
/// let services = EngineServices::new(pool.clone(), Arc::new(NoOpLogger));
/// let mut context =
///     ConcurrentMapContext::from_definition(definition, services, ContextConfig::default())
///         .unwrap();
///
/// context.open_layer("POINT").unwrap();
/// let hits = context
///     .query_by_attribute("POINT", "FNAME", "A Point", MatchMode::Multiple)
///     .unwrap();
/// assert_eq!(hits, 1);
///
/// let report = context.teardown();
/// assert!(report.is_clean());
/// assert_eq!(pool.reclaim_unreferenced(), 1);
/// ```
pub struct ConcurrentMapContext {
    map: MapHandle,
    services: EngineServices,
    engine: LayerQueryEngine,
    config: ContextConfig,
    state: ContextState,
    leases: Arc<RefCount>,
    torn_down: bool,
}

impl ConcurrentMapContext {
    /// Builds a fresh map from a shared definition.
    pub fn from_definition(
        definition: Arc<MapDefinition>,
        services: EngineServices,
        config: ContextConfig,
    ) -> Result<Self, EngineError> {
        let map = MapHandle::from_definition(definition)?;
        let engine = LayerQueryEngine::new(services.pool.clone(), Arc::clone(&services.logger));
        let leases = Arc::new(RefCount::new(format!("context leases of '{}'", map.name())));
        log_debug!(
            services.logger,
            "Context for map '{}' ready with {} layers",
            map.name(),
            map.layer_count()
        );
        Ok(Self {
            map,
            services,
            engine,
            config,
            state: ContextState::Ready,
            leases,
            torn_down: false,
        })
    }

    pub fn map(&self) -> &MapHandle {
        &self.map
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn services(&self) -> &EngineServices {
        &self.services
    }

    /// Looks a layer up by name (case-insensitive).
    pub fn layer(&self, name: &str) -> Result<LayerHandle, EngineError> {
        self.map
            .layer_by_name(name)
            .ok_or_else(|| EngineError::LayerNotFound(name.to_string()))
    }

    // =========================================================================
    // Layers
    // =========================================================================

    /// Opens a layer, acquiring its pooled connection.
    pub fn open_layer(&self, name: &str) -> Result<(), EngineError> {
        let layer = self.layer(name)?;
        layer.open(&self.services.pool, self.deadline())?;
        Ok(())
    }

    /// Closes a layer. Returns `false` if it was not open.
    pub fn close_layer(&self, name: &str) -> Result<bool, EngineError> {
        Ok(self.layer(name)?.close()?)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn query_by_attribute(
        &self,
        name: &str,
        field: &str,
        value: &str,
        mode: MatchMode,
    ) -> Result<usize, EngineError> {
        self.query(name, QueryFilter::attribute(field, value), mode)
    }

    pub fn query_by_index(
        &self,
        name: &str,
        index: usize,
        mode: MatchMode,
    ) -> Result<usize, EngineError> {
        self.query(name, QueryFilter::Index(index), mode)
    }

    pub fn query_by_rect(
        &self,
        name: &str,
        rect: Rect,
        mode: MatchMode,
    ) -> Result<usize, EngineError> {
        self.query(name, QueryFilter::Intersects(rect), mode)
    }

    /// Runs `filter` on the named layer under the context's query timeout.
    pub fn query(
        &self,
        name: &str,
        filter: QueryFilter,
        mode: MatchMode,
    ) -> Result<usize, EngineError> {
        let layer = self.layer(name)?;
        let options = QueryOptions::new(mode).with_timeout(self.config.query_timeout);
        Ok(self.engine.query(&layer, filter, options)?)
    }

    /// Snapshot of the named layer's result cache.
    pub fn results(&self, name: &str) -> Result<ResultCache, EngineError> {
        Ok(self.layer(name)?.results().clone())
    }

    pub fn result_count(&self, name: &str) -> Result<usize, EngineError> {
        Ok(self.layer(name)?.results().result_count())
    }

    pub fn result_at(&self, name: &str, ordinal: usize) -> Result<ResultEntry, EngineError> {
        Ok(self.layer(name)?.results().result_at(ordinal)?)
    }

    // =========================================================================
    // Shapes
    // =========================================================================

    /// Fetches the feature at `ordinal` in the layer's current results.
    pub fn materialize_shape(&self, name: &str, ordinal: usize) -> Result<ShapeHandle, EngineError> {
        let layer = self.layer(name)?;
        let entry = layer.results().result_at(ordinal)?;
        Ok(self.engine.materialize_shape(&layer, &entry)?)
    }

    /// Buffers a shape through the configured geometry engine.
    ///
    /// `None` means the engine cannot buffer; callers skip the step.
    pub fn buffer_shape(&self, shape: &ShapeHandle, distance: f64) -> Option<ShapeHandle> {
        let buffered = self.services.geometry.buffer(shape, distance);
        if buffered.is_none() {
            log_debug!(
                self.services.logger,
                "Buffer of shape {} unavailable, skipping",
                shape.shape_index()
            );
        }
        buffered
    }

    // =========================================================================
    // Output
    // =========================================================================

    /// Renders the map. Layer states are left as they are.
    pub fn draw(&mut self) -> Result<Image, EngineError> {
        let image = self.services.renderer.draw(&self.map)?;
        self.state = ContextState::Drawn;
        Ok(image)
    }

    /// Answers a protocol request against this context's map.
    pub fn dispatch(&self, params: &RequestParams) -> DispatchResponse {
        self.services.dispatcher.dispatch(&self.map, params)
    }

    // =========================================================================
    // Leases and teardown
    // =========================================================================

    /// Hands out an extra, tracked lease on `key`.
    ///
    /// The lease uses the policy of the first layer connected to `key`, or
    /// the default policy when no layer is. Teardown waits for tracked leases
    /// and reports those still outstanding.
    pub fn lease(&self, key: &ConnectionKey) -> Result<ConnectionLease, EngineError> {
        let policy = self
            .map
            .layers()
            .into_iter()
            .find(|layer| layer.connection_key() == key)
            .map(|layer| layer.definition().policy)
            .unwrap_or_default();
        let mut lease = self
            .services
            .pool
            .acquire_with_deadline(key, policy, self.deadline())?;
        lease.attach_tracker(Arc::clone(&self.leases))?;
        Ok(lease)
    }

    /// Tracked leases not yet released.
    pub fn outstanding_leases(&self) -> usize {
        self.leases.count()
    }

    /// Closes every open layer and waits for outstanding leases.
    pub fn teardown(mut self) -> TeardownReport {
        self.release_resources()
    }

    fn release_resources(&mut self) -> TeardownReport {
        let mut report = TeardownReport::default();
        if self.torn_down {
            return report;
        }
        self.torn_down = true;

        for layer in self.map.layers() {
            match layer.close() {
                Ok(true) => report.layers_closed += 1,
                Ok(false) => {}
                Err(e) => {
                    report.close_errors += 1;
                    log_error!(self.services.logger, "Teardown of '{}': {}", self.map.name(), e);
                }
            }
        }

        report.leaked_leases = self.wait_for_leases();
        if report.leaked_leases > 0 {
            log_warn!(
                self.services.logger,
                "ResourceLeak: {} lease(s) of map '{}' still outstanding after {:?}",
                report.leaked_leases,
                self.map.name(),
                self.config.leak_grace
            );
        }
        log_debug!(
            self.services.logger,
            "Context for map '{}' torn down ({} layers closed)",
            self.map.name(),
            report.layers_closed
        );
        report
    }

    fn wait_for_leases(&self) -> usize {
        let until = Instant::now() + self.config.leak_grace;
        loop {
            let outstanding = self.leases.count();
            if outstanding == 0 || Instant::now() >= until {
                return outstanding;
            }
            std::thread::sleep(LEAK_POLL_INTERVAL);
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.config.query_timeout.map(|t| Instant::now() + t)
    }
}

impl Drop for ConcurrentMapContext {
    fn drop(&mut self) {
        self.release_resources();
    }
}

impl fmt::Debug for ConcurrentMapContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentMapContext")
            .field("map", &self.map.name())
            .field("state", &self.state)
            .field("outstanding_leases", &self.leases.count())
            .field("torn_down", &self.torn_down)
            .finish()
    }
}
