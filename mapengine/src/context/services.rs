//! Shared collaborators handed to every context.

use crate::dispatch::{CapabilitiesDispatcher, ProtocolDispatcher};
use crate::geometry::{GeometryEngine, NullGeometryEngine};
use crate::log::Logger;
use crate::pool::ConnectionPool;
use crate::render::{RasterRenderer, Renderer};
use std::sync::Arc;

/// Thread-safe services shared by all contexts of a process.
///
/// Cheap to clone; every worker thread takes its own clone.
#[derive(Clone)]
pub struct EngineServices {
    pub pool: ConnectionPool,
    pub renderer: Arc<dyn Renderer>,
    pub geometry: Arc<dyn GeometryEngine>,
    pub dispatcher: Arc<dyn ProtocolDispatcher>,
    pub logger: Arc<dyn Logger>,
}

impl EngineServices {
    /// Services with the raster renderer, no geometry support and the
    /// capabilities dispatcher.
    pub fn new(pool: ConnectionPool, logger: Arc<dyn Logger>) -> Self {
        Self {
            pool,
            renderer: Arc::new(RasterRenderer::new()),
            geometry: Arc::new(NullGeometryEngine),
            dispatcher: Arc::new(CapabilitiesDispatcher),
            logger,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_geometry(mut self, geometry: Arc<dyn GeometryEngine>) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn ProtocolDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }
}
