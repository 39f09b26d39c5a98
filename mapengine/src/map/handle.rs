//! Map handles.

use super::layer::LayerInner;
use super::{LayerHandle, MapError};
use crate::definition::MapDefinition;
use crate::geometry::Rect;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

pub(crate) struct MapInner {
    definition: Arc<MapDefinition>,
    layers: RefCell<Vec<Rc<LayerInner>>>,
}

/// One logical map, owned by a single thread.
///
/// Cloning the handle clones the `Rc`, not the map.
#[derive(Clone)]
pub struct MapHandle(Rc<MapInner>);

impl MapHandle {
    /// Creates a map with no layers.
    pub fn new(definition: Arc<MapDefinition>) -> Self {
        Self(Rc::new(MapInner {
            definition,
            layers: RefCell::new(Vec::new()),
        }))
    }

    /// Creates a map holding one layer per layer definition, all `Ready`.
    pub fn from_definition(definition: Arc<MapDefinition>) -> Result<Self, MapError> {
        let map = Self::new(Arc::clone(&definition));
        for layer in &definition.layers {
            map.insert_layer(LayerHandle::new(layer.clone()))?;
        }
        Ok(map)
    }

    pub(crate) fn from_inner(inner: Rc<MapInner>) -> Self {
        Self(inner)
    }

    /// Inserts `layer` and points its back-reference at this map.
    ///
    /// Returns the layer's index. Handles fetched back through
    /// [`layer`](Self::layer) pin this map; the map holds no pin on its layers.
    pub fn insert_layer(&self, layer: LayerHandle) -> Result<usize, MapError> {
        if self.layer_by_name(layer.name()).is_some() {
            return Err(MapError::DuplicateLayer(layer.name().to_string()));
        }
        let inner = layer.attach(&self.0)?;
        let mut layers = self.0.layers.borrow_mut();
        layers.push(inner);
        Ok(layers.len() - 1)
    }

    fn pin(&self, inner: &Rc<LayerInner>) -> LayerHandle {
        LayerHandle::pinned(inner, &self.0)
    }

    pub fn name(&self) -> &str {
        &self.0.definition.name
    }

    pub fn definition(&self) -> &Arc<MapDefinition> {
        &self.0.definition
    }

    pub fn extent(&self) -> Rect {
        self.0.definition.extent
    }

    /// Output image size in pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.0.definition.width, self.0.definition.height)
    }

    pub fn layer(&self, index: usize) -> Option<LayerHandle> {
        self.0.layers.borrow().get(index).map(|l| self.pin(l))
    }

    /// Looks a layer up by name (case-insensitive).
    pub fn layer_by_name(&self, name: &str) -> Option<LayerHandle> {
        self.0
            .layers
            .borrow()
            .iter()
            .find(|l| l.name().eq_ignore_ascii_case(name))
            .map(|l| self.pin(l))
    }

    pub fn layers(&self) -> Vec<LayerHandle> {
        self.0.layers.borrow().iter().map(|l| self.pin(l)).collect()
    }

    pub fn layer_count(&self) -> usize {
        self.0.layers.borrow().len()
    }

    /// Whether both handles refer to the same map.
    pub fn ptr_eq(&self, other: &MapHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for MapHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapHandle")
            .field("name", &self.name())
            .field("layers", &self.layer_count())
            .finish()
    }
}
