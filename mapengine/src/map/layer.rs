//! Layer handles.

use super::handle::{MapHandle, MapInner};
use super::MapError;
use crate::backend::ConnectionKey;
use crate::definition::LayerDefinition;
use crate::handle::{BackRef, HandleError};
use crate::pool::{ConnectionLease, ConnectionPool};
use crate::query::{ResultCache, ResultSet};
use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Instant;

/// Lifecycle of a layer within its map.
///
/// `Ready → Open → Closed`, and `Closed → Open` on re-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerState {
    /// Built from its definition, never opened.
    Ready,
    /// Holding a connection lease; queries allowed.
    Open,
    /// Lease released. Cached results remain readable.
    Closed,
}

impl fmt::Display for LayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

pub(crate) struct LayerInner {
    definition: LayerDefinition,
    key: ConnectionKey,
    owner: BackRef<MapInner>,
    state: Cell<LayerState>,
    lease: RefCell<Option<ConnectionLease>>,
    results: RefCell<ResultCache>,
}

/// One named layer of a map.
///
/// Handles obtained from a [`MapHandle`] pin that map, so the owning map
/// stays reachable for as long as any of them lives. The map itself keeps
/// only the layer internals, which point back through a `Weak`.
#[derive(Clone)]
pub struct LayerHandle {
    inner: Rc<LayerInner>,
    parent: Option<Rc<MapInner>>,
}

impl LayerHandle {
    /// Creates a detached layer. It resolves no owning map until inserted.
    pub fn new(definition: LayerDefinition) -> Self {
        let key = definition.connection_key();
        Self {
            inner: Rc::new(LayerInner {
                definition,
                key,
                owner: BackRef::detached(),
                state: Cell::new(LayerState::Ready),
                lease: RefCell::new(None),
                results: RefCell::new(ResultCache::new()),
            }),
            parent: None,
        }
    }

    /// A handle onto `inner` that keeps `map` alive.
    pub(super) fn pinned(inner: &Rc<LayerInner>, map: &Rc<MapInner>) -> Self {
        Self {
            inner: Rc::clone(inner),
            parent: Some(Rc::clone(map)),
        }
    }

    /// Points the back-reference at `map` and returns the shared internals.
    pub(super) fn attach(&self, map: &Rc<MapInner>) -> Result<Rc<LayerInner>, HandleError> {
        self.inner.owner.attach(map, &self.inner.definition.name)?;
        Ok(Rc::clone(&self.inner))
    }

    /// Whether this handle keeps its owning map alive.
    pub fn pins_owner(&self) -> bool {
        self.parent.is_some()
    }

    pub fn name(&self) -> &str {
        &self.inner.definition.name
    }

    pub fn definition(&self) -> &LayerDefinition {
        &self.inner.definition
    }

    pub fn connection_key(&self) -> &ConnectionKey {
        &self.inner.key
    }

    pub fn state(&self) -> LayerState {
        self.inner.state.get()
    }

    pub fn is_open(&self) -> bool {
        self.state() == LayerState::Open
    }

    /// The map this layer belongs to.
    ///
    /// Always resolves for handles handed out by the map. A handle built with
    /// [`new`](Self::new) and inserted later resolves while the map is alive.
    pub fn owning_map(&self) -> Option<MapHandle> {
        self.inner.owner.resolve().map(MapHandle::from_inner)
    }

    /// Acquires the layer's connection. Opening an open layer is a no-op.
    pub fn open(&self, pool: &ConnectionPool, deadline: Option<Instant>) -> Result<(), MapError> {
        if self.is_open() {
            return Ok(());
        }
        let lease = pool
            .acquire_with_deadline(&self.inner.key, self.inner.definition.policy, deadline)
            .map_err(|source| MapError::Open {
                layer: self.name().to_string(),
                source,
            })?;
        *self.inner.lease.borrow_mut() = Some(lease);
        self.inner.state.set(LayerState::Open);
        Ok(())
    }

    /// Releases the layer's connection.
    ///
    /// Returns `false` if the layer was not open. The result cache is kept.
    pub fn close(&self) -> Result<bool, MapError> {
        let Some(lease) = self.inner.lease.borrow_mut().take() else {
            return Ok(false);
        };
        self.inner.state.set(LayerState::Closed);
        lease.release().map_err(|source| MapError::Close {
            layer: self.name().to_string(),
            source,
        })?;
        Ok(true)
    }

    /// Results of the last completed query.
    pub fn results(&self) -> Ref<'_, ResultCache> {
        self.inner.results.borrow()
    }

    pub(crate) fn replace_results(&self, set: ResultSet) {
        self.inner.results.borrow_mut().replace(set);
    }

    /// Runs `f` with the layer's lease, if open.
    pub(crate) fn with_lease<R>(&self, f: impl FnOnce(&ConnectionLease) -> R) -> Option<R> {
        self.inner.lease.borrow().as_ref().map(f)
    }

    pub fn ptr_eq(&self, other: &LayerHandle) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl LayerInner {
    pub(super) fn name(&self) -> &str {
        &self.definition.name
    }
}

impl fmt::Debug for LayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerHandle")
            .field("name", &self.name())
            .field("key", &self.inner.key)
            .field("state", &self.state())
            .finish()
    }
}
