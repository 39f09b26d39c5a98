//! In-memory backend.
//!
//! A thread-safe registry of datasets keyed by [`ConnectionKey`], usable as a
//! [`Connector`]. Stress runs and tests use it in place of real drivers; it
//! counts connects and closes, can be taken offline per key, and can delay
//! connects to exercise deadlines.
//!
//! Datasets can be declared in INI form alongside a map definition:
//!
//! ```ini
//! [dataset.points]
//! connection_type = local
//! connection = data/points
//! geometry = point
//! fields = FID, FNAME
//! feature.0 = 0 51.5 | 1 | A Point
//! feature.1 = 10 40, 12 42 | 2 | Another Point
//! ```

use super::{BackendConnection, BackendError, ConnectionKey, ConnectionKind, Connector};
use crate::definition::DefinitionError;
use crate::geometry::{Point, ShapeHandle, ShapeKind};
use dashmap::DashMap;
use ini::{Ini, Properties};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Section prefix for dataset declarations.
pub const DATASET_SECTION_PREFIX: &str = "dataset.";

/// A feature collection with one attribute schema.
#[derive(Debug, Clone)]
pub struct Dataset {
    kind: ShapeKind,
    fields: Arc<[String]>,
    features: Vec<ShapeHandle>,
}

impl Dataset {
    /// Creates an empty dataset.
    pub fn new(kind: ShapeKind, fields: &[&str]) -> Self {
        Self {
            kind,
            fields: fields.iter().map(|f| f.to_string()).collect(),
            features: Vec::new(),
        }
    }

    /// Appends a feature; its shape index is its position.
    pub fn with_feature(mut self, points: Vec<Point>, values: &[&str]) -> Self {
        self.push_feature(points, values.iter().map(|v| v.to_string()).collect());
        self
    }

    /// Appends a feature; its shape index is its position.
    pub fn push_feature(&mut self, points: Vec<Point>, values: Vec<String>) {
        let index = self.features.len();
        let shape = ShapeHandle::new(self.kind, points)
            .with_attributes(Arc::clone(&self.fields), values)
            .with_index(None, index);
        self.features.push(shape);
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[derive(Debug, Default)]
struct Counters {
    connects: AtomicUsize,
    closes: AtomicUsize,
    double_closes: AtomicUsize,
}

#[derive(Debug, Default)]
struct Shared {
    datasets: DashMap<ConnectionKey, Arc<Dataset>>,
    offline: DashMap<ConnectionKey, ()>,
    counters: Counters,
}

impl Shared {
    fn check_online(&self, key: &ConnectionKey) -> Result<(), BackendError> {
        if self.offline.contains_key(key) {
            return Err(BackendError::Unavailable {
                key: key.to_string(),
                reason: "backend offline".to_string(),
            });
        }
        Ok(())
    }
}

/// Dataset registry implementing [`Connector`].
#[derive(Debug, Default)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
    connect_delay: Mutex<Duration>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the dataset served for `key`.
    pub fn register(&self, key: ConnectionKey, dataset: Dataset) {
        self.shared.datasets.insert(key, Arc::new(dataset));
    }

    /// Takes a backend offline or brings it back.
    ///
    /// Offline backends refuse new connections and fail reads on existing ones.
    pub fn set_offline(&self, key: &ConnectionKey, offline: bool) {
        if offline {
            self.shared.offline.insert(key.clone(), ());
        } else {
            self.shared.offline.remove(key);
        }
    }

    /// Makes every subsequent connect sleep for `delay` first.
    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock() = delay;
    }

    /// Connections opened so far.
    pub fn connect_count(&self) -> usize {
        self.shared.counters.connects.load(Ordering::SeqCst)
    }

    /// Connections closed so far.
    pub fn close_count(&self) -> usize {
        self.shared.counters.closes.load(Ordering::SeqCst)
    }

    /// Connections currently open.
    pub fn open_count(&self) -> usize {
        self.connect_count().saturating_sub(self.close_count())
    }

    /// Times `close()` was called on an already closed connection.
    pub fn double_close_count(&self) -> usize {
        self.shared.counters.double_closes.load(Ordering::SeqCst)
    }

    /// Registers every `[dataset.*]` section of `ini`. Returns how many were loaded.
    pub fn load_datasets(&self, ini: &Ini) -> Result<usize, DefinitionError> {
        let mut loaded = 0;
        for (name, props) in ini.iter() {
            let Some(name) = name else { continue };
            if !name.starts_with(DATASET_SECTION_PREFIX) {
                continue;
            }
            let (key, dataset) = parse_dataset(name, props)?;
            self.register(key, dataset);
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Loads datasets from an INI file.
    pub fn load_datasets_file(&self, path: &Path) -> Result<usize, DefinitionError> {
        let ini = Ini::load_from_file(path)?;
        self.load_datasets(&ini)
    }
}

impl Connector for MemoryBackend {
    fn connect(&self, key: &ConnectionKey) -> Result<Box<dyn BackendConnection>, BackendError> {
        self.shared.check_online(key)?;

        let delay = *self.connect_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let dataset = self
            .shared
            .datasets
            .get(key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| BackendError::Unavailable {
                key: key.to_string(),
                reason: "no such dataset".to_string(),
            })?;

        self.shared.counters.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            key: key.clone(),
            dataset,
            shared: Arc::clone(&self.shared),
            closed: false,
        }))
    }
}

struct MemoryConnection {
    key: ConnectionKey,
    dataset: Arc<Dataset>,
    shared: Arc<Shared>,
    closed: bool,
}

impl MemoryConnection {
    fn check_usable(&self) -> Result<(), BackendError> {
        if self.closed {
            return Err(BackendError::Closed(self.key.to_string()));
        }
        self.shared.check_online(&self.key)
    }
}

impl BackendConnection for MemoryConnection {
    fn fields(&self) -> &[String] {
        self.dataset.fields()
    }

    fn feature_count(&self) -> Result<usize, BackendError> {
        self.check_usable()?;
        Ok(self.dataset.len())
    }

    fn read_feature(&mut self, shape_index: usize) -> Result<ShapeHandle, BackendError> {
        self.check_usable()?;
        self.dataset
            .features
            .get(shape_index)
            .cloned()
            .ok_or_else(|| BackendError::FeatureNotFound {
                key: self.key.to_string(),
                index: shape_index,
            })
    }

    fn close(&mut self) {
        if self.closed {
            self.shared
                .counters
                .double_closes
                .fetch_add(1, Ordering::SeqCst);
            return;
        }
        self.closed = true;
        self.shared.counters.closes.fetch_add(1, Ordering::SeqCst);
    }
}

fn invalid(section: &str, key: &str, value: &str, reason: impl Into<String>) -> DefinitionError {
    DefinitionError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_dataset(section: &str, props: &Properties) -> Result<(ConnectionKey, Dataset), DefinitionError> {
    let kind: ConnectionKind = match props.get("connection_type") {
        Some(v) => v.parse().map_err(|e| invalid(section, "connection_type", v, e))?,
        None => ConnectionKind::Local,
    };
    let connection = props
        .get("connection")
        .ok_or_else(|| DefinitionError::MissingKey {
            section: section.to_string(),
            key: "connection".to_string(),
        })?;
    let geometry: ShapeKind = match props.get("geometry") {
        Some(v) => v.parse().map_err(|e| invalid(section, "geometry", v, e))?,
        None => ShapeKind::Point,
    };
    let fields: Vec<&str> = props
        .get("fields")
        .map(|v| v.split(',').map(str::trim).filter(|f| !f.is_empty()).collect())
        .unwrap_or_default();

    let mut features: Vec<(usize, Vec<Point>, Vec<String>)> = Vec::new();
    for (key, value) in props.iter() {
        let Some(ordinal) = key.strip_prefix("feature.") else {
            continue;
        };
        let ordinal: usize = ordinal
            .parse()
            .map_err(|_| invalid(section, key, value, "feature keys are feature.<n>"))?;
        let mut parts = value.split('|').map(str::trim);
        let coords = parts.next().unwrap_or_default();
        let points = parse_points(coords).map_err(|reason| invalid(section, key, value, reason))?;
        let values: Vec<String> = parts.map(str::to_string).collect();
        if values.len() != fields.len() {
            return Err(invalid(
                section,
                key,
                value,
                format!("expected {} attribute values, found {}", fields.len(), values.len()),
            ));
        }
        features.push((ordinal, points, values));
    }
    features.sort_by_key(|(ordinal, _, _)| *ordinal);

    let mut dataset = Dataset::new(geometry, &fields);
    for (_, points, values) in features {
        dataset.push_feature(points, values);
    }
    Ok((ConnectionKey::new(kind, connection), dataset))
}

/// Parses `"x y, x y, ..."`.
fn parse_points(coords: &str) -> Result<Vec<Point>, String> {
    coords
        .split(',')
        .map(|pair| {
            let mut it = pair.split_whitespace().map(str::parse::<f64>);
            match (it.next(), it.next(), it.next()) {
                (Some(Ok(x)), Some(Ok(y)), None) => Ok(Point::new(x, y)),
                _ => Err(format!("invalid coordinate pair '{}'", pair.trim())),
            }
        })
        .collect()
}
