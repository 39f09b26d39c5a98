//! Definition records.

use crate::backend::{ConnectionKey, ConnectionKind, ConnectionPolicy};
use crate::geometry::Rect;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Geometry type served by a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Point,
    Line,
    Polygon,
    Raster,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Point => write!(f, "point"),
            Self::Line => write!(f, "line"),
            Self::Polygon => write!(f, "polygon"),
            Self::Raster => write!(f, "raster"),
        }
    }
}

impl FromStr for LayerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "point" => Ok(Self::Point),
            "line" => Ok(Self::Line),
            "polygon" => Ok(Self::Polygon),
            "raster" => Ok(Self::Raster),
            other => Err(format!("unknown layer type '{}'", other)),
        }
    }
}

/// Whether a layer takes part in drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerStatus {
    #[default]
    On,
    Off,
    /// Always drawn, whatever the request asks for.
    Default,
}

impl FromStr for LayerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            "default" => Ok(Self::Default),
            other => Err(format!("unknown layer status '{}'", other)),
        }
    }
}

/// A layer class: a name and the styles it draws with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDefinition {
    pub name: String,
    pub styles: Vec<String>,
}

/// One layer of a map definition.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerDefinition {
    pub name: String,
    pub kind: LayerKind,
    pub connection_kind: ConnectionKind,
    pub connection: String,
    pub policy: ConnectionPolicy,
    pub status: LayerStatus,
    pub metadata: BTreeMap<String, String>,
    pub classes: Vec<ClassDefinition>,
}

impl LayerDefinition {
    pub fn new(
        name: impl Into<String>,
        kind: LayerKind,
        connection_kind: ConnectionKind,
        connection: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            connection_kind,
            connection: connection.into(),
            policy: ConnectionPolicy::default(),
            status: LayerStatus::default(),
            metadata: BTreeMap::new(),
            classes: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: ConnectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_status(mut self, status: LayerStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_class(mut self, name: impl Into<String>, styles: &[&str]) -> Self {
        self.classes.push(ClassDefinition {
            name: name.into(),
            styles: styles.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    /// Pool key for this layer's backend.
    pub fn connection_key(&self) -> ConnectionKey {
        ConnectionKey::new(self.connection_kind, &self.connection)
    }
}

/// A complete, immutable map definition.
#[derive(Debug, Clone, PartialEq)]
pub struct MapDefinition {
    pub name: String,
    pub extent: Rect,
    pub width: u32,
    pub height: u32,
    pub image_type: String,
    pub output_formats: Vec<String>,
    pub metadata: BTreeMap<String, String>,
    pub layers: Vec<LayerDefinition>,
}

impl MapDefinition {
    /// Creates a definition with a world extent, a 256×256 image and no layers.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extent: Rect::new(-180.0, -90.0, 180.0, 90.0),
            width: 256,
            height: 256,
            image_type: "png".to_string(),
            output_formats: vec!["png".to_string()],
            metadata: BTreeMap::new(),
            layers: Vec::new(),
        }
    }

    pub fn with_extent(mut self, extent: Rect) -> Self {
        self.extent = extent;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_layer(mut self, layer: LayerDefinition) -> Self {
        self.layers.push(layer);
        self
    }

    /// Looks a layer up by name (case-insensitive).
    pub fn layer(&self, name: &str) -> Option<&LayerDefinition> {
        self.layers
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(name))
    }

    /// Distinct backend keys used by the layers, in layer order.
    pub fn connection_keys(&self) -> Vec<ConnectionKey> {
        let mut keys: Vec<ConnectionKey> = Vec::new();
        for layer in &self.layers {
            let key = layer.connection_key();
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }
}
