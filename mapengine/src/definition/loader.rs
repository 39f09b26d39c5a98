//! Definition loading.
//!
//! The full mapfile grammar is handled elsewhere; the engine only depends on
//! the [`ConfigLoader`] contract. [`IniDefinitionLoader`] is the loader the
//! CLI and tests use:
//!
//! ```ini
//! [map]
//! name = demo
//! extent = -180 -90 180 90
//! size = 400 300
//! image_type = png
//! output_formats = png, jpeg
//! meta.title = Demo map
//!
//! [layer.POINT]
//! type = point
//! connection_type = local
//! connection = data/points
//! close_connection = normal
//! status = on
//! class.default = marker
//! ```
//!
//! Layers keep the order of their sections.

use super::types::{LayerDefinition, LayerKind, LayerStatus, MapDefinition};
use super::DefinitionError;
use crate::backend::{ConnectionKind, ConnectionPolicy};
use crate::geometry::Rect;
use ini::{Ini, Properties};
use std::collections::BTreeMap;
use std::path::Path;

const MAP_SECTION: &str = "map";
const LAYER_SECTION_PREFIX: &str = "layer.";
const META_PREFIX: &str = "meta.";
const CLASS_PREFIX: &str = "class.";

/// Produces the immutable definition a map is cloned from.
pub trait ConfigLoader {
    fn load(&self, path: &Path) -> Result<MapDefinition, DefinitionError>;
}

/// Loads map definitions from INI files.
#[derive(Debug, Clone, Copy, Default)]
pub struct IniDefinitionLoader {
    default_policy: ConnectionPolicy,
}

impl IniDefinitionLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy for layers without a `close_connection` key.
    pub fn with_default_policy(mut self, policy: ConnectionPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    /// Parses a definition held in memory.
    pub fn parse_str(&self, source: &str) -> Result<MapDefinition, DefinitionError> {
        let ini = Ini::load_from_str(source).map_err(|e| DefinitionError::Syntax(e.to_string()))?;
        self.parse_ini(&ini)
    }

    /// Builds a definition from parsed INI.
    pub fn parse_ini(&self, ini: &Ini) -> Result<MapDefinition, DefinitionError> {
        let map = ini
            .section(Some(MAP_SECTION))
            .ok_or_else(|| DefinitionError::MissingSection(MAP_SECTION.to_string()))?;

        let name = map.get("name").ok_or_else(|| DefinitionError::MissingKey {
            section: MAP_SECTION.to_string(),
            key: "name".to_string(),
        })?;
        let mut definition = MapDefinition::new(name.trim());

        if let Some(v) = map.get("extent") {
            definition.extent = parse_extent(v)
                .ok_or_else(|| invalid(MAP_SECTION, "extent", v, "expected 'minx miny maxx maxy'"))?;
        }
        if let Some(v) = map.get("size") {
            let (w, h) = parse_size(v)
                .ok_or_else(|| invalid(MAP_SECTION, "size", v, "expected 'width height', both > 0"))?;
            definition.width = w;
            definition.height = h;
        }
        if let Some(v) = map.get("image_type") {
            definition.image_type = v.trim().to_lowercase();
        }
        if let Some(v) = map.get("output_formats") {
            definition.output_formats = split_list(v);
        }
        definition.metadata = prefixed(map, META_PREFIX);

        for (section, props) in ini.iter() {
            let Some(layer_name) = section.and_then(|s| s.strip_prefix(LAYER_SECTION_PREFIX)) else {
                continue;
            };
            let section = format!("{}{}", LAYER_SECTION_PREFIX, layer_name);
            if definition.layer(layer_name).is_some() {
                return Err(DefinitionError::DuplicateLayer(layer_name.to_string()));
            }
            let mut layer = parse_layer(&section, layer_name, props)?;
            if props.get("close_connection").is_none() {
                layer.policy = self.default_policy;
            }
            definition.layers.push(layer);
        }

        Ok(definition)
    }
}

impl ConfigLoader for IniDefinitionLoader {
    fn load(&self, path: &Path) -> Result<MapDefinition, DefinitionError> {
        let ini = Ini::load_from_file(path)?;
        self.parse_ini(&ini)
    }
}

fn parse_layer(section: &str, name: &str, props: &Properties) -> Result<LayerDefinition, DefinitionError> {
    let kind: LayerKind = match props.get("type") {
        Some(v) => v.parse().map_err(|e| invalid(section, "type", v, e))?,
        None => return Err(missing(section, "type")),
    };
    let connection_kind: ConnectionKind = match props.get("connection_type") {
        Some(v) => v.parse().map_err(|e| invalid(section, "connection_type", v, e))?,
        None => ConnectionKind::Local,
    };
    let connection = props
        .get("connection")
        .ok_or_else(|| missing(section, "connection"))?;

    let mut layer = LayerDefinition::new(name, kind, connection_kind, connection.trim());

    if let Some(v) = props.get("close_connection") {
        layer.policy = v
            .parse::<ConnectionPolicy>()
            .map_err(|e| invalid(section, "close_connection", v, e))?;
    }
    if let Some(v) = props.get("status") {
        layer.status = v
            .parse::<LayerStatus>()
            .map_err(|e| invalid(section, "status", v, e))?;
    }
    layer.metadata = prefixed(props, META_PREFIX);
    for (key, value) in props.iter() {
        if let Some(class) = key.strip_prefix(CLASS_PREFIX) {
            let styles = split_list(value);
            let styles: Vec<&str> = styles.iter().map(String::as_str).collect();
            layer = layer.with_class(class, &styles);
        }
    }
    Ok(layer)
}

fn parse_extent(v: &str) -> Option<Rect> {
    let n: Vec<f64> = v
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    match n.as_slice() {
        [minx, miny, maxx, maxy] => Some(Rect::new(*minx, *miny, *maxx, *maxy)),
        _ => None,
    }
}

fn parse_size(v: &str) -> Option<(u32, u32)> {
    let mut it = v.split_whitespace().map(str::parse::<u32>);
    match (it.next(), it.next(), it.next()) {
        (Some(Ok(w)), Some(Ok(h)), None) if w > 0 && h > 0 => Some((w, h)),
        _ => None,
    }
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn prefixed(props: &Properties, prefix: &str) -> BTreeMap<String, String> {
    props
        .iter()
        .filter_map(|(k, v)| k.strip_prefix(prefix).map(|k| (k.to_string(), v.to_string())))
        .collect()
}

fn missing(section: &str, key: &str) -> DefinitionError {
    DefinitionError::MissingKey {
        section: section.to_string(),
        key: key.to_string(),
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

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO: &str = "\
[map]
name = demo
extent = -10 40 10 60
size = 400 300
image_type = PNG
output_formats = png, jpeg
meta.title = Demo map

[layer.POINT]
type = point
connection_type = local
connection = data/points
status = on
meta.wms_title = Points
class.default = marker, halo

[layer.roads]
type = line
connection_type = postgis
connection = host=db dbname=gis
close_connection = defer
status = off
";

    #[test]
    fn test_parse_demo_definition() {
        let def = IniDefinitionLoader::new().parse_str(DEMO).unwrap();

        assert_eq!(def.name, "demo");
        assert_eq!(def.extent, Rect::new(-10.0, 40.0, 10.0, 60.0));
        assert_eq!((def.width, def.height), (400, 300));
        assert_eq!(def.image_type, "png");
        assert_eq!(def.output_formats, vec!["png", "jpeg"]);
        assert_eq!(def.metadata.get("title").map(String::as_str), Some("Demo map"));

        assert_eq!(def.layers.len(), 2);
        let point = &def.layers[0];
        assert_eq!(point.name, "POINT");
        assert_eq!(point.kind, LayerKind::Point);
        assert_eq!(point.connection_kind, ConnectionKind::Local);
        assert_eq!(point.policy, ConnectionPolicy::Normal);
        assert_eq!(point.classes[0].name, "default");
        assert_eq!(point.classes[0].styles, vec!["marker", "halo"]);
        assert_eq!(
            point.metadata.get("wms_title").map(String::as_str),
            Some("Points")
        );

        let roads = &def.layers[1];
        assert_eq!(roads.connection_kind, ConnectionKind::PostGis);
        assert_eq!(roads.policy, ConnectionPolicy::Defer);
        assert_eq!(roads.status, LayerStatus::Off);
    }

    #[test]
    fn test_default_policy_applies_to_unset_layers() {
        let def = IniDefinitionLoader::new()
            .with_default_policy(ConnectionPolicy::Always)
            .parse_str(DEMO)
            .unwrap();
        assert_eq!(def.layers[0].policy, ConnectionPolicy::Always);
        // An explicit close_connection wins.
        assert_eq!(def.layers[1].policy, ConnectionPolicy::Defer);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.ini");
        std::fs::write(&path, DEMO).unwrap();

        let def = IniDefinitionLoader::new().load(&path).unwrap();
        assert_eq!(def.layers.len(), 2);
    }

    #[test]
    fn test_missing_map_section() {
        let err = IniDefinitionLoader::new()
            .parse_str("[layer.a]\ntype = point\nconnection = x\n")
            .unwrap_err();
        assert!(matches!(err, DefinitionError::MissingSection(s) if s == "map"));
    }

    #[test]
    fn test_layer_requires_connection() {
        let err = IniDefinitionLoader::new()
            .parse_str("[map]\nname = m\n[layer.a]\ntype = point\n")
            .unwrap_err();
        assert!(matches!(err, DefinitionError::MissingKey { key, .. } if key == "connection"));
    }

    #[test]
    fn test_invalid_close_connection() {
        let err = IniDefinitionLoader::new()
            .parse_str("[map]\nname = m\n[layer.a]\ntype = point\nconnection = x\nclose_connection = later\n")
            .unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidValue { key, .. } if key == "close_connection"));
    }

    #[test]
    fn test_invalid_size() {
        let err = IniDefinitionLoader::new()
            .parse_str("[map]\nname = m\nsize = 0 10\n")
            .unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidValue { key, .. } if key == "size"));
    }

    #[test]
    fn test_duplicate_layer_names() {
        let err = IniDefinitionLoader::new()
            .parse_str(
                "[map]\nname = m\n[layer.a]\ntype = point\nconnection = x\n[layer.A]\ntype = point\nconnection = y\n",
            )
            .unwrap_err();
        assert!(matches!(err, DefinitionError::DuplicateLayer(_)));
    }
}
