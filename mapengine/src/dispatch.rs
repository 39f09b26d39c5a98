//! Protocol dispatch contract.
//!
//! OGC request parsing and response framing live outside the core. A
//! dispatcher receives the map plus already-decoded request parameters and
//! returns a status and a body.

use crate::map::MapHandle;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Decoded request parameters. Keys are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    params: BTreeMap<String, String>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.params.insert(key.to_ascii_uppercase(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .get(&key.to_ascii_uppercase())
            .map(String::as_str)
    }

    /// Parses `KEY=value&KEY2=value2`. Pairs without `=` get an empty value.
    pub fn from_query_string(query: &str) -> Self {
        let mut params = Self::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            params.insert(key.trim(), value.trim());
        }
        params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// What a dispatcher produced. `status == 0` is success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResponse {
    pub status: i32,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl DispatchResponse {
    pub fn ok(content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            status: 0,
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn failure(status: i32, message: &str) -> Self {
        Self {
            status,
            content_type: "text/plain".to_string(),
            bytes: message.as_bytes().to_vec(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 0
    }
}

/// Answers protocol requests against a map.
pub trait ProtocolDispatcher: Send + Sync {
    fn dispatch(&self, map: &MapHandle, params: &RequestParams) -> DispatchResponse;
}

/// Status returned for requests a dispatcher does not handle.
pub const STATUS_UNSUPPORTED: i32 = 1;

/// Answers `REQUEST=GetCapabilities` with a plain-text layer listing.
///
/// Enough to exercise the dispatch path without an OGC stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapabilitiesDispatcher;

impl ProtocolDispatcher for CapabilitiesDispatcher {
    fn dispatch(&self, map: &MapHandle, params: &RequestParams) -> DispatchResponse {
        match params.get("REQUEST") {
            Some(r) if r.eq_ignore_ascii_case("GetCapabilities") => {
                let mut body = String::new();
                let _ = writeln!(body, "map {}", map.name());
                if let Some(title) = map.definition().metadata.get("title") {
                    let _ = writeln!(body, "title {}", title);
                }
                let _ = writeln!(body, "formats {}", map.definition().output_formats.join(","));
                for layer in map.layers() {
                    let _ = writeln!(
                        body,
                        "layer {} {} {}",
                        layer.name(),
                        layer.definition().kind,
                        layer.state()
                    );
                }
                DispatchResponse::ok("text/plain", body.into_bytes())
            }
            Some(other) => {
                DispatchResponse::failure(STATUS_UNSUPPORTED, &format!("unsupported request {}", other))
            }
            None => DispatchResponse::failure(STATUS_UNSUPPORTED, "missing REQUEST parameter"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ConnectionKind;
    use crate::definition::{LayerDefinition, LayerKind, MapDefinition};
    use std::sync::Arc;

    fn map() -> MapHandle {
        let mut definition = MapDefinition::new("demo").with_layer(LayerDefinition::new(
            "POINT",
            LayerKind::Point,
            ConnectionKind::Local,
            "pts",
        ));
        definition
            .metadata
            .insert("title".to_string(), "Demo map".to_string());
        MapHandle::from_definition(Arc::new(definition)).unwrap()
    }

    #[test]
    fn test_params_are_case_insensitive() {
        let params = RequestParams::new().with("request", "GetMap");
        assert_eq!(params.get("REQUEST"), Some("GetMap"));
        assert_eq!(params.get("Request"), Some("GetMap"));
    }

    #[test]
    fn test_from_query_string() {
        let params = RequestParams::from_query_string("SERVICE=WMS&request=GetCapabilities&flag");
        assert_eq!(params.len(), 3);
        assert_eq!(params.get("service"), Some("WMS"));
        assert_eq!(params.get("FLAG"), Some(""));
    }

    #[test]
    fn test_capabilities() {
        let response = CapabilitiesDispatcher.dispatch(
            &map(),
            &RequestParams::new().with("REQUEST", "getcapabilities"),
        );
        assert!(response.is_success());
        let body = String::from_utf8(response.bytes).unwrap();
        assert!(body.contains("map demo"));
        assert!(body.contains("title Demo map"));
        assert!(body.contains("layer POINT point ready"));
    }

    #[test]
    fn test_unsupported_request() {
        let response =
            CapabilitiesDispatcher.dispatch(&map(), &RequestParams::new().with("REQUEST", "GetMap"));
        assert_eq!(response.status, STATUS_UNSUPPORTED);

        let response = CapabilitiesDispatcher.dispatch(&map(), &RequestParams::new());
        assert!(!response.is_success());
    }
}
