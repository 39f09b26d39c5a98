//! Common types and utilities shared across CLI commands.

use clap::{Args, ValueEnum};
use mapengine::backend::MemoryBackend;
use mapengine::config::ConfigFile;
use mapengine::context::EngineServices;
use mapengine::definition::{ConfigLoader, IniDefinitionLoader, MapDefinition};
use mapengine::geometry::{EnvelopeGeometryEngine, Rect};
use mapengine::log::{Logger, TracingLogger};
use mapengine::logging::{init_logging, LoggingGuard};
use mapengine::pool::ConnectionPool;
use mapengine::query::{MatchMode, QueryFilter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::CliError;

/// Match mode selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum MatchArg {
    /// Stop at the first match
    Single,
    /// Collect every match
    Multiple,
}

impl From<MatchArg> for MatchMode {
    fn from(arg: MatchArg) -> Self {
        match arg {
            MatchArg::Single => MatchMode::Single,
            MatchArg::Multiple => MatchMode::Multiple,
        }
    }
}

/// Map file and query selection shared by `query` and `stress`.
#[derive(Debug, Args)]
pub struct MapArgs {
    /// Map definition file; [dataset.*] sections in it feed the in-memory backend
    #[arg(long)]
    pub map: PathBuf,

    /// Layer to query
    #[arg(long)]
    pub layer: String,

    /// Attribute to match (with --value)
    #[arg(long, requires = "value", conflicts_with_all = ["index", "rect"])]
    pub field: Option<String>,

    /// Attribute value to match (with --field)
    #[arg(long, requires = "field")]
    pub value: Option<String>,

    /// Shape index to select
    #[arg(long, conflicts_with = "rect")]
    pub index: Option<usize>,

    /// Bounding box to intersect: "minx,miny,maxx,maxy"
    #[arg(long, allow_hyphen_values = true)]
    pub rect: Option<String>,

    /// Match mode
    #[arg(long, value_enum, default_value = "multiple")]
    pub mode: MatchArg,

    /// Use the envelope geometry engine instead of none
    #[arg(long)]
    pub envelope_buffers: bool,
}

impl MapArgs {
    /// Build the query filter from whichever selector was given.
    pub fn filter(&self) -> Result<QueryFilter, CliError> {
        if let (Some(field), Some(value)) = (&self.field, &self.value) {
            return Ok(QueryFilter::attribute(field.as_str(), value.as_str()));
        }
        if let Some(index) = self.index {
            return Ok(QueryFilter::Index(index));
        }
        if let Some(rect) = &self.rect {
            return parse_rect(rect).map(QueryFilter::Intersects);
        }
        Err(CliError::Usage(
            "one of --field/--value, --index or --rect is required".to_string(),
        ))
    }
}

/// Parse "minx,miny,maxx,maxy".
pub fn parse_rect(s: &str) -> Result<Rect, CliError> {
    let n: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| CliError::Usage(format!("invalid --rect '{}'", s)))?;
    match n.as_slice() {
        [minx, miny, maxx, maxy] => Ok(Rect::new(*minx, *miny, *maxx, *maxy)),
        _ => Err(CliError::Usage(format!(
            "--rect needs four numbers, got '{}'",
            s
        ))),
    }
}

/// Load the engine config from `path`, or the default location.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let config = match path {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    Ok(config)
}

/// Install file and console logging as configured.
pub fn start_logging(config: &ConfigFile) -> Result<LoggingGuard, CliError> {
    init_logging(&config.logging.directory, &config.logging.file)
        .map_err(|e| CliError::LoggingInit(e.to_string()))
}

/// A loaded map together with the backend serving its datasets.
pub struct LoadedMap {
    pub definition: Arc<MapDefinition>,
    pub backend: Arc<MemoryBackend>,
}

/// Load the map definition and its datasets from one file.
pub fn load_map(path: &Path, config: &ConfigFile) -> Result<LoadedMap, CliError> {
    let definition = IniDefinitionLoader::new()
        .with_default_policy(config.pool.default_policy)
        .load(path)?;
    let backend = Arc::new(MemoryBackend::new());
    backend.load_datasets_file(path)?;
    Ok(LoadedMap {
        definition: Arc::new(definition),
        backend,
    })
}

/// Pool and services over a loaded map's backend.
pub fn build_services(map: &LoadedMap, envelope_buffers: bool) -> EngineServices {
    let logger: Arc<dyn Logger> = Arc::new(TracingLogger::new());
    let pool = ConnectionPool::new(map.backend.clone(), Arc::clone(&logger));
    let services = EngineServices::new(pool, logger);
    if envelope_buffers {
        services.with_geometry(Arc::new(EnvelopeGeometryEngine))
    } else {
        services
    }
}
