//! Single query command: open a layer, query it, print and optionally draw.

use clap::Args;
use mapengine::context::ConcurrentMapContext;
use mapengine::dispatch::RequestParams;
use mapengine::geometry::ShapeHandle;
use mapengine::ErrorKind;
use std::path::{Path, PathBuf};

use super::common::{build_services, load_config, load_map, start_logging, MapArgs};
use crate::error::CliError;

/// Arguments for `mapengine query`.
#[derive(Debug, Args)]
pub struct QueryArgs {
    #[command(flatten)]
    pub map: MapArgs,

    /// Config file (default: ~/.mapengine/config.ini)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Buffer each printed feature by this distance
    #[arg(long)]
    pub buffer: Option<f64>,

    /// Print at most this many features
    #[arg(long, default_value = "20")]
    pub limit: usize,

    /// Write the drawn map to this PNG file
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Print the GetCapabilities response before querying
    #[arg(long)]
    pub capabilities: bool,
}

/// Run the query command.
pub fn run(args: QueryArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;
    let _logging = start_logging(&config)?;

    let loaded = load_map(&args.map.map, &config)?;
    let services = build_services(&loaded, args.map.envelope_buffers);
    let pool = services.pool.clone();
    let filter = args.map.filter()?;

    let mut context = ConcurrentMapContext::from_definition(
        loaded.definition.clone(),
        services,
        config.context_config(),
    )?;

    if args.capabilities {
        let response = context.dispatch(&RequestParams::new().with("REQUEST", "GetCapabilities"));
        println!("{}", String::from_utf8_lossy(&response.bytes));
    }

    let layer = args.map.layer.as_str();
    context.open_layer(layer)?;
    let count = context.query(layer, filter.clone(), args.map.mode.into())?;
    println!("Layer '{}': {} matches for {}", layer, count, filter);

    for ordinal in 0..count.min(args.limit) {
        match context.materialize_shape(layer, ordinal) {
            Ok(shape) => {
                print_shape(ordinal, &shape);
                if let Some(distance) = args.buffer {
                    print_buffer(&context, &shape, distance);
                }
            }
            Err(e) if e.kind() == ErrorKind::BackendUnavailable => {
                println!("  #{}: unavailable ({})", ordinal, e);
            }
            Err(e) => return Err(e.into()),
        }
    }
    if count > args.limit {
        println!("  ... {} more", count - args.limit);
    }
    if let Some(bounds) = context.results(layer)?.bounds() {
        println!(
            "Result bounds: {} {} {} {}",
            bounds.minx, bounds.miny, bounds.maxx, bounds.maxy
        );
    }

    if let Some(path) = &args.output {
        write_image(&mut context, path)?;
    }

    let teardown = context.teardown();
    let shutdown = pool.shutdown();
    println!(
        "Closed {} layers, {} connections",
        teardown.layers_closed, shutdown.closed
    );
    Ok(())
}

fn print_shape(ordinal: usize, shape: &ShapeHandle) {
    let attributes: Vec<String> = shape
        .fields()
        .iter()
        .zip(shape.values())
        .map(|(f, v)| format!("{}={}", f, v))
        .collect();
    println!(
        "  #{} shape {} ({}, {} points): {}",
        ordinal,
        shape.shape_index(),
        shape.kind(),
        shape.points().len(),
        attributes.join(" ")
    );
}

fn print_buffer(context: &ConcurrentMapContext, shape: &ShapeHandle, distance: f64) {
    match context.buffer_shape(shape, distance) {
        Some(buffered) => {
            let b = buffered.bounds();
            println!(
                "      buffer {}: {} {} {} {}",
                distance, b.minx, b.miny, b.maxx, b.maxy
            );
        }
        None => println!("      buffer unavailable (use --envelope-buffers)"),
    }
}

fn write_image(context: &mut ConcurrentMapContext, path: &Path) -> Result<(), CliError> {
    let image = context.draw()?;
    let bytes = image
        .encode()
        .map_err(|e| CliError::Engine(e.into()))?;
    std::fs::write(path, bytes).map_err(|error| CliError::FileWrite {
        path: path.display().to_string(),
        error,
    })?;
    println!(
        "Wrote {}x{} {} to {}",
        image.width(),
        image.height(),
        image.format(),
        path.display()
    );
    Ok(())
}
