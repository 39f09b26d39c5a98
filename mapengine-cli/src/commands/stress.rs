//! Concurrent stress command: many workers cycling over one map.

use clap::Args;
use mapengine::worker::{RunReport, WorkJob, WorkerRunner};
use std::path::PathBuf;
use std::time::Instant;

use super::common::{build_services, load_config, load_map, start_logging, MapArgs};
use crate::error::CliError;

/// Arguments for `mapengine stress`.
#[derive(Debug, Args)]
pub struct StressArgs {
    #[command(flatten)]
    pub map: MapArgs,

    /// Config file (default: ~/.mapengine/config.ini)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Worker threads (default: [workers] threads)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Cycles per worker (default: [workers] cycles)
    #[arg(long)]
    pub cycles: Option<usize>,

    /// Reclaim every N cycles (default: [pool] reclaim_every)
    #[arg(long)]
    pub reclaim_every: Option<usize>,

    /// Materialize and buffer the first result of each cycle
    #[arg(long)]
    pub materialize: bool,
}

/// Run the stress command.
pub fn run(args: StressArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;
    let _logging = start_logging(&config)?;

    let mut workers = config.worker_config();
    if let Some(threads) = args.threads {
        workers = workers.with_threads(threads);
    }
    if let Some(cycles) = args.cycles {
        workers = workers.with_cycles(cycles);
    }
    if let Some(every) = args.reclaim_every {
        workers = workers.with_reclaim_every(every);
    }

    let loaded = load_map(&args.map.map, &config)?;
    let services = build_services(&loaded, args.map.envelope_buffers);
    let pool = services.pool.clone();
    let job = WorkJob::new(loaded.definition.clone(), args.map.layer.as_str(), args.map.filter()?)
        .with_mode(args.map.mode.into())
        .with_materialize(args.materialize);

    println!(
        "Running {} workers x {} cycles on '{}' ({})",
        workers.threads, workers.cycles, job.layer, job.filter
    );
    let started = Instant::now();
    let report = WorkerRunner::new(services, config.context_config(), workers).run(&job);
    let elapsed = started.elapsed();

    let reclaimed = pool.reclaim_unreferenced();
    let stats = pool.stats();
    let shutdown = pool.shutdown();

    print_report(&report);
    println!();
    println!("Pool:");
    println!("  Acquires:           {}", stats.acquires);
    println!("  Releases:           {}", stats.releases);
    println!("  Connections opened: {}", stats.connections_opened);
    println!("  Connections closed: {}", stats.connections_closed);
    println!("  Connect failures:   {}", stats.connect_failures);
    println!("  Timeouts:           {}", stats.timeouts);
    println!("  Reclaim passes:     {}", stats.reclaim_passes);
    println!("  Reclaimed at end:   {}", reclaimed);
    println!("  Closed at shutdown: {}", shutdown.closed);
    println!();
    println!("Finished in {:.2?}", elapsed);

    if !shutdown.is_clean() {
        return Err(CliError::StressFailed(format!(
            "{} pool entries still referenced at shutdown",
            shutdown.leaked.len()
        )));
    }
    if !report.is_clean() {
        return Err(CliError::StressFailed(format!(
            "{} failed cycles, {} leaks, {} panicked workers",
            report.failed_cycles, report.leaks, report.panicked_workers
        )));
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("Workers:");
    println!("  Cycles completed:  {}", report.cycles_completed);
    println!("  Cycles failed:     {}", report.failed_cycles);
    println!("  Results:           {}", report.total_results);
    println!("  Buffers skipped:   {}", report.buffers_skipped);
    println!("  Leaked leases:     {}", report.leaks);
    println!("  Panicked workers:  {}", report.panicked_workers);
}
