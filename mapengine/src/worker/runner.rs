//! Scoped-thread worker runner.

use super::{RunReport, WorkJob, WorkerConfig};
use crate::context::{ConcurrentMapContext, ContextConfig, EngineServices};
use crate::error::{EngineError, ErrorKind};
use crate::{log_debug, log_error, log_info, log_warn};
use std::sync::Barrier;
use std::thread;
use std::time::Instant;

/// Outcome of one successful cycle.
#[derive(Debug, Default)]
struct CycleOutcome {
    results: usize,
    buffer_skipped: bool,
    leaks: usize,
}

/// Drives worker threads through repeated work cycles.
pub struct WorkerRunner {
    services: EngineServices,
    context_config: ContextConfig,
    config: WorkerConfig,
}

impl WorkerRunner {
    pub fn new(services: EngineServices, context_config: ContextConfig, config: WorkerConfig) -> Self {
        Self {
            services,
            context_config,
            config,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn services(&self) -> &EngineServices {
        &self.services
    }

    /// Runs `job` on every worker and waits for all of them.
    ///
    /// Workers start together behind a barrier. A worker that panics is
    /// counted in [`RunReport::panicked_workers`]; the others run to the end.
    pub fn run(&self, job: &WorkJob) -> RunReport {
        let threads = self.config.threads.max(1);
        let barrier = Barrier::new(threads);
        let started = Instant::now();

        log_info!(
            self.services.logger,
            "Starting {} workers x {} cycles on layer '{}' ({})",
            threads,
            self.config.cycles,
            job.layer,
            job.filter
        );

        let mut report = RunReport::default();
        thread::scope(|s| {
            let handles: Vec<_> = (0..threads)
                .map(|worker| {
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        self.run_worker(worker, job)
                    })
                })
                .collect();

            for (worker, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(worker_report) => report.merge(&worker_report),
                    Err(_) => {
                        report.panicked_workers += 1;
                        log_error!(self.services.logger, "Worker {} panicked", worker);
                    }
                }
            }
        });

        log_info!(
            self.services.logger,
            "Run finished in {:?}: {} cycles, {} failed, {} results, {} leaks",
            started.elapsed(),
            report.cycles_completed,
            report.failed_cycles,
            report.total_results,
            report.leaks
        );
        report
    }

    fn run_worker(&self, worker: usize, job: &WorkJob) -> RunReport {
        let mut report = RunReport::default();
        for cycle in 1..=self.config.cycles {
            match self.run_cycle(job) {
                Ok(outcome) => {
                    report.cycles_completed += 1;
                    report.total_results += outcome.results;
                    report.leaks += outcome.leaks;
                    if outcome.buffer_skipped {
                        report.buffers_skipped += 1;
                    }
                }
                Err(e) => {
                    report.failed_cycles += 1;
                    log_warn!(
                        self.services.logger,
                        "Worker {} cycle {} failed ({}): {}",
                        worker,
                        cycle,
                        e.kind(),
                        e
                    );
                }
            }

            if self.config.reclaim_every > 0 && cycle % self.config.reclaim_every == 0 {
                let closed = self.services.pool.reclaim_unreferenced();
                log_debug!(
                    self.services.logger,
                    "Worker {} reclaimed {} connections after cycle {}",
                    worker,
                    closed,
                    cycle
                );
            }
        }
        report
    }

    fn run_cycle(&self, job: &WorkJob) -> Result<CycleOutcome, EngineError> {
        let mut context = ConcurrentMapContext::from_definition(
            job.definition.clone(),
            self.services.clone(),
            self.context_config,
        )?;
        context.open_layer(&job.layer)?;
        let results = context.query(&job.layer, job.filter.clone(), job.mode)?;

        let mut outcome = CycleOutcome {
            results,
            ..CycleOutcome::default()
        };
        if job.materialize && results > 0 {
            match context.materialize_shape(&job.layer, 0) {
                Ok(shape) => {
                    outcome.buffer_skipped = context
                        .buffer_shape(&shape, self.config.buffer_distance)
                        .is_none();
                }
                Err(e) if e.kind() == ErrorKind::BackendUnavailable => {
                    log_warn!(
                        self.services.logger,
                        "Skipping materialize on '{}': {}",
                        job.layer,
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }

        context.draw()?;
        outcome.leaks = context.teardown().leaked_leases;
        Ok(outcome)
    }
}
