//! Fan-out over all companies and merge of their outputs.

use super::progress::Progress;
use super::sink::DestinationSink;
use super::worker::{EntityOutput, FetchWorker};
use super::PipelineError;
use crate::models::{Company, RegistryTuple, RunSummary};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Result of one coordinator run.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub success: bool,
    /// Union of all registry tuples; empty when the run failed.
    pub registry: HashSet<RegistryTuple>,
    pub summary: RunSummary,
}

/// What one task reports back after its output is merged.
#[derive(Debug, Clone, Copy, Default)]
struct TaskReport {
    skipped: bool,
    lines: usize,
    remaps: usize,
    unresolved: usize,
}

/// Runs one [`FetchWorker`] task per company and merges the results.
pub struct Coordinator {
    worker: Arc<FetchWorker>,
    sink: Arc<DestinationSink>,
    show_progress: bool,
}

impl Coordinator {
    pub fn new(worker: Arc<FetchWorker>, sink: Arc<DestinationSink>) -> Self {
        Self {
            worker,
            sink,
            show_progress: false,
        }
    }

    /// Show a terminal progress bar while tasks run.
    pub fn with_progress_bar(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Process every company. Per-company failures are absorbed by the
    /// worker; only setup, write, or task failures fail the run.
    pub async fn run(&self, companies: Vec<Company>) -> RunOutcome {
        let start = Instant::now();
        let entities = companies.len();
        info!("Processing {} companies", entities);

        match self.try_run(companies).await {
            Ok((registry, mut summary)) => {
                summary.duration_seconds = start.elapsed().as_secs_f64();
                info!(
                    "Run complete in {:.1}s: {} lines, {} registry entries",
                    summary.duration_seconds,
                    summary.lines_written,
                    registry.len()
                );
                RunOutcome {
                    success: true,
                    registry,
                    summary,
                }
            }
            Err(e) => {
                error!("Run aborted: {}", e);
                RunOutcome {
                    success: false,
                    registry: HashSet::new(),
                    summary: RunSummary {
                        entities,
                        duration_seconds: start.elapsed().as_secs_f64(),
                        ..RunSummary::default()
                    },
                }
            }
        }
    }

    async fn try_run(
        &self,
        companies: Vec<Company>,
    ) -> Result<(HashSet<RegistryTuple>, RunSummary), PipelineError> {
        self.sink.prepare().await?;

        let total = companies.len();
        let progress = Arc::new(Progress::new(total, self.show_progress));
        let registry = Arc::new(Mutex::new(HashSet::new()));

        let mut tickers = Vec::with_capacity(total);
        let mut handles = Vec::with_capacity(total);
        for company in companies {
            tickers.push(company.ticker.clone());

            let worker = Arc::clone(&self.worker);
            let sink = Arc::clone(&self.sink);
            let registry = Arc::clone(&registry);
            let progress = Arc::clone(&progress);

            handles.push(tokio::spawn(async move {
                let output = worker.process(&company).await;
                let report = merge(&output, &sink, &registry).await;
                progress.complete_one();
                report
            }));
        }

        let results = join_all(handles).await;
        progress.finish();

        let mut summary = RunSummary {
            entities: total,
            ..RunSummary::default()
        };
        for (ticker, joined) in tickers.into_iter().zip(results) {
            let report = joined.map_err(|e| PipelineError::TaskAborted {
                ticker,
                message: e.to_string(),
            })??;

            if report.skipped {
                summary.skipped += 1;
            } else if report.lines > 0 {
                summary.contributing += 1;
            }
            summary.lines_written += report.lines;
            summary.remaps += report.remaps;
            summary.unresolved += report.unresolved;
        }

        let registry = std::mem::take(&mut *registry.lock().await);
        Ok((registry, summary))
    }
}

/// Append every group of one company and union its registry tuples.
async fn merge(
    output: &EntityOutput,
    sink: &DestinationSink,
    registry: &Mutex<HashSet<RegistryTuple>>,
) -> Result<TaskReport, PipelineError> {
    let mut lines = 0;
    for (identity, group) in &output.groups {
        lines += sink.append(identity, group).await?;
    }

    debug!(ticker = %output.ticker, lines, "Merged company output");

    if !output.registry.is_empty() {
        registry
            .lock()
            .await
            .extend(output.registry.iter().cloned());
    }

    Ok(TaskReport {
        skipped: output.skipped.is_some(),
        lines,
        remaps: output.remaps,
        unresolved: output.unresolved,
    })
}
