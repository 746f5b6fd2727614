use std::time::{Duration, Instant};

use adjacency_common::MeasureParams;
use tracing::{error, info};

use crate::PipelineError;
use crate::backend::{Backend, BackendFactory};
use crate::scheduler;
use crate::store::ResultStore;
use crate::task::TaskError;

/// What to process and how
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Explicit layer list; `None` means every layer the source knows,
    /// sorted by name
    pub layers: Option<Vec<String>>,
    pub worker_count: usize,
    pub params: MeasureParams,
}

#[derive(Debug)]
pub struct LayerReport {
    pub layer: String,
    pub adjacencies: usize,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct FailedLayer {
    pub layer: String,
    pub error: TaskError,
}

#[derive(Debug)]
pub struct RunReport {
    pub completed: Vec<LayerReport>,
    pub failed: Vec<FailedLayer>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Sequence one full run: resolve the target layers, reserve placeholders,
/// schedule the layer tasks, and commit each completed layer in submission
/// order.
///
/// Failure policy: a layer whose task fails is skipped. Its error is logged
/// with the layer name, its reserved placeholder stays in the document, and
/// the run continues; the report lists every failed layer so callers can
/// exit non-zero. Store errors are fatal immediately (there is no safe way
/// to proceed without durable output), but a failed rewrite never damages
/// the previous durable revision.
pub fn run<F: BackendFactory>(
    factory: &F,
    store: &mut ResultStore,
    config: &RunConfig,
) -> Result<RunReport, PipelineError> {
    let started = Instant::now();

    let layers = match &config.layers {
        Some(explicit) => explicit.clone(),
        None => {
            let backend = factory.open()?;
            let mut all = backend.list_layers();
            all.sort();
            all
        }
    };

    // The document's layer set reflects the intended scope of the run
    // before any computation starts
    store.reserve(&layers)?;

    let total = layers.len();
    let mut completed: Vec<LayerReport> = Vec::new();
    let mut failed: Vec<FailedLayer> = Vec::new();

    scheduler::run_all(
        factory,
        &layers,
        config.worker_count,
        &config.params,
        |idx, outcome| {
            match outcome.result {
                Ok(records) => {
                    let adjacencies = records.len();
                    store.commit(&outcome.layer, records)?;
                    info!(
                        layer = %outcome.layer,
                        adjacencies,
                        "processed {}/{} layers in {:.3}s (total {})",
                        idx + 1,
                        total,
                        outcome.elapsed.as_secs_f64(),
                        time_string(started.elapsed()),
                    );
                    completed.push(LayerReport {
                        layer: outcome.layer,
                        adjacencies,
                        elapsed: outcome.elapsed,
                    });
                }
                Err(err) => {
                    error!(layer = %outcome.layer, %err, "layer failed; keeping its placeholder");
                    failed.push(FailedLayer {
                        layer: outcome.layer,
                        error: err,
                    });
                }
            }
            Ok::<(), PipelineError>(())
        },
    )?;

    Ok(RunReport {
        completed,
        failed,
        elapsed: started.elapsed(),
    })
}

/// Render a duration as `d:h:m:s` for the cumulative progress line
pub fn time_string(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    format!("{days}:{hours}:{minutes}:{seconds}")
}
