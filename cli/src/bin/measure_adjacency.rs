use std::path::PathBuf;

use adjacency::driver::{self, RunConfig};
use adjacency::{Backend, BackendFactory, MeasureParams, ResultStore};
use clap::Parser;
use cli::{parse_layer_list, summarize};
use color_eyre::eyre::{Result, eyre};
use tracing::{error, info};
use tracing_subscriber::{self, EnvFilter};
use trakem2::Trakem2Factory;

#[derive(Parser)]
#[command(author, version, about = "Measure boundary adjacency across TrakEM2 layers", long_about = None)]
struct Cli {
    /// TrakEM2 project file
    project: PathBuf,

    /// Output XML document (created if absent, merged by layer name if not)
    output: PathBuf,

    /// Boundaries separated by at most this many pixels count as adjacent
    #[arg(short = 'p', long, default_value_t = 10)]
    pixel_radius: u32,

    /// Area lists smaller than this (px^2) are excluded from processing
    #[arg(short = 't', long, default_value_t = 200.0)]
    area_threshold: f64,

    /// Scale factor applied to bounding boxes before the overlap pre-filter
    #[arg(short = 's', long, default_value_t = 1.1)]
    scale_bounding_box: f64,

    /// Number of workers processing layers in parallel
    #[arg(short = 'n', long, default_value_t = 1)]
    workers: usize,

    /// Comma-separated layer names to process (default: all layers)
    #[arg(short = 'l', long)]
    layers: Option<String>,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!("TrakEM2 file: {}", cli.project.display());
    info!("Writing to file: {}", cli.output.display());
    info!("Running {} worker(s)", cli.workers);

    let params = MeasureParams::new(cli.pixel_radius, cli.area_threshold, cli.scale_bounding_box)?;
    let factory = Trakem2Factory::new(&cli.project);

    // Parse once up front for the startup summary; workers re-open their
    // own views during the run
    let backend = factory.open()?;
    info!("Extracted {} layers", backend.list_layers().len());
    info!("Extracted {} area lists", backend.document().area_list_count());
    drop(backend);

    let config = RunConfig {
        layers: cli.layers.as_deref().map(parse_layer_list),
        worker_count: cli.workers,
        params,
    };
    match &config.layers {
        Some(list) => info!("Analyzing layers: {}", list.join(",")),
        None => info!("Analyzing all layers"),
    }

    let mut store = ResultStore::open_or_create(&cli.output)?;
    let report = driver::run(&factory, &mut store, &config)?;

    info!("{}", summarize(&report));
    if !report.all_succeeded() {
        for failed in &report.failed {
            error!(layer = %failed.layer, error = %failed.error, "layer failed");
        }
        return Err(eyre!("{} layer(s) failed", report.failed.len()));
    }

    info!("Finished!");
    Ok(())
}
