// ------------------------------------------------------------
// Module declarations
// ------------------------------------------------------------
//
// Each module represents a well-defined responsibility:
//
// - config:       Configuration structs loaded from JSON
// - schema:       Categories, work items, buckets and the dataset
// - util:         Shared helper utilities (IDs, pacing, JSON paths)
// - error:        Typed fetch errors
// - http:         Rate gate, transport and fetch client
// - source:       Catalog source trait and the Sakani implementation
// - extractor:    Project document flattening
// - collector:    Worker pool, retries, batch and unit enrichment
// - orchestrator: Category ordering and the run summary
// - geojson:      GeoJSON view of the dataset
// - export:       Output files
//
mod collector;
mod config;
mod error;
mod export;
mod extractor;
mod geojson;
mod http;
mod metrics;
mod orchestrator;
mod schema;
mod source;
mod util;

#[cfg(test)]
mod testing;

// ------------------------------------------------------------
// External dependencies
// ------------------------------------------------------------

use anyhow::Context;
use log::info;

use collector::{BatchCollector, Enricher, EnrichmentTable, WorkerPool};
use config::Config;
use http::{FetchClient, ProxySettings, RateGate, ReqwestTransport};
use metrics::METRICS;
use orchestrator::{Orchestrator, run_summary};
use source::{CatalogSource, SakaniCatalog};

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

// ------------------------------------------------------------
// Application entry point
// ------------------------------------------------------------
//
// One harvest run:
// - Load and validate configuration
// - Build the shared rate gate, fetch client and catalog source
// - Collect every enabled category
// - Export the dataset (and optionally GeoJSON)
//
// Any error returned here ends the run with a non-zero status.
//
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --------------------------------------------------------
    // Load configuration from disk
    //
    // The path may be given as the first argument; the default
    // is `config.json` in the working directory.
    // --------------------------------------------------------
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());
    let config = load_config(&config_path)?;

    init_logging(config.debug_log());
    config.validate()?;
    info!("Loaded configuration from {}", config_path);

    // --------------------------------------------------------
    // Network stack
    //
    // ONE gate and ONE client for the whole process: every
    // worker at every level observes the same pause and the
    // same in-flight limit.
    // --------------------------------------------------------
    let rate = &config.rate_limit;
    let transport = ReqwestTransport::new(
        Duration::from_secs(rate.request_timeout_secs),
        ProxySettings::from_env(),
    )
    .context("failed to build HTTP client")?;
    let client = FetchClient::new(
        Arc::new(transport),
        Arc::new(RateGate::new(rate.pause_duration_minutes)),
        rate.speed_factor,
        config.concurrency.max_workers,
    );
    let gate = client.gate().clone();
    let source: Arc<dyn CatalogSource> =
        Arc::new(SakaniCatalog::new(client, config.trend_months()));

    // --------------------------------------------------------
    // Collectors
    //
    // Both fan-out levels use the same pool size. The nested
    // level gets its own pool run per project.
    // --------------------------------------------------------
    let pool = WorkerPool::new(config.concurrency.max_workers, config.concurrency.enabled);
    let enricher = Enricher::new(
        source.clone(),
        EnrichmentTable::for_units(&config.unit_enrichment),
        pool,
        rate.max_retries,
    );
    let collector = BatchCollector::new(
        source.clone(),
        enricher,
        EnrichmentTable::for_projects(&config.project_enrichment),
        pool,
        rate.max_retries,
    );
    let orchestrator = Orchestrator::new(source, collector, config.clone());

    // --------------------------------------------------------
    // Start metrics reporter (periodic, low-noise)
    // --------------------------------------------------------
    let reporter = tokio::spawn(async move {
        loop {
            sleep(Duration::from_secs(10)).await;
            info!("[METRICS] gate={:?} {}", gate.state(), METRICS.snapshot_line());
        }
    });

    let dataset = orchestrator.collect_all().await;
    reporter.abort();
    let dataset = dataset?;

    // --------------------------------------------------------
    // Export
    // --------------------------------------------------------
    export::export_json(&dataset, Path::new(&config.output.path))?;
    if let Some(dir) = &config.output.geojson_dir {
        export::export_geojson(&dataset, Path::new(dir))?;
    }

    let counts = run_summary(&dataset);
    let total = |wanted: &[schema::Category]| -> usize {
        counts
            .iter()
            .filter(|c| wanted.contains(&c.category))
            .map(|c| c.records)
            .sum()
    };
    info!(
        "Successfully processed overview, {} mega projects, {} projects, and {} market items",
        total(&[schema::Category::MegaProjects]),
        total(&[
            schema::Category::ProjectsUnderConstruction,
            schema::Category::ProjectsReadymade,
        ]),
        total(&[
            schema::Category::MarketUnitBuy,
            schema::Category::MarketLandsBuy,
            schema::Category::MarketUnitRent,
        ]),
    );
    info!("[METRICS] {}", METRICS.snapshot_line());

    Ok(())
}

// ------------------------------------------------------------
// Logging
// ------------------------------------------------------------
//
// `RUST_LOG` always wins; otherwise `info`, or `debug` when the
// config enables debug logging.
//
fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();
}

// ------------------------------------------------------------
// Configuration loader
// ------------------------------------------------------------
//
// Reads a JSON configuration file from disk and deserializes
// it into the strongly typed `Config` structure. Semantic
// checks happen in `Config::validate`.
//
fn load_config(path: &str) -> anyhow::Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path))?;
    let cfg = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse config file {}", path))?;
    Ok(cfg)
}
