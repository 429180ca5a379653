use std::sync::Arc;

use anyhow::anyhow;
use log::{info, warn};
use serde_json::Value;

use crate::collector::{BatchCollector, BatchSummary};
use crate::collector::retry::with_retries;
use crate::config::Config;
use crate::schema::{Category, CategoryBucket, Dataset, lock_bucket};
use crate::source::CatalogSource;

/// Record count of one category at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryCount {
    pub category: Category,
    pub records: usize,
    /// Child units across all records (project categories only)
    pub units: Option<usize>,
}

/// ============================================================
/// Orchestrator
/// ============================================================
///
/// Runs one collection pass:
/// 1. overview and mega projects (single requests, no fan-out)
/// 2. every enabled batched category, strictly one after the
///    other, in `Category::BATCHED` order
///
/// FAILURE POLICY:
/// - overview / mega projects: logged, category left empty
/// - ID listing: retried like any other request; once exhausted
///   the whole run fails
/// - individual IDs: never fatal (handled by `BatchCollector`)
pub struct Orchestrator {
    source: Arc<dyn CatalogSource>,
    collector: BatchCollector,
    config: Config,
}

impl Orchestrator {
    pub fn new(source: Arc<dyn CatalogSource>, collector: BatchCollector, config: Config) -> Self {
        Self {
            source,
            collector,
            config,
        }
    }

    pub async fn collect_all(&self) -> anyhow::Result<Dataset> {
        info!("Starting data collection");
        if self.config.test_run {
            info!("TEST MODE: every category limited to its first item");
        }

        let toggles = &self.config.categories;
        let mut dataset = Dataset::default();

        if toggles.is_enabled(Category::Overview) {
            self.collect_overview(&mut dataset).await;
        } else {
            info!("Overview collection disabled in configuration");
        }

        if toggles.is_enabled(Category::MegaProjects) {
            self.collect_mega_projects(&mut dataset).await;
        } else {
            info!("Mega projects collection disabled in configuration");
        }

        for category in Category::BATCHED {
            if !toggles.is_enabled(category) {
                info!("{} collection disabled in configuration", category.key());
                continue;
            }

            let (records, summary) = self.collect_category(category).await?;
            if summary.failed > 0 || summary.duplicates > 0 {
                warn!(
                    "{}: {} IDs failed, {} duplicates dropped",
                    category.key(),
                    summary.failed,
                    summary.duplicates
                );
            }
            if let Some(slot) = dataset.records_mut(category) {
                *slot = records;
            }
        }

        info!("Completed data collection");
        for count in run_summary(&dataset) {
            match count.units {
                Some(units) => info!(
                    "  {}: {} ({} units)",
                    count.category.key(),
                    count.records,
                    units
                ),
                None => info!("  {}: {}", count.category.key(), count.records),
            }
        }

        Ok(dataset)
    }

    // Failures here are logged and the run continues without an overview.
    async fn collect_overview(&self, dataset: &mut Dataset) {
        info!("Fetching overview data");
        match self.source.fetch_overview().await {
            Ok(overview) if !overview.is_empty() => {
                dataset.overview = overview;
                info!("Collected overview data");
            }
            Ok(_) => warn!("Overview returned no data"),
            Err(e) => warn!("Failed to collect overview data: {}", e),
        }
    }

    // Same policy as the overview: a failure leaves the category empty.
    async fn collect_mega_projects(&self, dataset: &mut Dataset) {
        info!("Fetching mega projects data");
        match self.source.fetch_mega_projects().await {
            Ok(mut mega) if !mega.is_empty() => {
                if self.config.test_run {
                    mega.truncate(1);
                }
                info!("Collected {} mega projects", mega.len());
                dataset.mega_projects = mega;
            }
            Ok(_) => warn!("Mega projects returned no data"),
            Err(e) => warn!("Failed to collect mega projects data: {}", e),
        }
    }

    async fn collect_category(
        &self,
        category: Category,
    ) -> anyhow::Result<(Vec<Value>, BatchSummary)> {
        let source = &*self.source;
        let what = format!("{} ID listing", category.key());

        let mut ids = with_retries(self.config.rate_limit.max_retries, what.as_str(), || async move {
            source.list_ids(category).await.map(Some)
        })
        .await
        .ok_or_else(|| anyhow!("failed to list {} IDs", category.key()))?;

        if ids.is_empty() {
            warn!("No {} IDs found", category.key());
            return Ok((Vec::new(), BatchSummary::default()));
        }
        if self.config.test_run {
            ids.truncate(1);
        }

        let concurrency = &self.config.concurrency;
        if concurrency.enabled {
            info!(
                "Processing {} {} items concurrently with {} workers",
                ids.len(),
                category.key(),
                concurrency.max_workers
            );
        } else {
            info!("Processing {} {} items sequentially", ids.len(), category.key());
        }

        let bucket = CategoryBucket::shared();
        let summary = self.collector.collect(ids, category, &bucket).await;

        if lock_bucket(&bucket).is_empty() {
            warn!("No {} records collected", category.key());
        }
        let records = std::mem::take(&mut *lock_bucket(&bucket)).into_records();
        Ok((records, summary))
    }
}

/// Per-category record counts, singleton overview excluded.
pub fn run_summary(dataset: &Dataset) -> Vec<CategoryCount> {
    std::iter::once(Category::MegaProjects)
        .chain(Category::BATCHED)
        .map(|category| CategoryCount {
            category,
            records: dataset.records(category).map_or(0, Vec::len),
            units: matches!(
                category,
                Category::ProjectsUnderConstruction | Category::ProjectsReadymade
            )
            .then(|| dataset.total_units(category)),
        })
        .collect()
}
