use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, error, info, warn};
use serde_json::{Map, Value};

use crate::error::FetchError;
use crate::extractor;
use crate::metrics::{METRICS, RuntimeMetrics};
use crate::schema::{Category, EntityKind, SharedBucket, WorkItem, lock_bucket};
use crate::source::{CatalogSource, Lookup};

use super::enricher::Enricher;
use super::enrichment::EnrichmentTable;
use super::pool::{TaskOutcome, WorkerPool};
use super::retry::with_retries;

/// Outcome of one ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Commit {
    Committed,
    Duplicate,
    Failed,
}

/// Counters for one `collect` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub committed: usize,
    pub duplicates: usize,
    pub failed: usize,
}

/// Fans the IDs of one category across the worker pool.
///
/// Per ID:
/// 1. fetch the base record, up to `max_retries` attempts
///    (errors and empty results both retry)
/// 2. fill the project enrichment table (projects only)
/// 3. fetch the project's child units and run the nested
///    `Enricher` fan-out over them, then the unit models
/// 4. commit to the category bucket: first record per ID wins
///
/// FAILURE ISOLATION:
/// - An ID that exhausts its attempts is logged and left out.
/// - A panic while processing one ID is contained by the pool and
///   counted as failed.
/// - Neither ever affects sibling IDs or the batch.
///
/// The bucket lock is taken only for the commit, never across a
/// network call.
#[derive(Clone)]
pub struct BatchCollector {
    source: Arc<dyn CatalogSource>,
    enricher: Enricher,
    project_fields: Arc<EnrichmentTable>,
    pool: WorkerPool,
    max_retries: u32,
}

impl BatchCollector {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        enricher: Enricher,
        project_fields: EnrichmentTable,
        pool: WorkerPool,
        max_retries: u32,
    ) -> Self {
        debug_assert!(
            project_fields.keyed_by(EntityKind::Project),
            "project enrichment table holds a lookup not keyed by project ID"
        );
        Self {
            source,
            enricher,
            project_fields: Arc::new(project_fields),
            pool,
            max_retries,
        }
    }

    pub async fn collect(
        &self,
        ids: Vec<String>,
        category: Category,
        bucket: &SharedBucket,
    ) -> BatchSummary {
        let Some(kind) = category.entity_kind() else {
            warn!("{} is not a batched category", category.key());
            return BatchSummary::default();
        };

        let total = ids.len();
        let items: Vec<WorkItem> = ids.into_iter().map(|id| WorkItem::new(id, kind)).collect();
        let completed = Arc::new(AtomicUsize::new(0));

        let this = self.clone();
        let shared = bucket.clone();
        let outcomes = self
            .pool
            .run(items, move |item| {
                let this = this.clone();
                let bucket = shared.clone();
                let completed = completed.clone();
                async move {
                    let record = this.collect_one(&item).await;
                    let n = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    commit(category, &item, record, &bucket, n, total)
                }
            })
            .await;

        let mut summary = BatchSummary::default();
        for outcome in outcomes {
            match outcome {
                TaskOutcome::Done(Commit::Committed) => summary.committed += 1,
                TaskOutcome::Done(Commit::Duplicate) => summary.duplicates += 1,
                TaskOutcome::Done(Commit::Failed) => summary.failed += 1,
                TaskOutcome::Panicked(item) => {
                    RuntimeMetrics::incr(&METRICS.records_failed);
                    error!(
                        "Error processing {} {}: worker panicked",
                        category.label().to_lowercase(),
                        item
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Completed {} {} records ({} failed, {} duplicates)",
            lock_bucket(bucket).len(),
            category.label().to_lowercase(),
            summary.failed,
            summary.duplicates
        );

        summary
    }

    /// Per-ID routine with retries. `None` means no record.
    async fn collect_one(&self, item: &WorkItem) -> Option<Value> {
        with_retries(self.max_retries, item, move || self.fetch_once(item)).await
    }

    /// One attempt at a complete record.
    async fn fetch_once(&self, item: &WorkItem) -> Result<Option<Value>, FetchError> {
        let Some(raw) = self.source.fetch_record(item.kind, &item.id).await? else {
            return Ok(None);
        };

        match item.kind {
            EntityKind::Project => self.build_project(&item.id, &raw).await.map(Some),
            EntityKind::MarketUnit | EntityKind::ChildUnit => {
                let mut record = Map::new();
                record.insert("unit_id".to_string(), Value::String(item.id.clone()));
                if let Value::Object(fields) = raw {
                    record.extend(fields);
                }
                Ok(Some(Value::Object(record)))
            }
        }
    }

    async fn build_project(&self, id: &str, raw: &Value) -> Result<Value, FetchError> {
        let source = &*self.source;
        let mut record = extractor::extract_project(raw);

        self.project_fields.fetch_into(source, id, &mut record).await?;

        let units = match source.fetch_secondary(Lookup::AvailableUnits, id).await? {
            Value::Array(units) => units,
            _ => Vec::new(),
        };
        debug!("Enriching {} units of project {}", units.len(), id);
        let units = self.enricher.enrich_all(units).await;
        record.insert(Lookup::AvailableUnits.field().to_string(), Value::Array(units));

        let models = source.fetch_secondary(Lookup::UnitModels, id).await?;
        record.insert(Lookup::UnitModels.field().to_string(), models);

        Ok(Value::Object(record))
    }
}

/// Check-insert-append under the category lock.
fn commit(
    category: Category,
    item: &WorkItem,
    record: Option<Value>,
    bucket: &SharedBucket,
    n: usize,
    total: usize,
) -> Commit {
    let label = category.label();

    let Some(record) = record else {
        RuntimeMetrics::incr(&METRICS.records_failed);
        warn!(
            "[{}/{}] No data collected for {} {}",
            n,
            total,
            label.to_lowercase(),
            item
        );
        return Commit::Failed;
    };

    let units = count(&record, Lookup::AvailableUnits);
    let models = count(&record, Lookup::UnitModels);

    if !lock_bucket(bucket).commit(&item.id, record) {
        RuntimeMetrics::incr(&METRICS.duplicates_dropped);
        debug!("[{}/{}] Duplicate {} {} dropped", n, total, label, item);
        return Commit::Duplicate;
    }

    RuntimeMetrics::incr(&METRICS.records_committed);
    match item.kind {
        EntityKind::Project => info!(
            "[{}/{}] {} {} | {} available units, {} unit models",
            n, total, label, item, units, models
        ),
        _ => info!("[{}/{}] {} {}", n, total, label, item),
    }
    Commit::Committed
}

fn count(record: &Value, lookup: Lookup) -> usize {
    record
        .get(lookup.field())
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}
