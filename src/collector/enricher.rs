use std::sync::Arc;

use log::{debug, error};
use serde_json::{Map, Value};

use crate::error::FetchError;
use crate::metrics::{METRICS, RuntimeMetrics};
use crate::schema::{EntityKind, WorkItem};
use crate::source::CatalogSource;
use crate::util;

use super::enrichment::EnrichmentTable;
use super::pool::{TaskOutcome, WorkerPool};
use super::retry::with_retries;

/// Enriches the child units of one project.
///
/// Per unit, the unit lookup table (insights, project trends,
/// transactions) is fetched with up to `max_retries` attempts.
///
/// GUARANTEES:
/// - `enrich` never fails: a unit whose lookups are exhausted, or
///   that has no ID, comes back with placeholders for every field.
/// - The unit's own fields win over enrichment fields of the same
///   name.
/// - With every lookup disabled no request is made at all.
///
/// `enrich_all` runs on its own pool run, sized like the outer
/// pool. The outer worker waits for it to finish.
#[derive(Clone)]
pub struct Enricher {
    source: Arc<dyn CatalogSource>,
    fields: Arc<EnrichmentTable>,
    pool: WorkerPool,
    max_retries: u32,
}

impl Enricher {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        fields: EnrichmentTable,
        pool: WorkerPool,
        max_retries: u32,
    ) -> Self {
        debug_assert!(
            fields.keyed_by(EntityKind::ChildUnit),
            "unit enrichment table holds a lookup not keyed by unit ID"
        );
        Self {
            source,
            fields: Arc::new(fields),
            pool,
            max_retries,
        }
    }

    pub async fn enrich(&self, unit: Value) -> Value {
        let base = match unit {
            Value::Object(m) => m,
            other => {
                debug!("Skipping enrichment of non-object unit {}", other);
                return other;
            }
        };

        if !self.fields.any_enabled() {
            return self.with_placeholders(base);
        }

        let Some(id) = base.get("id").and_then(util::json_id) else {
            return self.with_placeholders(base);
        };

        let item = WorkItem::new(id, EntityKind::ChildUnit);
        let fields = &*self.fields;
        let source = &*self.source;
        let unit_id = item.id.as_str();

        let enriched = with_retries(self.max_retries, &item, move || async move {
            let mut out = Map::new();
            fields.fetch_into(source, unit_id, &mut out).await?;
            Ok::<_, FetchError>(Some(out))
        })
        .await;

        match enriched {
            Some(fields) => {
                RuntimeMetrics::incr(&METRICS.units_enriched);
                merge(fields, base)
            }
            None => {
                RuntimeMetrics::incr(&METRICS.unit_enrichment_failures);
                self.with_placeholders(base)
            }
        }
    }

    /// Enriches every unit on this enricher's pool.
    ///
    /// Output order is completion order. A unit whose task panics
    /// is kept with placeholders.
    pub async fn enrich_all(&self, units: Vec<Value>) -> Vec<Value> {
        if units.is_empty() {
            return units;
        }

        let this = self.clone();
        let outcomes = self
            .pool
            .run(units, move |unit| {
                let this = this.clone();
                async move { this.enrich(unit).await }
            })
            .await;

        outcomes
            .into_iter()
            .map(|outcome| match outcome {
                TaskOutcome::Done(unit) => unit,
                TaskOutcome::Panicked(unit) => {
                    RuntimeMetrics::incr(&METRICS.unit_enrichment_failures);
                    error!(
                        "Error enriching unit {}",
                        unit.get("id").and_then(util::json_id).unwrap_or_else(|| "unknown".into())
                    );
                    match unit {
                        Value::Object(base) => self.with_placeholders(base),
                        other => other,
                    }
                }
            })
            .collect()
    }

    fn with_placeholders(&self, base: Map<String, Value>) -> Value {
        merge(self.fields.placeholders(), base)
    }
}

fn merge(mut enrichment: Map<String, Value>, base: Map<String, Value>) -> Value {
    enrichment.extend(base);
    Value::Object(enrichment)
}
