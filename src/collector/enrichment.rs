use serde_json::{Map, Value};

use crate::config::{ProjectEnrichment, UnitEnrichment};
use crate::error::FetchError;
use crate::schema::EntityKind;
use crate::source::{CatalogSource, Lookup};

/// One optional field: which lookup fills it, and whether it runs.
#[derive(Debug, Clone, Copy)]
pub struct EnrichmentField {
    pub lookup: Lookup,
    pub enabled: bool,
}

/// Declarative table of optional fields for one entity kind.
///
/// Every field is evaluated the same way: enabled fields are
/// fetched in table order, disabled ones get their placeholder
/// without touching the network. Adding a lookup means adding a
/// row here, not a new branch in the collectors.
#[derive(Debug, Clone)]
pub struct EnrichmentTable {
    fields: Vec<EnrichmentField>,
}

impl EnrichmentTable {
    pub fn new(fields: Vec<EnrichmentField>) -> Self {
        Self { fields }
    }

    pub fn for_projects(cfg: &ProjectEnrichment) -> Self {
        Self::new(vec![
            EnrichmentField { lookup: Lookup::PriceTrends, enabled: cfg.price_trends },
            EnrichmentField { lookup: Lookup::Demographics, enabled: cfg.demographics },
            EnrichmentField { lookup: Lookup::ProjectInsight, enabled: cfg.project_insight },
            EnrichmentField { lookup: Lookup::ProjectTransactions, enabled: cfg.project_transactions },
        ])
    }

    pub fn for_units(cfg: &UnitEnrichment) -> Self {
        Self::new(vec![
            EnrichmentField { lookup: Lookup::UnitInsights, enabled: cfg.unit_insights },
            EnrichmentField { lookup: Lookup::UnitProjectTrends, enabled: cfg.unit_project_trends },
            EnrichmentField { lookup: Lookup::UnitTransactions, enabled: cfg.unit_transactions },
        ])
    }

    /// True when every lookup in the table is keyed by an ID of `kind`.
    pub fn keyed_by(&self, kind: EntityKind) -> bool {
        self.fields.iter().all(|f| f.lookup.entity_kind() == kind)
    }

    pub fn any_enabled(&self) -> bool {
        self.fields.iter().any(|f| f.enabled)
    }

    /// Every field set to its placeholder.
    pub fn placeholders(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|f| (f.lookup.field().to_string(), f.lookup.placeholder()))
            .collect()
    }

    /// Fills every field of the table into `target`.
    ///
    /// Stops at the first failed lookup; `target` may then hold a
    /// prefix of the fields, so callers retry from a fresh map.
    pub async fn fetch_into(
        &self,
        source: &dyn CatalogSource,
        id: &str,
        target: &mut Map<String, Value>,
    ) -> Result<(), FetchError> {
        for field in &self.fields {
            let value = if field.enabled {
                source.fetch_secondary(field.lookup, id).await?
            } else {
                field.lookup.placeholder()
            };
            target.insert(field.lookup.field().to_string(), value);
        }
        Ok(())
    }
}
