use serde_json::{Map, Value, json};

use crate::error::FetchError;
use crate::schema::{Category, EntityKind};

/// Secondary lookups attached to projects and child units.
///
/// Each lookup owns its output field name and the placeholder
/// written when the lookup is disabled or exhausted its retries.
/// The placeholder shape matches what the catalog returns
/// (`{}` for attribute documents, `[]` for series / lists).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lookup {
    // Project level
    PriceTrends,
    Demographics,
    ProjectInsight,
    ProjectTransactions,
    AvailableUnits,
    UnitModels,

    // Child unit level
    UnitInsights,
    UnitProjectTrends,
    UnitTransactions,
}

impl Lookup {
    pub fn field(self) -> &'static str {
        match self {
            Lookup::PriceTrends => "price_trends",
            Lookup::Demographics => "demographics",
            Lookup::ProjectInsight => "project_insight",
            Lookup::ProjectTransactions => "project_transactions",
            Lookup::AvailableUnits => "available_units",
            Lookup::UnitModels => "unit_models",
            Lookup::UnitInsights => "unit_insights",
            Lookup::UnitProjectTrends => "unit_project_trends",
            Lookup::UnitTransactions => "unit_transactions",
        }
    }

    pub fn placeholder(self) -> Value {
        match self {
            Lookup::Demographics | Lookup::ProjectInsight | Lookup::UnitInsights => {
                Value::Object(Map::new())
            }
            _ => json!([]),
        }
    }

    /// Entity kind the lookup is keyed by.
    pub fn entity_kind(self) -> EntityKind {
        match self {
            Lookup::UnitInsights | Lookup::UnitProjectTrends | Lookup::UnitTransactions => {
                EntityKind::ChildUnit
            }
            _ => EntityKind::Project,
        }
    }
}

/// CatalogSource is the boundary between the collection engine
/// and the remote catalog.
///
/// Implementations must:
/// - Route every network call through `FetchClient`
///   (rate gate, pacing, status interpretation)
/// - Return `Ok(None)` / empty values for "no data"
/// - Never return partially parsed documents
///
/// Implementations must NOT retry; retry policy belongs to the
/// collectors.
///
/// THREAD SAFETY:
/// - Must be Send + Sync
/// - One instance is shared by every worker of every pool
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    /// IDs of the entities in a batched category.
    ///
    /// Singleton categories return an empty list.
    async fn list_ids(&self, category: Category) -> Result<Vec<String>, FetchError>;

    /// Base record of one entity.
    ///
    /// - Project: the full detail document (`data` + `included`)
    /// - Market unit: the listing attributes
    async fn fetch_record(&self, kind: EntityKind, id: &str)
    -> Result<Option<Value>, FetchError>;

    /// One secondary lookup for `id`.
    ///
    /// Returns the lookup's placeholder when the catalog has no data.
    async fn fetch_secondary(&self, lookup: Lookup, id: &str) -> Result<Value, FetchError>;

    async fn fetch_overview(&self) -> Result<Map<String, Value>, FetchError>;

    async fn fetch_mega_projects(&self) -> Result<Vec<Value>, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_match_lookup_shapes() {
        assert_eq!(Lookup::UnitInsights.placeholder(), json!({}));
        assert_eq!(Lookup::UnitProjectTrends.placeholder(), json!([]));
        assert_eq!(Lookup::UnitTransactions.placeholder(), json!([]));
        assert_eq!(Lookup::Demographics.placeholder(), json!({}));
        assert_eq!(Lookup::PriceTrends.placeholder(), json!([]));
    }

    #[test]
    fn unit_lookups_are_keyed_by_child_units() {
        assert_eq!(Lookup::UnitInsights.entity_kind(), EntityKind::ChildUnit);
        assert_eq!(Lookup::AvailableUnits.entity_kind(), EntityKind::Project);
    }
}
