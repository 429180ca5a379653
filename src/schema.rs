use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::{Map, Value};

// ------------------------------------------------------------
// Categories
// ------------------------------------------------------------
//
// Top-level output buckets. Two are singletons fetched in one
// request (overview, mega projects); the other five are ID
// batches fanned out by the BatchCollector.
//
// The key is the field name in the exported dataset and MUST
// stay stable: downstream consumers read these names.
//
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Overview,
    MegaProjects,
    ProjectsUnderConstruction,
    ProjectsReadymade,
    MarketUnitBuy,
    MarketLandsBuy,
    MarketUnitRent,
}

impl Category {
    /// Batched categories, in the order the orchestrator runs them.
    pub const BATCHED: [Category; 5] = [
        Category::ProjectsUnderConstruction,
        Category::ProjectsReadymade,
        Category::MarketUnitBuy,
        Category::MarketLandsBuy,
        Category::MarketUnitRent,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Category::Overview => "overview",
            Category::MegaProjects => "mega_projects",
            Category::ProjectsUnderConstruction => "projects_under_construction",
            Category::ProjectsReadymade => "projects_readymade",
            Category::MarketUnitBuy => "market_unit_buy",
            Category::MarketLandsBuy => "market_lands_buy",
            Category::MarketUnitRent => "market_unit_rent",
        }
    }

    /// Human-readable name used in progress logs.
    pub fn label(self) -> &'static str {
        match self {
            Category::Overview => "Overview",
            Category::MegaProjects => "Mega Projects",
            Category::ProjectsUnderConstruction => "Under Construction",
            Category::ProjectsReadymade => "Readymade",
            Category::MarketUnitBuy => "Buy",
            Category::MarketLandsBuy => "Lands",
            Category::MarketUnitRent => "Rent",
        }
    }

    /// Entity kind of the IDs listed for this category.
    ///
    /// `None` for singleton categories, which have no IDs.
    pub fn entity_kind(self) -> Option<EntityKind> {
        match self {
            Category::Overview | Category::MegaProjects => None,
            Category::ProjectsUnderConstruction | Category::ProjectsReadymade => {
                Some(EntityKind::Project)
            }
            Category::MarketUnitBuy | Category::MarketLandsBuy | Category::MarketUnitRent => {
                Some(EntityKind::MarketUnit)
            }
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ------------------------------------------------------------
// Entity kinds / work items
// ------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Project with child units
    Project,
    /// Standalone market listing (buy / lands / rent)
    MarketUnit,
    /// Unit belonging to a project
    ChildUnit,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Project => "project",
            EntityKind::MarketUnit => "market unit",
            EntityKind::ChildUnit => "unit",
        }
    }
}

/// One ID to collect. Immutable once built; retries reuse it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: String,
    pub kind: EntityKind,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.as_str(), self.id)
    }
}

// ------------------------------------------------------------
// Category bucket (DedupSet + output list)
// ------------------------------------------------------------
//
// One bucket per batched category per run. Both the set of
// committed IDs and the record list live behind ONE mutex so
// that "check, insert, append" is a single critical section.
//
// IMPORTANT:
// - The lock is a std mutex and must never be held across an
//   `.await`; callers lock only to commit a finished record.
// - Record order is completion order, not input order.
//
#[derive(Debug, Default)]
pub struct CategoryBucket {
    committed: HashSet<String>,
    records: Vec<Value>,
}

pub type SharedBucket = Arc<Mutex<CategoryBucket>>;

impl CategoryBucket {
    pub fn shared() -> SharedBucket {
        Arc::new(Mutex::new(Self::default()))
    }

    /// Appends `record` unless `id` was already committed.
    ///
    /// Returns `false` for a duplicate; the first committed
    /// record for an ID always wins.
    pub fn commit(&mut self, id: &str, record: Value) -> bool {
        if !self.committed.insert(id.to_string()) {
            return false;
        }
        self.records.push(record);
        true
    }

    #[cfg(test)]
    pub fn contains(&self, id: &str) -> bool {
        self.committed.contains(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Value] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Value> {
        self.records
    }
}

/// Locks a bucket, recovering the data if a worker panicked
/// while holding the lock. The bucket is only ever mutated by
/// `commit`, which cannot leave it half-written.
pub fn lock_bucket(bucket: &SharedBucket) -> MutexGuard<'_, CategoryBucket> {
    bucket.lock().unwrap_or_else(PoisonError::into_inner)
}

// ------------------------------------------------------------
// Dataset (output boundary)
// ------------------------------------------------------------
//
// Aggregate handed to the exporter. Field names match
// `Category::key` and define the exported JSON layout.
//
#[derive(Debug, Default, Serialize)]
pub struct Dataset {
    pub overview: Map<String, Value>,
    pub mega_projects: Vec<Value>,
    pub projects_under_construction: Vec<Value>,
    pub projects_readymade: Vec<Value>,
    pub market_unit_buy: Vec<Value>,
    pub market_lands_buy: Vec<Value>,
    pub market_unit_rent: Vec<Value>,
}

impl Dataset {
    /// Record list of a list-shaped category (`None` for overview).
    pub fn records(&self, category: Category) -> Option<&Vec<Value>> {
        match category {
            Category::Overview => None,
            Category::MegaProjects => Some(&self.mega_projects),
            Category::ProjectsUnderConstruction => Some(&self.projects_under_construction),
            Category::ProjectsReadymade => Some(&self.projects_readymade),
            Category::MarketUnitBuy => Some(&self.market_unit_buy),
            Category::MarketLandsBuy => Some(&self.market_lands_buy),
            Category::MarketUnitRent => Some(&self.market_unit_rent),
        }
    }

    pub fn records_mut(&mut self, category: Category) -> Option<&mut Vec<Value>> {
        match category {
            Category::Overview => None,
            Category::MegaProjects => Some(&mut self.mega_projects),
            Category::ProjectsUnderConstruction => Some(&mut self.projects_under_construction),
            Category::ProjectsReadymade => Some(&mut self.projects_readymade),
            Category::MarketUnitBuy => Some(&mut self.market_unit_buy),
            Category::MarketLandsBuy => Some(&mut self.market_lands_buy),
            Category::MarketUnitRent => Some(&mut self.market_unit_rent),
        }
    }

    /// Sum of `available_units` across all records of a project category.
    pub fn total_units(&self, category: Category) -> usize {
        self.records(category)
            .map(|records| {
                records
                    .iter()
                    .filter_map(|p| p.get("available_units").and_then(Value::as_array))
                    .map(Vec::len)
                    .sum()
            })
            .unwrap_or(0)
    }
}
