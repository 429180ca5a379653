use serde::Deserialize;

use crate::schema::Category;

/// Upper bound for the per-request pacing delay.
const MAX_SPEED_FACTOR_SECS: f64 = 60.0;

/// Upper bound for the global throttle pause (one day).
const MAX_PAUSE_MINUTES: u64 = 24 * 60;

// ------------------------------------------------------------
// Root configuration
// ------------------------------------------------------------
//
// This is the top-level configuration structure loaded from
// `config.json`.
//
// It defines:
// - Which categories are collected
// - Worker pool / concurrency settings
// - Rate limiting and retry policy
// - Which secondary lookups enrich projects and units
// - Output locations
// - Optional debug configuration
//
// Every section has defaults, so a partial file is valid.
//
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// Category toggles
    pub categories: CategoryToggles,

    /// Limits every category to its first item
    pub test_run: bool,

    /// Worker pool configuration
    pub concurrency: ConcurrencyConfig,

    /// Throttling, pacing and retry policy
    pub rate_limit: RateLimitConfig,

    /// Secondary lookups attached to each project
    pub project_enrichment: ProjectEnrichment,

    /// Secondary lookups attached to each child unit
    pub unit_enrichment: UnitEnrichment,

    /// Months of history requested by both trend lookups
    pub trend_months: Option<u32>,

    /// Output files
    pub output: OutputConfig,

    /// Optional debug configuration
    pub debug: Option<DebugConfig>,
}

impl Config {
    /// Rejects values the collection engine cannot run with.
    ///
    /// Called once at startup. A failure here is fatal.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.concurrency.max_workers == 0 {
            anyhow::bail!("concurrency.max_workers must be at least 1");
        }
        if self.rate_limit.max_retries == 0 {
            anyhow::bail!("rate_limit.max_retries must be at least 1");
        }
        let speed = self.rate_limit.speed_factor;
        if !(0.0..=MAX_SPEED_FACTOR_SECS).contains(&speed) {
            anyhow::bail!(
                "rate_limit.speed_factor must be between 0 and {} seconds",
                MAX_SPEED_FACTOR_SECS
            );
        }
        if self.rate_limit.pause_duration_minutes > MAX_PAUSE_MINUTES {
            anyhow::bail!(
                "rate_limit.pause_duration_minutes must be at most {}",
                MAX_PAUSE_MINUTES
            );
        }
        if self.trend_months == Some(0) {
            anyhow::bail!("trend_months must be at least 1");
        }
        Ok(())
    }

    pub fn trend_months(&self) -> u32 {
        self.trend_months.unwrap_or(12)
    }

    pub fn debug_log(&self) -> bool {
        self.debug
            .as_ref()
            .map_or(false, |d| d.log.unwrap_or(false))
    }
}

// ------------------------------------------------------------
// Category toggles
// ------------------------------------------------------------
//
// One flag per output category. Disabled categories are
// skipped by the orchestrator and stay empty in the output.
//
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CategoryToggles {
    pub overview: bool,
    pub mega_projects: bool,
    pub projects_under_construction: bool,
    pub projects_readymade: bool,
    pub market_unit_buy: bool,
    pub market_lands_buy: bool,
    pub market_unit_rent: bool,
}

impl Default for CategoryToggles {
    fn default() -> Self {
        Self {
            overview: true,
            mega_projects: true,
            projects_under_construction: true,
            projects_readymade: true,
            market_unit_buy: true,
            market_lands_buy: true,
            market_unit_rent: true,
        }
    }
}

impl CategoryToggles {
    pub fn is_enabled(&self, category: Category) -> bool {
        match category {
            Category::Overview => self.overview,
            Category::MegaProjects => self.mega_projects,
            Category::ProjectsUnderConstruction => self.projects_under_construction,
            Category::ProjectsReadymade => self.projects_readymade,
            Category::MarketUnitBuy => self.market_unit_buy,
            Category::MarketLandsBuy => self.market_lands_buy,
            Category::MarketUnitRent => self.market_unit_rent,
        }
    }
}

// ------------------------------------------------------------
// Concurrency configuration
// ------------------------------------------------------------
//
// `max_workers` sizes BOTH fan-out levels (projects and their
// child units) and also caps the number of requests in flight
// across the whole process.
//
// With `enabled = false` every batch runs sequentially on the
// calling task.
//
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ConcurrencyConfig {
    pub enabled: bool,
    pub max_workers: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_workers: 2,
        }
    }
}

// ------------------------------------------------------------
// Rate limit configuration
// ------------------------------------------------------------
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Global pause applied to all workers on 403 / 429
    pub pause_duration_minutes: u64,

    /// Base pacing delay (seconds) after every request.
    /// The actual delay is jittered by +/- 0.02s.
    pub speed_factor: f64,

    /// Attempts per ID / per child unit
    pub max_retries: u32,

    /// Per-request timeout inside the HTTP transport
    pub request_timeout_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            pause_duration_minutes: 2,
            speed_factor: 0.05,
            max_retries: 5,
            request_timeout_secs: 30,
        }
    }
}

// ------------------------------------------------------------
// Enrichment toggles
// ------------------------------------------------------------
//
// A disabled lookup is never requested; its output field is
// filled with an empty placeholder instead.
//
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProjectEnrichment {
    pub price_trends: bool,
    pub demographics: bool,
    pub project_insight: bool,
    pub project_transactions: bool,
}

impl Default for ProjectEnrichment {
    fn default() -> Self {
        Self {
            price_trends: true,
            demographics: true,
            project_insight: true,
            project_transactions: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UnitEnrichment {
    pub unit_insights: bool,
    pub unit_project_trends: bool,
    pub unit_transactions: bool,
}

impl Default for UnitEnrichment {
    fn default() -> Self {
        Self {
            unit_insights: true,
            unit_project_trends: true,
            unit_transactions: true,
        }
    }
}

impl UnitEnrichment {
    pub fn none() -> Self {
        Self {
            unit_insights: false,
            unit_project_trends: false,
            unit_transactions: false,
        }
    }
}

// ------------------------------------------------------------
// Output configuration
// ------------------------------------------------------------
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    /// Raw dataset file (JSON keyed by category)
    pub path: String,

    /// When set, one GeoJSON file per category is written here
    pub geojson_dir: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: "sakani_data.json".to_string(),
            geojson_dir: None,
        }
    }
}

// ------------------------------------------------------------
// Debug configuration
// ------------------------------------------------------------
//
// Optional debug flags used during development and testing.
//
#[derive(Debug, Deserialize, Clone)]
pub struct DebugConfig {
    /// Raises the default log filter from `info` to `debug`
    pub log: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg: Config = serde_json::from_str("{}").unwrap();

        assert!(cfg.categories.projects_readymade);
        assert!(cfg.concurrency.enabled);
        assert_eq!(cfg.concurrency.max_workers, 2);
        assert_eq!(cfg.rate_limit.max_retries, 5);
        assert_eq!(cfg.rate_limit.pause_duration_minutes, 2);
        assert_eq!(cfg.trend_months(), 12);
        assert_eq!(cfg.output.path, "sakani_data.json");
        assert!(!cfg.debug_log());
        cfg.validate().unwrap();
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let cfg: Config = serde_json::from_str(
            r#"{
                "categories": { "market_unit_rent": false },
                "unit_enrichment": { "unit_transactions": false },
                "debug": { "log": true }
            }"#,
        )
        .unwrap();

        assert!(!cfg.categories.is_enabled(Category::MarketUnitRent));
        assert!(cfg.categories.is_enabled(Category::MarketUnitBuy));
        assert!(cfg.unit_enrichment.unit_insights);
        assert!(!cfg.unit_enrichment.unit_transactions);
        assert!(cfg.debug_log());
    }

    #[test]
    fn validate_rejects_unusable_values() {
        let mut cfg = Config::default();
        cfg.concurrency.max_workers = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.rate_limit.max_retries = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.rate_limit.speed_factor = -1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_bounds_pacing_and_pause() {
        for speed in [f64::NAN, f64::INFINITY, 1e300, 60.5] {
            let mut cfg = Config::default();
            cfg.rate_limit.speed_factor = speed;
            assert!(cfg.validate().is_err(), "{speed}");
        }

        let mut cfg = Config::default();
        cfg.rate_limit.speed_factor = 60.0;
        cfg.validate().unwrap();

        let mut cfg = Config::default();
        cfg.rate_limit.pause_duration_minutes = u64::MAX;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.rate_limit.pause_duration_minutes = 24 * 60;
        cfg.validate().unwrap();
    }

    #[test]
    fn example_config_is_valid() {
        let cfg: Config = serde_json::from_str(include_str!("../config.example.json")).unwrap();

        cfg.validate().unwrap();
        assert_eq!(cfg.output.geojson_dir.as_deref(), Some("geojson"));
        assert_eq!(cfg.trend_months(), 12);
    }
}
