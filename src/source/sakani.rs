use log::{debug, info};
use serde_json::{Map, Value};

use crate::error::FetchError;
use crate::http::{FetchClient, FetchRequest};
use crate::schema::{Category, EntityKind};
use crate::util::{self, dig, dig_array, dig_object, is_empty_json};

use super::catalog::{CatalogSource, Lookup};

const BASE_URL: &str = "https://sakani.sa";

const PROJECT_INCLUDES: &str = "amenities,projects_amenities,developer,project_unit_types";

// JSON paths of the payload inside each response document
const DATA: &[&str] = &["data"];
const ATTRIBUTES: &[&str] = &["data", "attributes"];
const PRICE_TRENDS: &[&str] = &["data", "attributes", "price_trends_data"];
const PROJECT_TRANSACTIONS: &[&str] = &["data", "attributes", "project_transactions_data"];
const UNIT_PROJECT_TRENDS: &[&str] = &["data", "attributes", "unit_project_trends_data"];
const UNIT_TRANSACTIONS: &[&str] = &["data", "attributes", "unit_transactions_data"];

/// Search parameters listing the IDs of one batched category.
#[derive(Debug, Clone, Copy)]
struct Listing {
    api_version: &'static str,
    purpose: &'static str,
    product_types: Option<&'static str>,
}

impl Listing {
    fn for_category(category: Category) -> Option<Self> {
        let (api_version, purpose, product_types) = match category {
            Category::ProjectsUnderConstruction => ("v3", "buy", Some("units_under_construction")),
            Category::ProjectsReadymade => ("v3", "buy", Some("readymade_units")),
            Category::MarketUnitBuy => ("v3", "buy", Some("readymade_units")),
            Category::MarketLandsBuy => ("v3", "buy", Some("lands")),
            Category::MarketUnitRent => ("v2", "rent", None),
            Category::Overview | Category::MegaProjects => return None,
        };
        Some(Self {
            api_version,
            purpose,
            product_types,
        })
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("filter[marketplace_purpose]", self.purpose.to_string()),
            ("filter[mode]", "maps".to_string()),
        ];
        if let Some(types) = self.product_types {
            params.push(("filter[product_types]", types.to_string()));
        }
        params
    }
}

/// A prepared secondary lookup: the request and where its payload lives.
struct Route {
    request: FetchRequest,
    path: &'static [&'static str],
}

/// ============================================================
/// SakaniCatalog
/// ============================================================
///
/// `CatalogSource` backed by the public Sakani marketplace and
/// analytics APIs.
///
/// Every call goes through the shared `FetchClient`, so pacing,
/// the in-flight limit and the throttle gate apply uniformly.
/// This type never retries.
///
/// NOTE:
/// - The catalog signals "no data" with `null`, `{}`, `[]` or a
///   missing path. All of them map to `None` for records and to
///   the lookup placeholder for secondary lookups.
/// - Child units have no detail endpoint; their base record is
///   the entry returned by the project's available units lookup.
pub struct SakaniCatalog {
    client: FetchClient,
    base_url: String,
    trend_months: u32,
}

impl SakaniCatalog {
    pub fn new(client: FetchClient, trend_months: u32) -> Self {
        Self::with_base_url(client, BASE_URL, trend_months)
    }

    pub fn with_base_url(client: FetchClient, base_url: impl Into<String>, trend_months: u32) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            trend_months,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn route(&self, lookup: Lookup, id: &str) -> Result<Route, FetchError> {
        let months = self.trend_months.to_string();
        let by_project = [("filter[project_id]", id.to_string())];
        let by_unit = [("filter[unit_id]", id.to_string())];

        let (request, path) = match lookup {
            Lookup::PriceTrends => (
                FetchRequest::get(
                    &self.url("analyticCollector/compare_insights/price_trends"),
                    &[by_project[0].clone(), ("filter[months_back_trend]", months)],
                )?,
                PRICE_TRENDS,
            ),
            Lookup::Demographics => (
                FetchRequest::get(
                    &self.url("analyticCollector/compare_insights/demographic_overview"),
                    &by_project,
                )?,
                ATTRIBUTES,
            ),
            Lookup::ProjectInsight => (
                FetchRequest::get(
                    &self.url(&format!("analyticCollector/embedded_insights/projects/{}", id)),
                    &[],
                )?,
                ATTRIBUTES,
            ),
            Lookup::ProjectTransactions => (
                FetchRequest::get(
                    &self.url("analyticCollector/compare_insights/project_transactions"),
                    &by_project,
                )?,
                PROJECT_TRANSACTIONS,
            ),
            Lookup::AvailableUnits => (
                FetchRequest::get(
                    &self.url(&format!("marketplaceApi/search/v1/projects/{}/available-units", id)),
                    &[],
                )?,
                DATA,
            ),
            Lookup::UnitModels => (
                FetchRequest::get(&self.url("mainIntermediaryApi/v4/unit_models"), &by_project)?,
                DATA,
            ),
            Lookup::UnitInsights => (
                FetchRequest::get(
                    &self.url(&format!("analyticCollector/embedded_insights/units/{}", id)),
                    &[],
                )?
                .allow_404(),
                ATTRIBUTES,
            ),
            Lookup::UnitProjectTrends => (
                FetchRequest::get(
                    &self.url("analyticCollector/compare_insights/unit_project_trends"),
                    &[by_unit[0].clone(), ("filter[months_back_trend]", months)],
                )?,
                UNIT_PROJECT_TRENDS,
            ),
            Lookup::UnitTransactions => (
                FetchRequest::get(
                    &self.url("analyticCollector/compare_insights/unit_transactions"),
                    &by_unit,
                )?,
                UNIT_TRANSACTIONS,
            ),
        };

        Ok(Route { request, path })
    }

    async fn fetch_project(&self, id: &str) -> Result<Option<Value>, FetchError> {
        let request = FetchRequest::get(
            &self.url(&format!("mainIntermediaryApi/v4/projects/{}", id)),
            &[("include", PROJECT_INCLUDES.to_string())],
        )?;
        let doc = self.client.execute(&request).await?;

        Ok(match doc.get("data") {
            Some(data) if !is_empty_json(data) => Some(doc),
            _ => None,
        })
    }

    async fn fetch_market_unit(&self, id: &str) -> Result<Option<Value>, FetchError> {
        let request = FetchRequest::get(
            &self.url(&format!("marketUnitsApi/v6/market_units/{}", id)),
            &[],
        )?;
        let doc = self.client.execute(&request).await?;

        let attributes = dig_object(&doc, ATTRIBUTES);
        Ok((!attributes.is_empty()).then(|| Value::Object(attributes)))
    }
}

/// Project ID of a search hit, if the hit is a project.
fn listed_project(hit: &Value) -> Option<String> {
    if dig(hit, &["attributes", "resource_type"]).and_then(Value::as_str) != Some("projects") {
        return None;
    }
    hit.get("id")
        .and_then(Value::as_str)
        .and_then(util::project_id_from_search)
}

/// Market unit ID of a search hit, if the hit is a market unit.
fn listed_market_unit(hit: &Value) -> Option<String> {
    hit.get("id")
        .and_then(Value::as_str)
        .and_then(util::market_unit_id_from_search)
}

#[async_trait::async_trait]
impl CatalogSource for SakaniCatalog {
    async fn list_ids(&self, category: Category) -> Result<Vec<String>, FetchError> {
        let (Some(listing), Some(kind)) = (Listing::for_category(category), category.entity_kind())
        else {
            return Ok(Vec::new());
        };

        let request = FetchRequest::get(
            &self.url(&format!("marketplaceApi/search/{}/location", listing.api_version)),
            &listing.params(),
        )?;
        let doc = self.client.execute(&request).await?;

        let hits = dig_array(&doc, DATA);
        let ids: Vec<String> = match kind {
            EntityKind::Project => hits.iter().filter_map(listed_project).collect(),
            _ => hits.iter().filter_map(listed_market_unit).collect(),
        };

        info!(
            "Found {} {} IDs for {} ({} search hits)",
            ids.len(),
            kind.as_str(),
            category.label(),
            hits.len()
        );
        Ok(ids)
    }

    async fn fetch_record(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<Value>, FetchError> {
        match kind {
            EntityKind::Project => self.fetch_project(id).await,
            EntityKind::MarketUnit => self.fetch_market_unit(id).await,
            EntityKind::ChildUnit => {
                debug!("No detail endpoint for child unit {}", id);
                Ok(None)
            }
        }
    }

    async fn fetch_secondary(&self, lookup: Lookup, id: &str) -> Result<Value, FetchError> {
        let route = self.route(lookup, id)?;
        let doc = self.client.execute(&route.request).await?;

        Ok(match dig(&doc, route.path) {
            Some(value) if !is_empty_json(value) => value.clone(),
            _ => lookup.placeholder(),
        })
    }

    async fn fetch_overview(&self) -> Result<Map<String, Value>, FetchError> {
        let request = FetchRequest::get(&self.url("analyticCollector/embedded_insights/overview"), &[])?;
        let doc = self.client.execute(&request).await?;
        Ok(dig_object(&doc, ATTRIBUTES))
    }

    async fn fetch_mega_projects(&self) -> Result<Vec<Value>, FetchError> {
        let request = FetchRequest::get(
            &self.url("marketplaceApi/search/v2/mega-projects"),
            &[("page[size]", "100".to_string()), ("page[number]", "1".to_string())],
        )?;
        let doc = self.client.execute(&request).await?;

        let mega = dig_array(&doc, DATA);
        info!("Found {} mega projects", mega.len());
        Ok(mega)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::RateGate;
    use crate::testing::{ScriptedTransport, respond};
    use serde_json::json;
    use std::sync::Arc;

    fn catalog(transport: &Arc<ScriptedTransport>) -> SakaniCatalog {
        let client = FetchClient::new(transport.clone(), Arc::new(RateGate::new(0)), 0.0, 2);
        SakaniCatalog::with_base_url(client, "https://catalog.test/", 6)
    }

    fn query(transport: &ScriptedTransport, n: usize) -> Vec<(String, String)> {
        transport.urls()[n].query_pairs().into_owned().collect()
    }

    #[tokio::test(start_paused = true)]
    async fn project_listing_keeps_only_project_hits() {
        let body = json!({
            "data": [
                {"id": "project_101", "attributes": {"resource_type": "projects"}},
                {"id": "market_unit_9", "attributes": {"resource_type": "market_units"}},
                {"id": "project_102", "attributes": {"resource_type": "projects"}},
                {"id": "project_", "attributes": {"resource_type": "projects"}}
            ]
        });
        let transport = ScriptedTransport::new(vec![respond(200, &body.to_string())]);
        let c = catalog(&transport);

        let ids = c.list_ids(Category::ProjectsReadymade).await.unwrap();

        assert_eq!(ids, vec!["101", "102"]);
        assert_eq!(transport.urls()[0].path(), "/marketplaceApi/search/v3/location");
        assert_eq!(
            query(&transport, 0),
            vec![
                ("filter[marketplace_purpose]".to_string(), "buy".to_string()),
                ("filter[mode]".to_string(), "maps".to_string()),
                ("filter[product_types]".to_string(), "readymade_units".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rent_listing_uses_v2_without_product_types() {
        let body = json!({
            "data": [
                {"id": "market_unit_77"},
                {"id": "project_5"},
                {"id": "market_unit_78"}
            ]
        });
        let transport = ScriptedTransport::new(vec![respond(200, &body.to_string())]);
        let c = catalog(&transport);

        let ids = c.list_ids(Category::MarketUnitRent).await.unwrap();

        assert_eq!(ids, vec!["77", "78"]);
        assert_eq!(transport.urls()[0].path(), "/marketplaceApi/search/v2/location");
        assert!(
            query(&transport, 0)
                .iter()
                .all(|(k, _)| k != "filter[product_types]")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn singleton_categories_list_nothing() {
        let transport = ScriptedTransport::new(vec![]);
        let c = catalog(&transport);

        assert!(c.list_ids(Category::Overview).await.unwrap().is_empty());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn listing_failure_is_returned() {
        let transport = ScriptedTransport::new(vec![respond(503, "")]);
        let c = catalog(&transport);

        let err = c.list_ids(Category::MarketLandsBuy).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 503, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn project_record_is_the_full_document() {
        let doc = json!({"data": {"id": "5", "attributes": {"name": "A"}}, "included": [{}]});
        let transport = ScriptedTransport::new(vec![
            respond(200, &doc.to_string()),
            respond(200, r#"{"data": null}"#),
        ]);
        let c = catalog(&transport);

        let record = c.fetch_record(EntityKind::Project, "5").await.unwrap();
        assert_eq!(record, Some(doc));
        assert_eq!(transport.urls()[0].path(), "/mainIntermediaryApi/v4/projects/5");
        assert_eq!(
            query(&transport, 0),
            vec![("include".to_string(), PROJECT_INCLUDES.to_string())]
        );

        let missing = c.fetch_record(EntityKind::Project, "6").await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test(start_paused = true)]
    async fn market_unit_record_is_its_attributes() {
        let transport = ScriptedTransport::new(vec![
            respond(200, r#"{"data": {"attributes": {"price": 900000}}}"#),
            respond(200, r#"{"data": {"attributes": {}}}"#),
        ]);
        let c = catalog(&transport);

        let record = c.fetch_record(EntityKind::MarketUnit, "9").await.unwrap();
        assert_eq!(record, Some(json!({"price": 900000})));
        assert_eq!(transport.urls()[0].path(), "/marketUnitsApi/v6/market_units/9");

        assert_eq!(c.fetch_record(EntityKind::MarketUnit, "10").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn trend_lookups_carry_the_month_window() {
        let body = json!({"data": {"attributes": {"price_trends_data": [{"month": "2024-01"}]}}});
        let transport = ScriptedTransport::new(vec![
            respond(200, &body.to_string()),
            respond(200, r#"{"data": {"attributes": {}}}"#),
        ]);
        let c = catalog(&transport);

        let trends = c.fetch_secondary(Lookup::PriceTrends, "5").await.unwrap();
        assert_eq!(trends, json!([{"month": "2024-01"}]));
        assert_eq!(
            query(&transport, 0),
            vec![
                ("filter[project_id]".to_string(), "5".to_string()),
                ("filter[months_back_trend]".to_string(), "6".to_string()),
            ]
        );

        let empty = c.fetch_secondary(Lookup::UnitProjectTrends, "u1").await.unwrap();
        assert_eq!(empty, json!([]));
        assert_eq!(
            query(&transport, 1),
            vec![
                ("filter[unit_id]".to_string(), "u1".to_string()),
                ("filter[months_back_trend]".to_string(), "6".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn missing_unit_insights_give_the_placeholder() {
        let transport = ScriptedTransport::new(vec![respond(404, "not found")]);
        let c = catalog(&transport);

        let insights = c.fetch_secondary(Lookup::UnitInsights, "u7").await.unwrap();

        assert_eq!(insights, json!({}));
        assert_eq!(
            transport.urls()[0].path(),
            "/analyticCollector/embedded_insights/units/u7"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn project_level_404_is_an_error() {
        let transport = ScriptedTransport::new(vec![respond(404, "")]);
        let c = catalog(&transport);

        let err = c.fetch_secondary(Lookup::Demographics, "5").await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn child_units_come_from_the_data_array() {
        let transport = ScriptedTransport::new(vec![
            respond(200, r#"{"data": [{"id": "u1"}, {"id": "u2"}]}"#),
            respond(200, r#"{"data": [{"id": "model-1"}]}"#),
        ]);
        let c = catalog(&transport);

        let units = c.fetch_secondary(Lookup::AvailableUnits, "5").await.unwrap();
        let models = c.fetch_secondary(Lookup::UnitModels, "5").await.unwrap();

        assert_eq!(units, json!([{"id": "u1"}, {"id": "u2"}]));
        assert_eq!(models, json!([{"id": "model-1"}]));
        assert_eq!(
            transport.urls()[0].path(),
            "/marketplaceApi/search/v1/projects/5/available-units"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn overview_and_mega_projects() {
        let transport = ScriptedTransport::new(vec![
            respond(200, r#"{"data": {"attributes": {"total_projects": 812}}}"#),
            respond(200, r#"{"data": [{"id": "1"}, {"id": "2"}]}"#),
        ]);
        let c = catalog(&transport);

        let overview = c.fetch_overview().await.unwrap();
        let mega = c.fetch_mega_projects().await.unwrap();

        assert_eq!(overview["total_projects"], 812);
        assert_eq!(mega.len(), 2);
        assert_eq!(
            query(&transport, 1),
            vec![
                ("page[size]".to_string(), "100".to_string()),
                ("page[number]".to_string(), "1".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn child_units_have_no_detail_request() {
        let transport = ScriptedTransport::new(vec![]);
        let c = catalog(&transport);

        assert_eq!(c.fetch_record(EntityKind::ChildUnit, "u1").await.unwrap(), None);
        assert_eq!(transport.calls(), 0);
    }
}
