//! GeoJSON view of a collected dataset.
//!
//! One `FeatureCollection` per non-empty list category. The
//! overview has no geometry and is passed through as plain JSON.
//!
//! Coordinates may arrive as numbers or numeric strings. A
//! location that does not yield two finite coordinates produces a
//! feature with `"geometry": null`.

use serde_json::{Map, Value, json};

use crate::schema::{Category, Dataset};
use crate::source::Lookup;
use crate::util::{self, dig};

const UNIT_ENRICHMENT: [Lookup; 3] = [
    Lookup::UnitInsights,
    Lookup::UnitProjectTrends,
    Lookup::UnitTransactions,
];

/// Transforms every non-empty category, in category order.
pub fn transform_all(dataset: &Dataset) -> Vec<(Category, Value)> {
    let mut out = Vec::new();

    if !dataset.overview.is_empty() {
        out.push((Category::Overview, Value::Object(dataset.overview.clone())));
    }
    if !dataset.mega_projects.is_empty() {
        out.push((Category::MegaProjects, mega_projects(&dataset.mega_projects)));
    }

    for category in Category::BATCHED {
        let Some(records) = dataset.records(category).filter(|r| !r.is_empty()) else {
            continue;
        };
        let collection = match category {
            Category::ProjectsUnderConstruction | Category::ProjectsReadymade => projects(records),
            _ => market_units(records),
        };
        out.push((category, collection));
    }

    out
}

/// Polygon from `geo_shape` when present, otherwise a point.
pub fn mega_projects(records: &[Value]) -> Value {
    let features = records
        .iter()
        .map(|project| {
            let id = project.get("id").and_then(util::json_id).unwrap_or_default();
            let attributes = project
                .get("attributes")
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new()));

            let geometry = match attributes.get("geo_shape") {
                Some(Value::Array(shape)) if !shape.is_empty() => {
                    Some(json!({"type": "Polygon", "coordinates": shape}))
                }
                _ => point(attributes.get("location")),
            };

            feature(format!("mega_project_{}", id), geometry, attributes)
        })
        .collect();

    collection(features)
}

/// Project features first, then one feature per child unit.
pub fn projects(records: &[Value]) -> Value {
    let mut project_features = Vec::with_capacity(records.len());
    let mut unit_features = Vec::new();

    for project in records {
        let Some(fields) = project.as_object() else {
            continue;
        };
        let project_id = fields.get("project_id").and_then(util::json_id).unwrap_or_default();
        let location = fields.get("location");

        let properties: Map<String, Value> = fields
            .iter()
            .filter(|(k, _)| k.as_str() != Lookup::AvailableUnits.field())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        project_features.push(feature(
            format!("project_{}", project_id),
            point(location),
            Value::Object(properties),
        ));

        let units = fields
            .get(Lookup::AvailableUnits.field())
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for unit in units {
            unit_features.push(unit_feature(unit, &project_id, location));
        }
    }

    project_features.extend(unit_features);
    collection(project_features)
}

fn unit_feature(unit: &Value, project_id: &str, project_location: Option<&Value>) -> Value {
    let unit_id = unit.get("id").and_then(util::json_id).unwrap_or_default();
    let attributes = unit.get("attributes").and_then(Value::as_object);

    let geometry = point(dig(unit, &["attributes", "location"])).or_else(|| point(project_location));

    let mut properties = Map::new();
    properties.insert("project_id".into(), Value::String(format!("project_{}", project_id)));
    properties.insert("id".into(), Value::String(unit_id.clone()));
    if let Some(attributes) = attributes {
        properties.extend(attributes.clone());
    }
    for lookup in UNIT_ENRICHMENT {
        let value = unit.get(lookup.field()).cloned().unwrap_or_else(|| lookup.placeholder());
        properties.insert(lookup.field().into(), value);
    }

    feature(format!("unit_{}", unit_id), geometry, Value::Object(properties))
}

/// Point from `rega_ad_license.location`; every field is a property.
pub fn market_units(records: &[Value]) -> Value {
    let features = records
        .iter()
        .map(|unit| {
            let id = unit.get("unit_id").and_then(util::json_id).unwrap_or_default();
            let geometry = point(dig(unit, &["rega_ad_license", "location"]));
            feature(id, geometry, unit.clone())
        })
        .collect();

    collection(features)
}

fn point(location: Option<&Value>) -> Option<Value> {
    let location = location?;
    let latitude = location.get("latitude").and_then(coordinate)?;
    let longitude = location.get("longitude").and_then(coordinate)?;
    Some(json!({"type": "Point", "coordinates": [longitude, latitude]}))
}

fn coordinate(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

fn feature(id: String, geometry: Option<Value>, properties: Value) -> Value {
    json!({
        "type": "Feature",
        "id": id,
        "geometry": geometry.unwrap_or(Value::Null),
        "properties": properties,
    })
}

fn collection(features: Vec<Value>) -> Value {
    json!({"type": "FeatureCollection", "features": features})
}
