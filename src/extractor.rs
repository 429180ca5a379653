//! Project field extraction.
//!
//! Turns a project detail document (`data` + `included`) into the
//! flat project record of the output schema. Pure and stateless.
//!
//! Missing attributes are written as `""` so every record carries
//! the same keys.

use serde_json::{Map, Value};

use crate::util::{dig, dig_object};

/// Attributes copied verbatim from `data.attributes`.
const PROJECT_ATTRIBUTES: &[&str] = &[
    "publish_date",
    "region_obj",
    "city_obj",
    "phase",
    "status",
    "bookable",
    "location",
    "units_statistic_data",
    "subsidize_level",
    "price_starting_at",
    "realtime_available_units_count",
    "can_request_conveyance_on_project",
    "booking_fee",
    "booking_fee_setting_snapshot_values",
    "automatic_cancel_delay_in_days_value",
    "azm_item_status",
    "completion_percentage",
    "completion_percentage_updated_at",
    "units_available_soon",
    "extend_pq_fee",
    "extend_pq_day",
    "maximum_booking_per_non_beneficiary",
    "auto_cancellation",
    "booking_fee_payment_period",
    "unit_release_status",
    "mega_project_id",
    "nhc_related",
    "sale_contract_period_in_hours",
    "post_sale_contract_period_actions",
    "broker_allowed_channels",
    "allow_individual_brokers",
    "developer_name",
    "discount_enabled",
];

/// Attributes copied under a different output name.
const RENAMED_ATTRIBUTES: &[(&str, &str)] = &[("code", "project_code"), ("name", "project_name")];

pub fn extract_project(doc: &Value) -> Map<String, Value> {
    let data = doc.get("data").cloned().unwrap_or(Value::Null);
    let attributes = dig_object(&data, &["attributes"]);

    let mut out = Map::new();
    out.insert(
        "project_id".to_string(),
        data.get("id").cloned().unwrap_or_else(empty),
    );

    for (source, target) in RENAMED_ATTRIBUTES {
        out.insert(target.to_string(), attribute(&attributes, source));
    }
    for name in PROJECT_ATTRIBUTES {
        out.insert(name.to_string(), attribute(&attributes, name));
    }

    out.insert(
        "media".to_string(),
        Value::Object(extract_media(attributes.get("media").unwrap_or(&Value::Null))),
    );
    out.insert(
        "project_unit_types".to_string(),
        Value::Array(extract_unit_types(doc.get("included").unwrap_or(&Value::Null))),
    );

    out
}

/// Media URLs.
///
/// `geo_map` and `geo_map_polygons` are `null` when missing; every
/// other entry falls back to `""`.
pub fn extract_media(media: &Value) -> Map<String, Value> {
    let url = |key: &str| -> String {
        dig(media, &[key, "attributes", "url"])
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let optional_url = |key: &str| -> Value {
        let u = url(key);
        if u.is_empty() { Value::Null } else { Value::String(u) }
    };

    let gallery: Vec<Value> = media
        .get("gallery")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    Value::String(
                        dig(item, &["attributes", "url"])
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    let mut out = Map::new();
    out.insert("banner".into(), Value::String(url("banner")));
    out.insert("gallery".into(), Value::Array(gallery));
    out.insert("geo_map".into(), optional_url("geo_map"));
    out.insert("brochure".into(), Value::String(url("brochure")));
    out.insert("master_plan".into(), Value::String(url("master_plan")));
    out.insert("geo_map_polygons".into(), optional_url("geo_map_polygons"));
    out
}

/// Attributes of every `included` entry except the first, which
/// is the project's own relationship header.
pub fn extract_unit_types(included: &Value) -> Vec<Value> {
    included
        .as_array()
        .map(|items| {
            items
                .iter()
                .skip(1)
                .map(|item| item.get("attributes").cloned().unwrap_or_else(|| Value::Object(Map::new())))
                .collect()
        })
        .unwrap_or_default()
}

fn attribute(attributes: &Map<String, Value>, name: &str) -> Value {
    attributes.get(name).cloned().unwrap_or_else(empty)
}

fn empty() -> Value {
    Value::String(String::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_project_document() {
        let doc = json!({
            "data": {
                "id": "123",
                "attributes": {
                    "code": "P-1",
                    "name": "Palm Gardens",
                    "location": {"latitude": "24.7", "longitude": "46.6"},
                    "completion_percentage": 40,
                    "media": {
                        "banner": {"attributes": {"url": "https://cdn/banner.jpg"}},
                        "gallery": [
                            {"attributes": {"url": "https://cdn/1.jpg"}},
                            {"attributes": {}}
                        ]
                    }
                }
            },
            "included": [
                {"type": "developer", "attributes": {"name": "skip me"}},
                {"type": "project_unit_type", "attributes": {"rooms": 3}}
            ]
        });

        let p = extract_project(&doc);

        assert_eq!(p["project_id"], "123");
        assert_eq!(p["project_code"], "P-1");
        assert_eq!(p["project_name"], "Palm Gardens");
        assert_eq!(p["completion_percentage"], 40);
        assert_eq!(p["location"]["latitude"], "24.7");
        assert_eq!(p["developer_name"], "");
        assert_eq!(p["media"]["banner"], "https://cdn/banner.jpg");
        assert_eq!(p["media"]["gallery"], json!(["https://cdn/1.jpg", ""]));
        assert_eq!(p["media"]["geo_map"], Value::Null);
        assert_eq!(p["media"]["brochure"], "");
        assert_eq!(p["project_unit_types"], json!([{"rooms": 3}]));
    }

    #[test]
    fn every_key_present_for_empty_document() {
        let p = extract_project(&json!({}));

        assert_eq!(p["project_id"], "");
        assert_eq!(p.len(), 1 + RENAMED_ATTRIBUTES.len() + PROJECT_ATTRIBUTES.len() + 2);
        assert_eq!(p["project_unit_types"], json!([]));
    }
}
