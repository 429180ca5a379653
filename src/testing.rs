//! In-memory doubles for the transport and the catalog source.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use reqwest::Url;
use serde_json::{Map, Value, json};
use tokio::time::{Instant, sleep};

use crate::error::FetchError;
use crate::http::transport::{RawResponse, Transport};
use crate::schema::{Category, EntityKind};
use crate::source::{CatalogSource, Lookup};

pub fn respond(status: u16, body: &str) -> Result<RawResponse, String> {
    Ok(RawResponse {
        status,
        body: body.to_string(),
    })
}

// ------------------------------------------------------------
// ScriptedTransport
// ------------------------------------------------------------
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<RawResponse, String>>>,
    latency: Duration,
    calls: Mutex<Vec<Instant>>,
    urls: Mutex<Vec<Url>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Result<RawResponse, String>>) -> Arc<Self> {
        Self::with_latency(responses, Duration::ZERO)
    }

    pub fn with_latency(responses: Vec<Result<RawResponse, String>>, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            latency,
            calls: Mutex::new(Vec::new()),
            urls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<Url> {
        self.urls.lock().unwrap().clone()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &Url) -> anyhow::Result<RawResponse> {
        self.calls.lock().unwrap().push(Instant::now());
        self.urls.lock().unwrap().push(url.clone());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("script exhausted".to_string()))
            .map_err(|e| anyhow!(e))
    }
}

// ------------------------------------------------------------
// ScriptedSource
// ------------------------------------------------------------
//
// Records are generated from the ID unless configured otherwise:
// - project "<id>" -> detail document with data.id = <id>
// - market unit "<id>" -> {"price": <id>}
//
#[derive(Default)]
pub struct ScriptedSource {
    ids: HashMap<Category, Vec<String>>,
    list_failures: HashSet<Category>,
    failing: HashSet<String>,
    empty: HashSet<String>,
    panicking: HashSet<String>,
    flaky: Mutex<HashMap<String, u32>>,
    children: HashMap<String, Vec<Value>>,
    failing_units: HashSet<String>,
    latency: HashMap<String, Duration>,

    record_calls: Mutex<HashMap<String, u32>>,
    secondary_calls: Mutex<Vec<(Lookup, String)>>,
    list_calls: Mutex<Vec<Category>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids(mut self, category: Category, ids: &[&str]) -> Self {
        self.ids
            .insert(category, ids.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn failing_listing(mut self, category: Category) -> Self {
        self.list_failures.insert(category);
        self
    }

    /// `fetch_record` always fails for `id`.
    pub fn failing(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    /// `fetch_record` always returns no data for `id`.
    pub fn empty(mut self, id: &str) -> Self {
        self.empty.insert(id.to_string());
        self
    }

    pub fn panicking(mut self, id: &str) -> Self {
        self.panicking.insert(id.to_string());
        self
    }

    /// `fetch_record` fails the first `failures` times for `id`.
    pub fn flaky(self, id: &str, failures: u32) -> Self {
        self.flaky.lock().unwrap().insert(id.to_string(), failures);
        self
    }

    pub fn with_children(mut self, project_id: &str, units: Vec<Value>) -> Self {
        self.children.insert(project_id.to_string(), units);
        self
    }

    /// Every unit-level lookup fails for this unit.
    pub fn failing_unit(mut self, unit_id: &str) -> Self {
        self.failing_units.insert(unit_id.to_string());
        self
    }

    /// Delays `fetch_record` for `id`.
    pub fn slow(mut self, id: &str, latency: Duration) -> Self {
        self.latency.insert(id.to_string(), latency);
        self
    }

    pub fn record_calls(&self, id: &str) -> u32 {
        self.record_calls
            .lock()
            .unwrap()
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    pub fn secondary_calls(&self) -> Vec<(Lookup, String)> {
        self.secondary_calls.lock().unwrap().clone()
    }

    pub fn unit_lookup_calls(&self) -> usize {
        self.secondary_calls()
            .iter()
            .filter(|(l, _)| l.entity_kind() == EntityKind::ChildUnit)
            .count()
    }

    pub fn list_calls(&self) -> Vec<Category> {
        self.list_calls.lock().unwrap().clone()
    }

    fn transient(id: &str) -> FetchError {
        FetchError::Status {
            status: 500,
            url: format!("scripted://{}", id),
        }
    }
}

#[async_trait::async_trait]
impl CatalogSource for ScriptedSource {
    async fn list_ids(&self, category: Category) -> Result<Vec<String>, FetchError> {
        self.list_calls.lock().unwrap().push(category);
        if self.list_failures.contains(&category) {
            return Err(Self::transient(category.key()));
        }
        Ok(self.ids.get(&category).cloned().unwrap_or_default())
    }

    async fn fetch_record(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<Value>, FetchError> {
        *self
            .record_calls
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default() += 1;

        if let Some(latency) = self.latency.get(id) {
            sleep(*latency).await;
        }
        if self.panicking.contains(id) {
            panic!("scripted panic for {}", id);
        }
        if self.failing.contains(id) {
            return Err(Self::transient(id));
        }
        {
            let mut flaky = self.flaky.lock().unwrap();
            if let Some(left) = flaky.get_mut(id) {
                if *left > 0 {
                    *left -= 1;
                    return Err(Self::transient(id));
                }
            }
        }
        if self.empty.contains(id) {
            return Ok(None);
        }

        Ok(Some(match kind {
            EntityKind::Project => json!({
                "data": {
                    "id": id,
                    "attributes": { "name": format!("Project {}", id), "status": "active" }
                },
                "included": []
            }),
            _ => json!({ "price": id }),
        }))
    }

    async fn fetch_secondary(&self, lookup: Lookup, id: &str) -> Result<Value, FetchError> {
        self.secondary_calls
            .lock()
            .unwrap()
            .push((lookup, id.to_string()));

        if lookup.entity_kind() == EntityKind::ChildUnit && self.failing_units.contains(id) {
            return Err(Self::transient(id));
        }

        Ok(match lookup {
            Lookup::AvailableUnits => {
                Value::Array(self.children.get(id).cloned().unwrap_or_default())
            }
            other => match other.placeholder() {
                Value::Array(_) => json!([{ "lookup": other.field(), "id": id }]),
                _ => json!({ "lookup": other.field(), "id": id }),
            },
        })
    }

    async fn fetch_overview(&self) -> Result<Map<String, Value>, FetchError> {
        let mut m = Map::new();
        m.insert("total_projects".into(), json!(3));
        Ok(m)
    }

    async fn fetch_mega_projects(&self) -> Result<Vec<Value>, FetchError> {
        Ok(vec![json!({"id": "m1"}), json!({"id": "m2"})])
    }
}
