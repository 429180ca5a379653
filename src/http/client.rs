use std::sync::Arc;

use log::{debug, error, warn};
use reqwest::Url;
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tokio::time::sleep;

use crate::error::FetchError;
use crate::metrics::{METRICS, RuntimeMetrics};
use crate::util;

use super::gate::RateGate;
use super::transport::{RawResponse, Transport};

/// One GET request against the catalog.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: Url,

    /// Treat 404 as an empty, successful result
    pub allow_404: bool,
}

impl FetchRequest {
    /// Builds a request from a base URL and query parameters.
    pub fn get(url: &str, params: &[(&str, String)]) -> Result<Self, FetchError> {
        let url = Url::parse_with_params(url, params).map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: format!("invalid url: {}", e),
        })?;

        Ok(Self {
            url,
            allow_404: false,
        })
    }

    pub fn allow_404(mut self) -> Self {
        self.allow_404 = true;
        self
    }
}

/// ============================================================
/// FetchClient
/// ============================================================
///
/// Wraps a single network call with:
/// - the global `RateGate` (wait while paused, signal on 403/429)
/// - a process-wide in-flight limit
/// - a jittered pacing delay after EVERY call
/// - status / body interpretation into `FetchError`
///
/// CONTRACT:
/// - Single-shot: `execute` never retries.
/// - A throttling response returns only after the gate pause
///   (if this call started one) has elapsed.
///
/// The in-flight slot is taken BEFORE the gate is checked and is
/// held until the response has been interpreted, so a call that
/// queued for a slot still sees a pause started by the call it
/// queued behind. `execute` never nests, so holding the slot across
/// a gate wait cannot starve the fan-out levels above it.
#[derive(Clone)]
pub struct FetchClient {
    transport: Arc<dyn Transport>,
    gate: Arc<RateGate>,
    speed_factor: f64,
    in_flight: Arc<Semaphore>,
}

impl FetchClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        gate: Arc<RateGate>,
        speed_factor: f64,
        max_in_flight: usize,
    ) -> Self {
        Self {
            transport,
            gate,
            speed_factor,
            in_flight: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    pub fn gate(&self) -> &Arc<RateGate> {
        &self.gate
    }

    pub async fn execute(&self, request: &FetchRequest) -> Result<Value, FetchError> {
        // The semaphore is never closed; `ok()` only guards the type.
        let _permit = self.in_flight.acquire().await.ok();
        self.gate.await_open().await;

        debug!("GET {}", request.url);
        let result = self.transport.get(&request.url).await;
        RuntimeMetrics::incr(&METRICS.requests_sent);

        sleep(util::pacing_delay(self.speed_factor)).await;

        let response = result.map_err(|e| {
            RuntimeMetrics::incr(&METRICS.request_failures);
            error!("Request error for {}: {:#}", request.url, e);
            FetchError::Transport {
                url: request.url.to_string(),
                message: format!("{:#}", e),
            }
        })?;

        self.interpret(request, response).await
    }

    async fn interpret(
        &self,
        request: &FetchRequest,
        response: RawResponse,
    ) -> Result<Value, FetchError> {
        let url = request.url.as_str();

        match response.status {
            404 if request.allow_404 => Ok(Value::Object(Map::new())),

            403 | 429 => {
                RuntimeMetrics::incr(&METRICS.request_failures);
                RuntimeMetrics::incr(&METRICS.throttle_signals);
                self.gate.signal_throttled(response.status, url).await;
                Err(FetchError::Throttled {
                    status: response.status,
                    url: url.to_string(),
                })
            }

            200 => serde_json::from_str(&response.body).map_err(|e| {
                RuntimeMetrics::incr(&METRICS.request_failures);
                error!("JSON decode error for {}: {}", url, e);
                FetchError::Decode {
                    url: url.to_string(),
                    source: e,
                }
            }),

            status => {
                RuntimeMetrics::incr(&METRICS.request_failures);
                warn!("Request failed with status {} for {}", status, url);
                Err(FetchError::Status {
                    status,
                    url: url.to_string(),
                })
            }
        }
    }
}
