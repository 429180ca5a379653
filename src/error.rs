use thiserror::Error;

/// Failure of a single catalog request.
///
/// Every variant is retryable from the caller's point of view.
/// `FetchClient` is single-shot; the per-ID and per-unit loops in
/// the collector decide whether another attempt is made.
///
/// `Throttled` is special only in that the `RateGate` has already
/// been signalled by the time the error is returned.
#[derive(Debug, Error)]
pub enum FetchError {
    /// 403 / 429 from the catalog
    #[error("throttled with status {status} for {url}")]
    Throttled { status: u16, url: String },

    /// Any other non-200 status
    #[error("request failed with status {status} for {url}")]
    Status { status: u16, url: String },

    /// Body was not valid JSON
    #[error("JSON decode error for {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Connection, timeout, proxy or TLS failure inside the transport
    #[error("request error for {url}: {message}")]
    Transport { url: String, message: String },
}

impl FetchError {
    pub fn is_throttled(&self) -> bool {
        matches!(self, FetchError::Throttled { .. })
    }
}
