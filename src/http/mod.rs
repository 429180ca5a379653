/// HTTP layer
///
/// Everything between a catalog source and the network:
/// - `gate`:      global pause shared by all workers on 403 / 429
/// - `transport`: one raw GET (reqwest), no interpretation
/// - `client`:    gate + pacing + status interpretation
///
/// Retries do NOT live here. `FetchClient::execute` is single-shot;
/// the collectors loop.
pub mod client;
pub mod gate;
pub mod transport;

pub use client::{FetchClient, FetchRequest};
pub use gate::RateGate;
pub use transport::{ProxySettings, ReqwestTransport};
