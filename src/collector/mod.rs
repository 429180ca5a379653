/// Collector module
///
/// This module groups all logic responsible for:
/// - Fanning category IDs across a bounded worker pool
/// - Retrying each ID on failure or empty results
/// - Enriching projects and their child units
/// - Committing records to the per-category bucket exactly once
///
/// The collector layer sits between:
/// - The catalog source (network access, paced and gated)
/// - The orchestrator (category ordering, output)
///
/// Design notes:
/// - Endpoint-specific logic MUST NOT live here
/// - Failures are isolated per ID; a batch always completes
/// - Nested fan-out (child units) runs on its own pool run
pub mod batch;
pub mod enricher;
pub mod enrichment;
pub mod pool;
pub mod retry;

pub use batch::{BatchCollector, BatchSummary};
pub use enricher::Enricher;
pub use enrichment::EnrichmentTable;
pub use pool::WorkerPool;
