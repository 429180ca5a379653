use std::fmt::Display;
use std::future::Future;

use log::{error, warn};

use crate::error::FetchError;
use crate::metrics::{METRICS, RuntimeMetrics};

/// Runs `attempt` up to `max_retries` times.
///
/// - `Ok(Some(v))` ends the loop with `Some(v)`
/// - `Ok(None)` (no data) and `Err(_)` retry, unless this was
///   the last attempt
///
/// Returns `None` once every attempt is exhausted. Every retry and
/// the final failure are logged against `what`.
pub async fn with_retries<T, D, F, Fut>(max_retries: u32, what: &D, mut attempt: F) -> Option<T>
where
    D: Display + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, FetchError>>,
{
    for n in 1..=max_retries {
        let last = n == max_retries;

        match attempt().await {
            Ok(Some(value)) => return Some(value),

            Ok(None) if !last => {
                warn!("No data for {}, retrying (attempt {}/{})", what, n, max_retries);
            }
            Err(e) if !last && e.is_throttled() => {
                warn!(
                    "Throttled in {}, retrying after pause (attempt {}/{})",
                    what, n, max_retries
                );
            }
            Err(e) if !last => {
                warn!(
                    "Error in {}: {}, retrying (attempt {}/{})",
                    what, e, n, max_retries
                );
            }

            Ok(None) => {
                error!("No data for {} after {} attempts", what, max_retries);
            }
            Err(e) => {
                error!(
                    "Failed to collect {} after {} attempts: {}",
                    what, max_retries, e
                );
            }
        }

        if !last {
            RuntimeMetrics::incr(&METRICS.retries);
        }
    }

    None
}
