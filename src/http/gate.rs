use std::time::Duration;

use log::{debug, error, info};
use tokio::sync::watch;
use tokio::time::sleep;

use crate::metrics::{METRICS, RuntimeMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Open,
    Paused,
}

/// ============================================================
/// RateGate
/// ============================================================
///
/// Process-wide throttle shared by every worker.
///
/// When any worker receives a throttling status from the catalog
/// it calls `signal_throttled`. The first caller flips the gate
/// to `Paused` and sleeps for the configured pause; every other
/// worker blocks in `await_open` until the gate reopens, then
/// all of them resume together.
///
/// A burst of 403/429 responses collapses into ONE pause episode:
/// callers that find the gate already paused return immediately.
///
/// The state lives in a `watch` channel. The Open -> Paused
/// transition is a single `send_if_modified` (check and set under
/// the channel lock), and reopening broadcasts to all waiters.
pub struct RateGate {
    pause: Duration,
    state: watch::Sender<GateState>,
}

impl RateGate {
    pub fn new(pause_duration_minutes: u64) -> Self {
        let (state, _) = watch::channel(GateState::Open);
        Self {
            pause: Duration::from_secs(pause_duration_minutes.saturating_mul(60)),
            state,
        }
    }

    pub fn state(&self) -> GateState {
        *self.state.borrow()
    }

    /// Waits until the gate is open. Returns immediately if it is.
    pub async fn await_open(&self) {
        let mut rx = self.state.subscribe();
        // Only fails if the sender is dropped, which cannot happen while `self` is borrowed.
        let _ = rx.wait_for(|s| *s == GateState::Open).await;
    }

    /// Reports a throttling response.
    ///
    /// Returns `true` if this call started (and slept through) a
    /// pause episode, `false` if the gate was already paused.
    pub async fn signal_throttled(&self, status: u16, context: &str) -> bool {
        let started = self.state.send_if_modified(|s| {
            if *s == GateState::Open {
                *s = GateState::Paused;
                true
            } else {
                false
            }
        });

        if !started {
            debug!("[GATE] {} for {} while already paused", status, context);
            return false;
        }

        RuntimeMetrics::incr(&METRICS.pause_episodes);

        // Reopens on drop so an aborted sleeper cannot leave the gate paused.
        let _reopen = Reopen(&self.state);

        error!("Request failed with status {} for {}", status, context);
        error!(
            "[GATE] PAUSING ALL WORKERS for {} minutes",
            self.pause.as_secs() / 60
        );

        sleep(self.pause).await;

        info!(
            "[GATE] RESUMING ALL WORKERS after {} minute pause",
            self.pause.as_secs() / 60
        );
        true
    }
}

struct Reopen<'a>(&'a watch::Sender<GateState>);

impl Drop for Reopen<'_> {
    fn drop(&mut self) {
        self.0.send_replace(GateState::Open);
    }
}
