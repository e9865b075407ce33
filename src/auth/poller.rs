//! Periodic session re-validation.
//!
//! DESIGN
//! ======
//! A background task re-checks the session immediately and then once per
//! interval, so server-side expiry and sign-outs from other clients show up
//! without user action. Missed ticks are delayed rather than bursted.
//!
//! LIFECYCLE
//! =========
//! The task holds only a weak handle to the context and exits once the
//! context is gone. Dropping the poller aborts the task.

#[cfg(test)]
#[path = "poller_test.rs"]
mod poller_test;

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::context::AuthContext;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Handle to a running poll task. Polling stops when this is dropped.
pub struct SessionPoller {
    handle: JoinHandle<()>,
    interval: Duration,
}

impl SessionPoller {
    /// Spawn the poll task for `ctx`.
    #[must_use]
    pub fn spawn(ctx: &AuthContext, interval: Duration) -> Self {
        let interval = interval.max(MIN_POLL_INTERVAL);
        let weak = ctx.downgrade();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(ctx) = weak.upgrade() else {
                    debug!("auth context dropped; stopping session poller");
                    break;
                };
                let state = ctx.refresh_auth().await;
                debug!(authenticated = state.is_authenticated(), "session polled");
            }
        });

        info!(interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX), "session poller started");
        Self { handle, interval }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop polling. Equivalent to dropping the handle.
    pub fn stop(self) {}
}

impl Drop for SessionPoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
