use std::sync::{Arc, Weak};

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::TokenManager;

/// Handle to the background task that renews the access token on a fixed
/// period.
///
/// The task stops on its own after the first failed refresh, and when the
/// owning [`TokenManager`] is dropped. Dropping the handle aborts it.
#[derive(Debug)]
pub struct ProactiveRefresh {
    handle: JoinHandle<()>,
}

impl ProactiveRefresh {
    pub(super) fn spawn(manager: &Arc<TokenManager>) -> Self {
        let period = manager.config.refresh_interval;
        let manager: Weak<TokenManager> = Arc::downgrade(manager);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                match manager.refresh_proactively().await {
                    Ok(true) => {}
                    Ok(false) => tracing::debug!("Refresh already in flight, skipping tick"),
                    Err(e) => {
                        tracing::warn!(error = %e, "Stopping proactive token refresh");
                        break;
                    }
                }
            }
        });

        Self { handle }
    }

    /// Returns `true` while the timer is still scheduled.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stops the timer. A refresh interrupted this way releases the
    /// coordination, so the next 401 starts a fresh one.
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for ProactiveRefresh {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
