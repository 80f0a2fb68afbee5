use parking_lot::Mutex;
use tokio::sync::watch;

/// Broadcast slot shared between the caller performing a refresh and the
/// callers waiting on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RefreshSlot {
    /// No refresh has run yet.
    Idle,
    /// A refresh is in flight.
    Pending,
    /// The last refresh produced this access token.
    Ready(String),
    /// The last refresh failed. `purged` is set when the session was logged
    /// out as a consequence; otherwise waiters may recover on their own.
    Failed { reason: String, purged: bool },
}

impl RefreshSlot {
    pub(crate) fn is_settled(&self) -> bool {
        matches!(self, Self::Ready(_) | Self::Failed { .. })
    }
}

/// Held by the caller leading a refresh, from the moment it sets the
/// refreshing flag until it publishes the outcome.
///
/// If the leader's future is dropped before settling, the guard clears the
/// flag and publishes a non-purging failure so waiters wake up and the next
/// 401 can start a new refresh.
pub(crate) struct LeaderGuard<'a> {
    refreshing: &'a Mutex<bool>,
    slot: &'a watch::Sender<RefreshSlot>,
    settled: bool,
}

impl<'a> LeaderGuard<'a> {
    /// Must be created with `refreshing` already set.
    pub(crate) fn new(refreshing: &'a Mutex<bool>, slot: &'a watch::Sender<RefreshSlot>) -> Self {
        Self {
            refreshing,
            slot,
            settled: false,
        }
    }

    /// Publishes the outcome and clears the refreshing flag.
    pub(crate) fn settle(mut self, outcome: RefreshSlot) {
        self.release(outcome);
    }

    fn release(&mut self, outcome: RefreshSlot) {
        let mut refreshing = self.refreshing.lock();
        self.slot.send_replace(outcome);
        *refreshing = false;
        self.settled = true;
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!("Token refresh was cancelled before completing");
            self.release(RefreshSlot::Failed {
                reason: "token refresh was cancelled".to_string(),
                purged: false,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_publishes_and_clears_flag() {
        let refreshing = Mutex::new(true);
        let (slot, rx) = watch::channel(RefreshSlot::Pending);

        LeaderGuard::new(&refreshing, &slot).settle(RefreshSlot::Ready("tok".into()));

        assert!(!*refreshing.lock());
        assert_eq!(*rx.borrow(), RefreshSlot::Ready("tok".into()));
    }

    #[test]
    fn test_dropped_leader_releases_waiters() {
        let refreshing = Mutex::new(true);
        let (slot, rx) = watch::channel(RefreshSlot::Pending);

        drop(LeaderGuard::new(&refreshing, &slot));

        assert!(!*refreshing.lock());
        assert!(matches!(
            *rx.borrow(),
            RefreshSlot::Failed { purged: false, .. }
        ));
    }
}
