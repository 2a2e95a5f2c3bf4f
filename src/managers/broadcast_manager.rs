// BroadcastChannelManager: tokio broadcast channel for cycle reports
// Single Responsibility: report channel lifecycle and subscription

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

use crate::controller::CycleReport;

/// Reports buffered per subscriber before it starts lagging
const REPORT_BUFFER: usize = 64;

/// Manages the cycle report broadcast channel
///
/// The poll controller publishes one [`CycleReport`] per cycle. Any number
/// of presentation-side subscribers (CLI printer, dashboard bridge) receive
/// independent copies.
///
/// # Notes
/// - Channel must be initialized via `init_reports()` before subscribing
/// - Publishing with no subscribers is not an error
/// - Old reports are dropped for subscribers that fall behind
#[derive(Clone)]
pub struct BroadcastChannelManager {
    reports: Arc<Mutex<Option<broadcast::Sender<CycleReport>>>>,
}

impl BroadcastChannelManager {
    /// Create a manager with the channel uninitialized
    pub fn new() -> Self {
        Self {
            reports: Arc::new(Mutex::new(None)),
        }
    }

    /// Lock the sender slot, recovering from poisoning
    fn lock_reports(&self) -> MutexGuard<'_, Option<broadcast::Sender<CycleReport>>> {
        self.reports.lock().unwrap_or_else(|poisoned| {
            log::warn!("[Broadcast] report channel lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Initialize the report channel
    ///
    /// Calling again replaces the channel; existing receivers see it close.
    ///
    /// # Returns
    /// `broadcast::Sender<CycleReport>` - Sender for publishing reports
    pub fn init_reports(&self) -> broadcast::Sender<CycleReport> {
        let (tx, _) = broadcast::channel(REPORT_BUFFER);
        *self.lock_reports() = Some(tx.clone());
        tx
    }

    /// Subscribe to cycle reports
    ///
    /// # Returns
    /// `Option<broadcast::Receiver<CycleReport>>` - Receiver, or None if
    /// `init_reports()` has not been called
    pub fn subscribe_reports(&self) -> Option<broadcast::Receiver<CycleReport>> {
        self.lock_reports().as_ref().map(|tx| tx.subscribe())
    }

    /// Send a report to current subscribers
    ///
    /// # Returns
    /// Number of subscribers that received it (0 when nobody listens)
    pub fn publish(&self, report: CycleReport) -> usize {
        match self.lock_reports().as_ref() {
            Some(tx) => tx.send(report).unwrap_or(0),
            None => 0,
        }
    }
}

impl Default for BroadcastChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{CycleOutcome, CycleState};

    fn report(cycle: u64) -> CycleReport {
        CycleReport {
            cycle,
            outcome: CycleOutcome::Aborted,
            reading: None,
            error: None,
            path: vec![CycleState::Idle, CycleState::Sampling, CycleState::Idle],
        }
    }

    #[test]
    fn test_report_channel_lifecycle() {
        let manager = BroadcastChannelManager::new();

        // Initially no subscription possible
        assert!(manager.subscribe_reports().is_none());

        let _tx = manager.init_reports();
        assert!(manager.subscribe_reports().is_some());
    }

    #[test]
    fn test_multiple_subscribers() {
        let manager = BroadcastChannelManager::new();
        manager.init_reports();

        let mut rx1 = manager.subscribe_reports().unwrap();
        let mut rx2 = manager.subscribe_reports().unwrap();

        assert_eq!(manager.publish(report(7)), 2);
        assert_eq!(rx1.try_recv().unwrap().cycle, 7);
        assert_eq!(rx2.try_recv().unwrap().cycle, 7);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let manager = BroadcastChannelManager::new();
        assert_eq!(manager.publish(report(1)), 0);

        manager.init_reports();
        assert_eq!(manager.publish(report(2)), 0);
    }

    #[test]
    fn test_clones_share_channel() {
        let manager = BroadcastChannelManager::default();
        let shared = manager.clone();
        manager.init_reports();

        let mut rx = shared.subscribe_reports().unwrap();
        manager.publish(report(3));
        assert_eq!(rx.try_recv().unwrap().cycle, 3);
    }
}
