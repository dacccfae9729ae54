//! Periodic flow statistics polling.
//!
//! Each tick asks every known switch for its flow table. Replies are
//! handled separately by [`FlowManager::on_statistics_reply`], so a tick
//! never waits on a switch.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::controller::Controller;
use crate::flow_mgr::FlowManager;

/// Default polling period (30 seconds)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Shortest period the poller will run at.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Switches a statistics request was sent to
    pub requested: usize,
    /// Switches that could not be resolved
    pub failed: usize,
}

/// Drives [`FlowManager::request_dump`] for every switch on a fixed period.
pub struct Poller<C> {
    manager: Arc<FlowManager<C>>,
    interval: Duration,
}

impl<C: Controller + 'static> Poller<C> {
    pub fn new(manager: Arc<FlowManager<C>>, interval: Duration) -> Self {
        Self {
            manager,
            interval: interval.max(MIN_POLL_INTERVAL),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs one poll cycle.
    pub fn tick(&self) -> PollSummary {
        let mut summary = PollSummary::default();

        for (dpid, result) in self.manager.dump_all() {
            match result {
                Ok(()) => summary.requested += 1,
                Err(e) => {
                    // The switch left between enumeration and lookup.
                    warn!(dpid = %dpid, error = %e, "Poll request failed");
                    summary.failed += 1;
                }
            }
        }

        debug!(
            requested = summary.requested,
            failed = summary.failed,
            "Poll cycle complete"
        );
        summary
    }

    /// Runs poll cycles until `shutdown` turns true or its sender is dropped.
    ///
    /// The first cycle runs immediately. A late tick delays the following
    /// ones instead of bursting to catch up.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = self.interval.as_secs_f64(), "Flow poller started");

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.tick();
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Flow poller stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::LocalController;
    use openflow_types::{event_names, Dpid, OutboundEvent};
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    fn setup(
        switches: u64,
    ) -> (
        Arc<FlowManager<LocalController>>,
        mpsc::UnboundedReceiver<OutboundEvent>,
    ) {
        let (ctl, out) = LocalController::new();
        for n in 1..=switches {
            ctl.connect(Dpid::new(n));
        }
        (Arc::new(FlowManager::new(ctl)), out)
    }

    fn count(out: &mut mpsc::UnboundedReceiver<OutboundEvent>) -> usize {
        let mut n = 0;
        while let Ok(event) = out.try_recv() {
            assert_eq!(event.name, event_names::OUT_STATS_REQUEST);
            n += 1;
        }
        n
    }

    #[test]
    fn test_tick_polls_each_switch_once() {
        let (mgr, mut out) = setup(3);
        let poller = Poller::new(mgr, DEFAULT_POLL_INTERVAL);

        let summary = poller.tick();
        assert_eq!(summary, PollSummary { requested: 3, failed: 0 });
        assert_eq!(count(&mut out), 3);
    }

    #[test]
    fn test_tick_without_switches() {
        let (mgr, mut out) = setup(0);
        let summary = Poller::new(mgr, DEFAULT_POLL_INTERVAL).tick();
        assert_eq!(summary, PollSummary::default());
        assert_eq!(count(&mut out), 0);
    }

    #[test]
    fn test_interval_floor() {
        let (mgr, _out) = setup(0);
        let poller = Poller::new(mgr, Duration::ZERO);
        assert_eq!(poller.interval(), MIN_POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_polls_on_period_and_stops() {
        let (mgr, mut out) = setup(2);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = Poller::new(mgr, Duration::from_secs(30)).spawn(shutdown_rx);

        // First tick fires immediately.
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(count(&mut out), 2);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(count(&mut out), 2);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count(&mut out), 0);
    }
}
