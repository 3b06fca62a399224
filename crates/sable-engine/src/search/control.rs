//! Search control: the stop flag, the clock, node caps and NPS throttling.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Decides when a search must abort and when iterating should wind down.
///
/// Shared by every worker. Two flags end a search: `stopped` (user stop,
/// hard timeout, node cap) and `finished` (the primary worker completed its
/// final iteration and is telling the helpers to come home). Keeping them
/// separate means a natural fixed-depth finish is not mistaken for an
/// external abort.
pub struct SearchControl {
    stopped: Arc<AtomicBool>,
    finished: AtomicBool,
    clock_active: AtomicBool,
    start: Mutex<Instant>,
    soft_limit: Option<Duration>,
    hard_limit: Option<Duration>,
    /// Soft-limit scale in hundredths; 50 after a ponder start so the engine
    /// answers quickly on `ponderhit`.
    ponder_scale: AtomicI32,
    node_limit: u64,
    nps_limit: u64,
}

impl SearchControl {
    fn base(stopped: Arc<AtomicBool>) -> SearchControl {
        SearchControl {
            stopped,
            finished: AtomicBool::new(false),
            clock_active: AtomicBool::new(false),
            start: Mutex::new(Instant::now()),
            soft_limit: None,
            hard_limit: None,
            ponder_scale: AtomicI32::new(100),
            node_limit: 0,
            nps_limit: 0,
        }
    }

    /// `go infinite`: only the external stop flag ends the search.
    pub fn new_infinite(stopped: Arc<AtomicBool>) -> SearchControl {
        SearchControl::base(stopped)
    }

    /// Timed search; the clock starts immediately.
    pub fn new_timed(stopped: Arc<AtomicBool>, soft: Duration, hard: Duration) -> SearchControl {
        let mut control = SearchControl::base(stopped);
        control.clock_active = AtomicBool::new(true);
        control.soft_limit = Some(soft);
        control.hard_limit = Some(hard);
        control
    }

    /// Ponder search: limits exist but the clock waits for
    /// [`activate`](SearchControl::activate) (sent on `ponderhit`).
    pub fn new_ponder(stopped: Arc<AtomicBool>, soft: Duration, hard: Duration) -> SearchControl {
        let mut control = SearchControl::new_timed(stopped, soft, hard);
        control.clock_active = AtomicBool::new(false);
        control.ponder_scale = AtomicI32::new(50);
        control
    }

    /// Abort once this many nodes have been searched (0 = unlimited).
    pub fn with_node_limit(mut self, nodes: u64) -> SearchControl {
        self.node_limit = nodes;
        self
    }

    /// Throttle the search to this many nodes per second (0 = unlimited).
    pub fn with_nps_limit(mut self, nps: u64) -> SearchControl {
        self.nps_limit = nps;
        self
    }

    /// Start the clock; called on `ponderhit`.
    pub fn activate(&self) {
        *self.start.lock().expect("clock mutex poisoned") = Instant::now();
        self.clock_active.store(true, Ordering::Release);
    }

    /// `true` once any stop condition has fired. Cheap; safe to call at
    /// every node.
    #[inline]
    pub fn aborted(&self) -> bool {
        self.stopped.load(Ordering::Relaxed) || self.finished.load(Ordering::Relaxed)
    }

    /// Abort check with clock polling.
    ///
    /// The hard clock is consulted only every 2048 locally counted nodes;
    /// when it expires the stop flag latches so every other worker sees it.
    pub fn should_stop(&self, local_nodes: u64) -> bool {
        if self.aborted() {
            return true;
        }
        if local_nodes & 2047 != 0 {
            return false;
        }
        if !self.clock_active.load(Ordering::Acquire) {
            return false;
        }
        if let Some(hard) = self.hard_limit
            && self.elapsed() >= hard
        {
            self.stopped.store(true, Ordering::Release);
            return true;
        }
        false
    }

    /// Node cap and NPS throttle, polled at every node.
    ///
    /// The throttle busy-sleeps in 10 ms steps while the measured rate is
    /// above the limit, converting to an abort if the hard clock runs out
    /// while sleeping. Depth 1 is never throttled so a move always exists.
    pub fn slowdown(&self, nodes: u64, root_depth: i32) {
        if self.node_limit > 0 && nodes >= self.node_limit {
            self.stopped.store(true, Ordering::Release);
            return;
        }

        if self.nps_limit == 0 || root_depth <= 1 {
            return;
        }
        loop {
            let elapsed_ms = self.elapsed().as_millis().max(1) as u64;
            let nps = nodes * 1000 / elapsed_ms;
            if nps <= self.nps_limit {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
            if let Some(hard) = self.hard_limit
                && self.clock_active.load(Ordering::Acquire)
                && self.elapsed() >= hard
            {
                self.stopped.store(true, Ordering::Release);
                return;
            }
            if self.aborted() {
                return;
            }
        }
    }

    /// Should iterative deepening start another iteration?
    ///
    /// `true` when the search is aborted or the (ponder-scaled) soft limit
    /// has been spent — a fresh iteration would likely be wasted.
    pub fn should_stop_iterating(&self) -> bool {
        if self.aborted() {
            return true;
        }
        if !self.clock_active.load(Ordering::Acquire) {
            return false;
        }
        if let Some(soft) = self.soft_limit {
            let scale = self.ponder_scale.load(Ordering::Relaxed);
            let mut effective =
                Duration::from_millis((soft.as_millis() as i64 * scale as i64 / 100) as u64);
            if let Some(hard) = self.hard_limit {
                effective = effective.min(hard);
            }
            return self.elapsed() >= effective;
        }
        false
    }

    /// Signal that the primary worker is done; helpers stop at their next
    /// poll. Distinct from the user-facing stop flag.
    pub fn finish(&self) {
        self.finished.store(true, Ordering::Release);
    }

    /// Wall time since the search (or, after `ponderhit`, the clock)
    /// started. Time-limit checks additionally require an active clock.
    pub fn elapsed(&self) -> Duration {
        self.start.lock().expect("clock mutex poisoned").elapsed()
    }

    /// The shared stop flag.
    pub fn stop_flag(&self) -> &Arc<AtomicBool> {
        &self.stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }

    #[test]
    fn infinite_never_stops_on_its_own() {
        let control = SearchControl::new_infinite(flag());
        assert!(!control.should_stop(2048));
        assert!(!control.should_stop_iterating());
        assert!(!control.aborted());
    }

    #[test]
    fn external_stop_flag_aborts() {
        let stopped = flag();
        let control = SearchControl::new_infinite(Arc::clone(&stopped));
        stopped.store(true, Ordering::Release);
        assert!(control.aborted());
        assert!(control.should_stop(1));
        assert!(control.should_stop_iterating());
    }

    #[test]
    fn finish_stops_helpers_without_touching_stop_flag() {
        let stopped = flag();
        let control = SearchControl::new_infinite(Arc::clone(&stopped));
        control.finish();
        assert!(control.aborted());
        assert!(!stopped.load(Ordering::Relaxed), "user stop flag stays clear");
    }

    #[test]
    fn hard_timeout_latches_the_stop_flag() {
        let stopped = flag();
        let control =
            SearchControl::new_timed(Arc::clone(&stopped), Duration::ZERO, Duration::ZERO);
        // Clock already expired; the 2048-node boundary triggers the check.
        assert!(control.should_stop(2048));
        assert!(stopped.load(Ordering::Relaxed));
    }

    #[test]
    fn clock_checks_are_rate_limited() {
        let control = SearchControl::new_timed(flag(), Duration::ZERO, Duration::ZERO);
        // Off-boundary node counts skip the clock entirely.
        assert!(!control.should_stop(2047));
    }

    #[test]
    fn node_cap_aborts() {
        let control = SearchControl::new_infinite(flag()).with_node_limit(1_000);
        control.slowdown(999, 5);
        assert!(!control.aborted());
        control.slowdown(1_000, 5);
        assert!(control.aborted());
    }

    #[test]
    fn ponder_clock_waits_for_activation() {
        let control = SearchControl::new_ponder(
            flag(),
            Duration::from_millis(1),
            Duration::from_millis(1),
        );
        std::thread::sleep(Duration::from_millis(3));
        // Limits are already exceeded, but the clock has not been activated.
        assert!(!control.should_stop(2048));
        assert!(!control.should_stop_iterating());

        control.activate();
        std::thread::sleep(Duration::from_millis(5));
        assert!(control.should_stop_iterating());
    }

    #[test]
    fn soft_limit_respects_ponder_scale() {
        // soft 10s scaled by 50% is still far away, so no stop.
        let control = SearchControl::new_ponder(
            flag(),
            Duration::from_secs(10),
            Duration::from_secs(30),
        );
        control.activate();
        assert!(!control.should_stop_iterating());
    }

    #[test]
    fn nps_throttle_sleeps_until_under_limit() {
        let control = SearchControl::new_infinite(flag()).with_nps_limit(1_000);
        let t0 = Instant::now();
        // 50 nodes against a 1000 nps budget: the throttle must sleep until
        // at least 50 ms have passed.
        control.slowdown(50, 5);
        assert!(t0.elapsed() >= Duration::from_millis(40));
    }
}
