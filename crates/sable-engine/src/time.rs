//! Time management: turning clock state into soft and hard limits.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use sable_core::Color;

use crate::search::control::SearchControl;

/// Derive (soft, hard) limits from the remaining clock and increment.
///
/// The soft limit is the per-move budget; the hard limit caps how far a
/// single move may overrun it. Increment games spend more freely because
/// time flows back.
pub fn compute_limits(
    remaining: Duration,
    increment: Duration,
    moves_to_go: Option<u32>,
) -> (Duration, Duration) {
    let remaining_ms = remaining.as_millis() as f64;

    if remaining_ms < 10.0 {
        let sliver = Duration::from_millis(1);
        return (sliver, sliver);
    }

    let overhead = 10.0;
    let usable = (remaining_ms - overhead).max(1.0);
    let inc_ms = increment.as_millis() as f64;
    let has_increment = inc_ms > 0.0;

    let mtg = moves_to_go
        .unwrap_or(if has_increment { 25 } else { 30 })
        .max(1) as f64;
    let base = usable / mtg;

    let soft = if has_increment { base + inc_ms * 0.75 } else { base };
    let hard_cap = if has_increment { 0.25 } else { 0.12 };
    let hard_ratio = if has_increment { 3.0 } else { 2.5 };
    let hard = (usable * hard_cap).min(soft * hard_ratio);

    let soft = soft.min(usable).max(1.0);
    let hard = hard.min(usable).max(soft);

    (
        Duration::from_millis(soft as u64),
        Duration::from_millis(hard as u64),
    )
}

/// Build a [`SearchControl`] from UCI `go` parameters.
#[allow(clippy::too_many_arguments)]
pub fn limits_from_go(
    wtime: Option<Duration>,
    btime: Option<Duration>,
    winc: Option<Duration>,
    binc: Option<Duration>,
    movestogo: Option<u32>,
    movetime: Option<Duration>,
    infinite: bool,
    ponder: bool,
    side: Color,
    stopped: Arc<AtomicBool>,
) -> SearchControl {
    let (remaining, increment) = match side {
        Color::White => (wtime, winc),
        Color::Black => (btime, binc),
    };

    if infinite && !ponder {
        return SearchControl::new_infinite(stopped);
    }

    if let Some(mt) = movetime {
        return if ponder {
            SearchControl::new_ponder(stopped, mt, mt)
        } else {
            SearchControl::new_timed(stopped, mt, mt)
        };
    }

    if let Some(rem) = remaining {
        let inc = increment.unwrap_or(Duration::ZERO);
        let (soft, hard) = compute_limits(rem, inc, movestogo);
        return if ponder {
            SearchControl::new_ponder(stopped, soft, hard)
        } else {
            SearchControl::new_timed(stopped, soft, hard)
        };
    }

    // Depth- or node-limited `go`, or a bare one: no clock at all.
    SearchControl::new_infinite(stopped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_games_spend_more() {
        let (with_inc, _) =
            compute_limits(Duration::from_secs(300), Duration::from_secs(2), None);
        let (without_inc, _) = compute_limits(Duration::from_secs(300), Duration::ZERO, None);
        assert!(with_inc > without_inc);
    }

    #[test]
    fn hard_limit_bounds_soft_limit() {
        let (soft, hard) = compute_limits(Duration::from_secs(300), Duration::from_secs(2), None);
        assert!(hard >= soft);
        // Hard never exceeds a quarter of the remaining clock.
        assert!(hard <= Duration::from_secs(75));
    }

    #[test]
    fn desperate_clock_gets_a_sliver() {
        let (soft, hard) = compute_limits(Duration::from_millis(5), Duration::ZERO, None);
        assert_eq!(soft, Duration::from_millis(1));
        assert_eq!(hard, Duration::from_millis(1));
    }

    #[test]
    fn movestogo_divides_the_clock() {
        let (soft, _) = compute_limits(Duration::from_secs(60), Duration::ZERO, Some(10));
        assert!(soft >= Duration::from_millis(4_000));
        assert!(soft <= Duration::from_millis(8_000));
    }

    #[test]
    fn go_infinite_never_times_out() {
        let stopped = Arc::new(AtomicBool::new(false));
        let control = limits_from_go(
            None, None, None, None, None, None, true, false, Color::White, stopped,
        );
        assert!(!control.should_stop(2048));
        assert!(!control.should_stop_iterating());
    }

    #[test]
    fn movetime_is_both_soft_and_hard() {
        let stopped = Arc::new(AtomicBool::new(false));
        let control = limits_from_go(
            None,
            None,
            None,
            None,
            None,
            Some(Duration::from_secs(5)),
            false,
            false,
            Color::White,
            stopped,
        );
        assert!(!control.should_stop_iterating());
    }

    #[test]
    fn side_to_move_picks_its_own_clock() {
        let stopped = Arc::new(AtomicBool::new(false));
        // Black is nearly out of time but it is White to move.
        let control = limits_from_go(
            Some(Duration::from_secs(300)),
            Some(Duration::from_millis(1)),
            None,
            None,
            None,
            None,
            false,
            false,
            Color::White,
            stopped,
        );
        assert!(!control.should_stop_iterating());
    }
}
