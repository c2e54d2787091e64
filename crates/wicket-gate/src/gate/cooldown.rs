//! Client-side resend cooldown.
//!
//! A countdown from N seconds to zero driven by a one-second ticker task.
//! Wall-clock jitter is acceptable; this is a UI throttle, the authoritative
//! rate limit (if any) is enforced server-side. Nothing survives a reload:
//! a fresh timer is always ready.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;

use wicket_common::CooldownState;

#[derive(Default)]
struct Shared {
    remaining: AtomicU32,
    running: AtomicBool,
}

impl Shared {
    /// One countdown step. Returns false once stopped.
    fn tick(&self) -> bool {
        if !self.running.load(Ordering::Acquire) {
            return false;
        }
        let left = self
            .remaining
            .fetch_sub(1, Ordering::AcqRel)
            .saturating_sub(1);
        if left == 0 {
            self.running.store(false, Ordering::Release);
            return false;
        }
        true
    }

    fn arm(&self, secs: u32) {
        self.remaining.store(secs, Ordering::Release);
        self.running.store(secs > 0, Ordering::Release);
    }

    fn stop(&self) {
        self.remaining.store(0, Ordering::Release);
        self.running.store(false, Ordering::Release);
    }
}

/// Countdown owned by one trigger.
///
/// The ticker task is cancelled on `cancel` and on drop so no ticks leak
/// after the triggering UI element is removed.
pub struct CooldownTimer {
    shared: Arc<Shared>,
    ticker: Option<JoinHandle<()>>,
}

impl CooldownTimer {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            ticker: None,
        }
    }

    /// Begin a countdown, replacing any countdown already running.
    pub fn start(&mut self, secs: u32) {
        self.abort_ticker();
        self.shared.arm(secs);
        if secs == 0 {
            return;
        }

        let shared = self.shared.clone();
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                if !shared.tick() {
                    break;
                }
            }
        }));

        tracing::debug!(secs = secs, "cooldown started");
    }

    /// May the trigger fire?
    pub fn is_ready(&self) -> bool {
        !self.shared.running.load(Ordering::Acquire)
    }

    pub fn remaining_secs(&self) -> u32 {
        self.shared.remaining.load(Ordering::Acquire)
    }

    pub fn state(&self) -> CooldownState {
        CooldownState {
            remaining_secs: self.remaining_secs(),
            running: !self.is_ready(),
        }
    }

    /// Stop the countdown and re-enable the trigger.
    pub fn cancel(&mut self) {
        self.abort_ticker();
        self.shared.stop();
    }

    fn abort_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

impl Default for CooldownTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CooldownTimer {
    fn drop(&mut self) {
        self.abort_ticker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_countdown_reaches_ready_exactly_at_zero() {
        let shared = Shared::default();
        shared.arm(60);

        for _ in 0..59 {
            shared.tick();
        }
        assert!(shared.running.load(Ordering::Acquire));
        assert_eq!(shared.remaining.load(Ordering::Acquire), 1);

        shared.tick();
        assert!(!shared.running.load(Ordering::Acquire));
        assert_eq!(shared.remaining.load(Ordering::Acquire), 0);

        // Further ticks are inert
        assert!(!shared.tick());
    }

    #[test]
    fn test_zero_seconds_stays_ready() {
        let shared = Shared::default();
        shared.arm(0);
        assert!(!shared.running.load(Ordering::Acquire));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_drives_timer_to_ready() {
        let mut timer = CooldownTimer::new();
        timer.start(3);
        assert!(!timer.is_ready());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!timer.is_ready());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(timer.is_ready());
        assert_eq!(timer.remaining_secs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticking() {
        let mut timer = CooldownTimer::new();
        timer.start(60);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!timer.is_ready());

        timer.cancel();
        assert!(timer.is_ready());
        assert_eq!(timer.remaining_secs(), 0);

        // No leaked ticks flip it back
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(timer.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_countdown() {
        let mut timer = CooldownTimer::new();
        timer.start(10);
        tokio::time::sleep(Duration::from_secs(4)).await;

        timer.start(60);
        assert_eq!(timer.remaining_secs(), 60);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!timer.is_ready());
    }
}
