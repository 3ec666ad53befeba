//! Time source and scheduler used by the runner and simulators.
//!
//! [`SystemClock`] waits on the tokio timer. [`VirtualClock`] completes every
//! sleep immediately and only advances its own notion of time, so a full run
//! finishes in milliseconds while timestamps still look realistic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;

/// Injectable clock and delay scheduler
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Suspend for `duration` of this clock's time
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Wall clock backed by `tokio::time`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        tokio::time::sleep(duration).boxed()
    }
}

/// Clock whose sleeps return immediately and advance virtual time
#[derive(Debug)]
pub struct VirtualClock {
    origin: DateTime<Utc>,
    elapsed_ns: AtomicU64,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            elapsed_ns: AtomicU64::new(0),
        }
    }

    /// Total virtual time slept so far
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_ns.load(Ordering::SeqCst))
    }

    /// Move virtual time forward without sleeping
    pub fn advance(&self, duration: Duration) {
        let step = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        // Err only when the closure returns None, which it never does
        let _ = self
            .elapsed_ns
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |ns| {
                Some(ns.saturating_add(step))
            });
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> DateTime<Utc> {
        let ns = i64::try_from(self.elapsed_ns.load(Ordering::SeqCst)).unwrap_or(i64::MAX);
        self.origin
            .checked_add_signed(chrono::Duration::nanoseconds(ns))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        self.advance(duration);
        // Yield so other tasks (stop requests, listeners) interleave as they
        // would around a real timer.
        tokio::task::yield_now().boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_virtual_clock_advances_on_sleep() {
        let clock = VirtualClock::new();
        let start = clock.now();

        clock.sleep(Duration::from_millis(1500)).await;
        clock.sleep(Duration::from_millis(500)).await;

        assert_eq!(clock.elapsed(), Duration::from_secs(2));
        assert_eq!((clock.now() - start).num_milliseconds(), 2000);
    }

    #[tokio::test]
    async fn test_system_clock_sleeps() {
        let clock = SystemClock;
        let before = std::time::Instant::now();
        clock.sleep(Duration::from_millis(5)).await;
        assert!(before.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_virtual_clock_manual_advance() {
        let clock = VirtualClock::starting_at(Utc::now());
        clock.advance(Duration::from_secs(3));
        assert_eq!(clock.elapsed(), Duration::from_secs(3));
    }

    #[test]
    fn test_virtual_clock_saturates() {
        let clock = VirtualClock::starting_at(Utc::now());
        clock.advance(Duration::MAX);
        clock.advance(Duration::from_secs(1));

        assert_eq!(clock.elapsed(), Duration::from_nanos(u64::MAX));
        assert!(clock.now() > Utc::now());
    }
}
