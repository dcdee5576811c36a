//! Heartbeat Monitor - Tracks host liveness and drives the fail-safe brake
//!
//! **Arming**:
//! - The monitor starts disarmed; a host that never connects never trips it
//! - The first accepted `HB` arms it
//!
//! **Firing**:
//! - Once armed, `check()` returns true when no heartbeat arrived within the timeout
//! - Each firing re-arms the timer at the firing instant, so a silent host
//!   produces one fail-safe per elapsed timeout period instead of a single latch
//!
//! Time is passed in explicitly as a monotonic `Instant`; no blocking waits.

use std::time::{Duration, Instant};

/// Default host heartbeat timeout
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    timeout: Duration,
    last_heartbeat: Option<Instant>,
}

impl HeartbeatMonitor {
    /// Create a disarmed monitor
    ///
    /// # Example
    /// ```
    /// # use brakeguard_driver::HeartbeatMonitor;
    /// # use std::time::{Duration, Instant};
    /// let mut monitor = HeartbeatMonitor::new(Duration::from_millis(1000));
    /// let t0 = Instant::now();
    /// assert!(!monitor.check(t0 + Duration::from_secs(60)));
    ///
    /// monitor.register(t0);
    /// assert!(monitor.check(t0 + Duration::from_millis(1001)));
    /// ```
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_heartbeat: None,
        }
    }

    /// Register an accepted heartbeat (arms the monitor)
    pub fn register(&mut self, now: Instant) {
        self.last_heartbeat = Some(now);
    }

    /// Returns true exactly when the fail-safe should fire at `now`
    pub fn check(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_heartbeat
            && now.saturating_duration_since(last) > self.timeout
        {
            self.last_heartbeat = Some(now);
            return true;
        }
        false
    }

    pub fn is_armed(&self) -> bool {
        self.last_heartbeat.is_some()
    }

    /// Time since the last heartbeat (or the last firing), None when disarmed
    pub fn time_since_last(&self, now: Instant) -> Option<Duration> {
        self.last_heartbeat
            .map(|last| now.saturating_duration_since(last))
    }

    pub fn last_heartbeat(&self) -> Option<Instant> {
        self.last_heartbeat
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for HeartbeatMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_TIMEOUT)
    }
}
