//! Fetch scheduling.
//!
//! Delays are measured from the *start* of the last successful fetch, so a
//! fetch that overruns the polling interval is followed immediately by the
//! next one and never pushes later fetches further out.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::FetcherConfig;

#[derive(Debug, Clone)]
pub struct FetchSchedule {
    initial_delay: Duration,
    polling_interval: Duration,
    error_retry_interval: Duration,
    last_fetch: Option<Instant>,
}

impl FetchSchedule {
    /// Schedule with no fetch recorded yet.
    pub fn new(initial_delay: Duration, polling_interval: Duration, error_retry_interval: Duration) -> Self {
        Self {
            initial_delay,
            polling_interval,
            error_retry_interval,
            last_fetch: None,
        }
    }

    /// Schedule built from the configured millisecond values.
    pub fn from_config(config: &FetcherConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_delay_ms),
            Duration::from_millis(config.polling_interval_ms),
            Duration::from_millis(config.error_retry_interval_ms),
        )
    }

    /// Interval between the starts of successful fetches.
    pub fn polling_interval(&self) -> Duration {
        self.polling_interval
    }

    /// Delay after a failed fetch.
    pub fn error_retry_interval(&self) -> Duration {
        self.error_retry_interval
    }

    /// Record a successful fetch that started at `started`.
    pub fn record_fetch(&mut self, started: Instant) {
        self.last_fetch = Some(started);
    }

    /// Delay before the next fetch as seen at `now`.
    pub fn next_delay(&self, now: Instant) -> Duration {
        match self.last_fetch {
            None => self.initial_delay,
            Some(last) => self
                .polling_interval
                .saturating_sub(now.saturating_duration_since(last)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> FetchSchedule {
        FetchSchedule::new(
            Duration::from_secs(1),
            Duration::from_secs(300),
            Duration::from_secs(30),
        )
    }

    #[test]
    fn first_run_uses_initial_delay() {
        assert_eq!(schedule().next_delay(Instant::now()), Duration::from_secs(1));
    }

    #[test]
    fn waits_out_the_remaining_interval() {
        let mut schedule = schedule();
        let start = Instant::now();
        schedule.record_fetch(start);

        assert_eq!(
            schedule.next_delay(start + Duration::from_secs(100)),
            Duration::from_secs(200)
        );
    }

    #[test]
    fn overdue_fetch_has_zero_delay() {
        let mut schedule = schedule();
        let start = Instant::now();
        schedule.record_fetch(start);

        for late in [300, 301, 10_000] {
            assert_eq!(
                schedule.next_delay(start + Duration::from_secs(late)),
                Duration::ZERO
            );
        }
    }

    #[test]
    fn clock_before_last_fetch_waits_full_interval() {
        let mut schedule = schedule();
        let now = Instant::now();
        schedule.record_fetch(now + Duration::from_secs(5));
        assert_eq!(schedule.next_delay(now), Duration::from_secs(300));
    }

    #[test]
    fn built_from_config() {
        let schedule = FetchSchedule::from_config(&FetcherConfig::default());
        assert_eq!(schedule.polling_interval(), Duration::from_secs(300));
        assert_eq!(schedule.error_retry_interval(), Duration::from_secs(30));
        assert_eq!(schedule.next_delay(Instant::now()), Duration::from_secs(1));
    }
}
