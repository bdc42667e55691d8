//! Scheduler
//!
//! Fires one cycle at startup, then one on every wall-clock boundary of the
//! configured cadence (minute divisible by N, second 0). Each cycle runs on
//! its own task so the timer keeps its schedule; a latch skips a tick while
//! the previous cycle is still in flight.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::runner::{CycleRunner, CycleSummary};

/// Wall-clock cadence, equivalent to cron `0 */N * * * *`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    every_minutes: u32,
}

impl Cadence {
    /// Clamped to 1..=60
    pub fn every_minutes(minutes: u32) -> Self {
        Self {
            every_minutes: minutes.clamp(1, 60),
        }
    }

    pub fn minutes(&self) -> u32 {
        self.every_minutes
    }

    /// First fire time strictly after `now`
    pub fn next_fire_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let secs_into_hour = now.timestamp().rem_euclid(3600);
        let hour_start = now
            - ChronoDuration::seconds(secs_into_hour)
            - ChronoDuration::nanoseconds(i64::from(now.timestamp_subsec_nanos()));

        let step = i64::from(self.every_minutes);
        let mut minute = 0;
        while minute < 60 {
            let candidate = hour_start + ChronoDuration::minutes(minute);
            if candidate > now {
                return candidate;
            }
            minute += step;
        }
        hour_start + ChronoDuration::hours(1)
    }
}

/// Wall-clock source for tick planning
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Result of asking the scheduler to start a cycle
#[derive(Debug)]
pub enum FireOutcome {
    Started(JoinHandle<CycleSummary>),
    /// A cycle was already running
    Skipped,
}

/// Clears the running flag when the cycle task ends, panics included
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Scheduler {
    runner: Arc<CycleRunner>,
    cadence: Cadence,
    clock: Arc<dyn Clock>,
    running: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(runner: Arc<CycleRunner>) -> Self {
        let cadence = Cadence::every_minutes(runner.config().every_minutes);
        Self {
            runner,
            cadence,
            clock: Arc::new(SystemClock),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Plan ticks against `clock` instead of the system time
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start a cycle on a new task unless one is already in flight
    pub fn fire(&self) -> FireOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Previous analysis cycle still running, skipping this tick");
            return FireOutcome::Skipped;
        }

        let guard = RunningGuard(self.running.clone());
        let runner = self.runner.clone();
        FireOutcome::Started(tokio::spawn(async move {
            let _guard = guard;
            runner.run_cycle().await
        }))
    }

    /// Run until `shutdown` resolves, then wait for the in-flight cycle.
    /// Returns how many cycles were started.
    pub async fn run<F>(&self, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut started = 0;
        let mut in_flight: Option<JoinHandle<CycleSummary>> = None;

        info!("Running initial analysis cycle");
        if let FireOutcome::Started(handle) = self.fire() {
            started += 1;
            in_flight = Some(handle);
        }

        // Last boundary fired; guards against a wake-up a hair before it
        let mut last_fire = self.clock.now();

        loop {
            let now = self.clock.now();
            let next = self.cadence.next_fire_after(now.max(last_fire));
            info!(next_fire = %next, every_minutes = self.cadence.minutes(), "Next analysis cycle scheduled");
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received, no further cycles will be scheduled");
                    break;
                }
                _ = tokio::time::sleep(wait) => {
                    last_fire = next;
                    if let FireOutcome::Started(handle) = self.fire() {
                        started += 1;
                        in_flight = Some(handle);
                    }
                }
            }
        }

        if let Some(handle) = in_flight.take() {
            if !handle.is_finished() {
                info!("Waiting for the in-flight analysis cycle to finish");
            }
            match handle.await {
                Ok(summary) => info!(
                    cycle_id = %summary.cycle_id,
                    delivered = summary.delivered.len(),
                    "Last analysis cycle completed"
                ),
                Err(e) => error!(error = %e, "Analysis cycle task failed"),
            }
        }

        info!(cycles = started, "Scheduler stopped");
        started
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, h, m, s).unwrap()
    }

    #[test]
    fn test_next_fire_every_ten_minutes() {
        let cadence = Cadence::every_minutes(10);
        assert_eq!(cadence.next_fire_after(at(12, 3, 17)), at(12, 10, 0));
        assert_eq!(cadence.next_fire_after(at(12, 10, 0)), at(12, 20, 0));
        assert_eq!(cadence.next_fire_after(at(12, 59, 59)), at(13, 0, 0));
    }

    #[test]
    fn test_next_fire_crosses_midnight() {
        let cadence = Cadence::every_minutes(10);
        let next = cadence.next_fire_after(at(23, 55, 0));
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 3, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_uneven_step_restarts_each_hour() {
        // */7 fires at :00 :07 ... :56 then :00 again
        let cadence = Cadence::every_minutes(7);
        assert_eq!(cadence.next_fire_after(at(8, 50, 0)), at(8, 56, 0));
        assert_eq!(cadence.next_fire_after(at(8, 56, 0)), at(9, 0, 0));
    }

    #[test]
    fn test_sub_second_offset_still_advances() {
        let cadence = Cadence::every_minutes(1);
        let now = at(6, 30, 0) + ChronoDuration::milliseconds(1);
        assert_eq!(cadence.next_fire_after(now), at(6, 31, 0));
    }

    #[test]
    fn test_cadence_is_clamped() {
        assert_eq!(Cadence::every_minutes(0).minutes(), 1);
        assert_eq!(Cadence::every_minutes(90).minutes(), 60);
        assert_eq!(
            Cadence::every_minutes(60).next_fire_after(at(4, 0, 0)),
            at(5, 0, 0)
        );
    }
}
