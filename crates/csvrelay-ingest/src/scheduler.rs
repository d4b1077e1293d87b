//! Daily scheduler
//!
//! Sleeps until the next occurrence of a fixed wall-clock time, runs the job,
//! and repeats until shut down. A job that overruns simply delays the next
//! computation; runs never overlap and never repeat within one calendar day.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use std::fmt::Display;
use std::future::Future;
use tracing::{debug, error, info, warn};

/// Default daily run time (local)
pub const DEFAULT_RUN_AT: &str = "23:05";

/// Parse `HH:MM` or `HH:MM:SS`
pub fn parse_run_time(raw: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(raw, "%H:%M").or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
}

/// Source of the current wall-clock time
pub trait Clock {
    type Tz: TimeZone;

    fn now(&self) -> DateTime<Self::Tz>;
}

/// The system clock in the local time zone
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    type Tz = Local;

    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// The first instant strictly after `now` whose local time is `at`.
///
/// When `at` falls in a DST gap the run moves one hour later; when it occurs
/// twice the earlier instant is used.
pub fn next_due<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    now.date_naive()
        .iter_days()
        .take(3)
        .filter_map(|day| resolve_local(&tz, day.and_time(at)))
        .find(|candidate| candidate > now)
        .unwrap_or_else(|| now.clone() + chrono::Duration::days(1))
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + chrono::Duration::hours(1))).earliest())
}

/// Runs a job once per day at a fixed local time
#[derive(Debug, Clone)]
pub struct DailySchedule {
    at: NaiveTime,
    last_run: Option<NaiveDate>,
}

impl DailySchedule {
    pub fn new(at: NaiveTime) -> Self {
        Self { at, last_run: None }
    }

    /// Record a run for `day`. False if that day already had one.
    fn claim(&mut self, day: NaiveDate) -> bool {
        if self.last_run == Some(day) {
            return false;
        }
        self.last_run = Some(day);
        true
    }

    /// Run `job` daily on the system clock until `shutdown` resolves
    pub async fn run<F, Fut, E, S>(self, job: F, shutdown: S)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
        S: Future<Output = ()>,
    {
        self.run_with_clock(&LocalClock, job, shutdown).await
    }

    /// Run `job` daily on `clock` until `shutdown` resolves.
    ///
    /// Shutdown is honored while waiting and while a job is in flight; an
    /// interrupted job is dropped, which releases whatever it holds.
    pub async fn run_with_clock<C, F, Fut, E, S>(mut self, clock: &C, mut job: F, shutdown: S)
    where
        C: Clock,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(at = %self.at.format("%H:%M"), "Scheduler started");

        loop {
            let now = clock.now();
            let due = next_due(&now, self.at);
            let wait = due
                .clone()
                .signed_duration_since(now)
                .to_std()
                .unwrap_or_default();
            info!(next_run = %due.naive_local(), "Waiting for next run");

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Scheduler stopped manually");
                    return;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            if !self.claim(due.date_naive()) {
                debug!(day = %due.date_naive(), "Already ran today, skipping");
                continue;
            }

            tokio::select! {
                _ = &mut shutdown => {
                    warn!("Scheduler stopped during a run");
                    return;
                }
                result = job() => match result {
                    Ok(()) => info!("Scheduled run finished"),
                    Err(e) => error!(error = %e, "Scheduled run failed"),
                }
            }
        }
    }
}
