//! Health reports
//!
//! The pulse loop records every outcome in [`PulseHealth`]; `/health/pulse`
//! reports unhealthy while failures fall inside its window. The job and
//! lease reports are computed from repository snapshots on demand.

use std::collections::VecDeque;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use reel_core::domain::{Job, Semaphore};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PulseReport {
    pub healthy: bool,
    pub successes: u64,
    pub failures: u64,
    /// Failures within the health window
    pub recent_failures: usize,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Default)]
struct Counters {
    successes: u64,
    failures: u64,
    failure_times: VecDeque<DateTime<Utc>>,
    last_success: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl Counters {
    fn prune(&mut self, cutoff: DateTime<Utc>) {
        while self.failure_times.front().is_some_and(|at| *at < cutoff) {
            self.failure_times.pop_front();
        }
    }
}

pub struct PulseHealth {
    counters: Mutex<Counters>,
    window: TimeDelta,
}

impl PulseHealth {
    /// Failures older than `window` no longer count against health
    pub fn new(window: TimeDelta) -> Self {
        Self {
            counters: Mutex::new(Counters::default()),
            window,
        }
    }

    pub fn record_success(&self, now: DateTime<Utc>) {
        let mut counters = self.counters.lock();
        counters.successes += 1;
        counters.last_success = Some(now);
    }

    pub fn record_failure(&self, now: DateTime<Utc>, error: &str) {
        let mut counters = self.counters.lock();
        counters.prune(now - self.window);
        counters.failures += 1;
        counters.failure_times.push_back(now);
        counters.last_error = Some(error.to_string());
    }

    pub fn report(&self, now: DateTime<Utc>) -> PulseReport {
        let mut counters = self.counters.lock();
        counters.prune(now - self.window);

        let recent_failures = counters.failure_times.len();
        PulseReport {
            healthy: recent_failures == 0,
            successes: counters.successes,
            failures: counters.failures,
            recent_failures,
            last_success: counters.last_success,
            last_failure: counters.failure_times.back().copied(),
            last_error: counters.last_error.clone(),
        }
    }

    #[cfg(test)]
    fn tracked_failures(&self) -> usize {
        self.counters.lock().failure_times.len()
    }
}

/// When finished jobs should raise an alarm
#[derive(Debug, Clone, Copy)]
pub struct JobsHealthPolicy {
    /// How far back finished jobs are counted
    pub window: TimeDelta,
    /// Fewer failures than this never alarm
    pub min_failures: usize,
    /// Alarm once failed / (done + failed) exceeds this
    pub failure_ratio: f64,
}

impl Default for JobsHealthPolicy {
    fn default() -> Self {
        Self {
            window: TimeDelta::hours(1),
            min_failures: 3,
            failure_ratio: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobsReport {
    pub healthy: bool,
    pub window_secs: i64,
    pub done: usize,
    pub failed: usize,
    pub failure_ratio: f64,
    pub failed_jobs: Vec<String>,
}

impl JobsHealthPolicy {
    pub fn evaluate(&self, done: &[Job], failed: &[Job]) -> JobsReport {
        let total = done.len() + failed.len();
        let failure_ratio = if total == 0 {
            0.0
        } else {
            failed.len() as f64 / total as f64
        };
        let alarm = failed.len() >= self.min_failures && failure_ratio > self.failure_ratio;

        JobsReport {
            healthy: !alarm,
            window_secs: self.window.num_seconds(),
            done: done.len(),
            failed: failed.len(),
            failure_ratio,
            failed_jobs: failed.iter().map(|job| job.urn.clone()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemaphoreReport {
    pub healthy: bool,
    pub owner: Option<String>,
    pub heartbeat: Option<DateTime<Utc>>,
    pub max_age_secs: i64,
}

/// The lease is healthy while someone holds it with a fresh heartbeat
pub fn semaphore_report(lease: Option<&Semaphore>, now: DateTime<Utc>, max_age: TimeDelta) -> SemaphoreReport {
    let healthy = lease.is_some_and(|lease| lease.owner.is_some() && lease.heartbeat >= now - max_age);
    SemaphoreReport {
        healthy,
        owner: lease.and_then(|lease| lease.owner.clone()),
        heartbeat: lease.map(|lease| lease.heartbeat),
        max_age_secs: max_age.num_seconds(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_core::domain::Essence;
    use rstest::rstest;

    #[test]
    fn test_failures_age_out_of_window() {
        let health = PulseHealth::new(TimeDelta::seconds(300));
        let start = Utc::now();

        health.record_success(start);
        assert!(health.report(start).healthy);

        health.record_failure(start + TimeDelta::seconds(10), "database unavailable");
        let report = health.report(start + TimeDelta::seconds(20));
        assert!(!report.healthy);
        assert_eq!(report.recent_failures, 1);
        assert_eq!(report.last_error.as_deref(), Some("database unavailable"));

        let later = health.report(start + TimeDelta::seconds(311));
        assert!(later.healthy);
        assert_eq!(later.failures, 1);
        assert_eq!(later.successes, 1);
        assert!(later.last_failure.is_none());
    }

    #[test]
    fn test_failures_pruned_without_reports() {
        let health = PulseHealth::new(TimeDelta::seconds(60));
        let start = Utc::now();

        for i in 0..100 {
            health.record_failure(start + TimeDelta::seconds(i * 10), "database unavailable");
        }
        // one failure every 10s, only those within the last 60s are kept
        assert_eq!(health.tracked_failures(), 7);
        assert_eq!(health.report(start + TimeDelta::seconds(990)).failures, 100);
    }

    fn jobs(count: usize) -> Vec<Job> {
        (0..count)
            .map(|_| Job::new("clip", Essence::default(), Essence::default(), Utc::now()))
            .collect()
    }

    #[rstest]
    #[case(0, 0, true)]
    #[case(10, 2, true)]
    #[case(1, 2, true)]
    #[case(2, 3, false)]
    #[case(3, 3, true)]
    fn test_jobs_alarm(#[case] done: usize, #[case] failed: usize, #[case] healthy: bool) {
        let policy = JobsHealthPolicy::default();
        let failed = jobs(failed);
        let report = policy.evaluate(&jobs(done), &failed);
        assert_eq!(report.healthy, healthy);
        assert_eq!(report.failed_jobs.len(), failed.len());
    }

    #[test]
    fn test_semaphore_staleness() {
        let now = Utc::now();
        let max_age = TimeDelta::seconds(60);
        let lease = |age: i64, owner: Option<&str>| Semaphore {
            id: "executor".to_string(),
            owner: owner.map(str::to_string),
            heartbeat: now - TimeDelta::seconds(age),
        };

        assert!(semaphore_report(Some(&lease(30, Some("a:8080"))), now, max_age).healthy);
        let stale = semaphore_report(Some(&lease(61, Some("a:8080"))), now, max_age);
        assert!(!stale.healthy);
        assert_eq!(stale.owner.as_deref(), Some("a:8080"));
        assert!(!semaphore_report(Some(&lease(1, None)), now, max_age).healthy);
        assert!(!semaphore_report(None, now, max_age).healthy);
    }
}
