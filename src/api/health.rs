//! Shared health state for the /health endpoint.
//! Updated by the engine after each daily run, read by the API.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

/// Shared health counters.
#[derive(Default)]
pub struct HealthState {
    /// Unix seconds of the last finished daily run (0 = none yet).
    pub last_run_at: AtomicI64,
    /// Whether the last finished daily run succeeded.
    pub last_run_ok: AtomicBool,
    pub runs_ok: AtomicU64,
    pub runs_failed: AtomicU64,
    /// One-shot announcement jobs registered since startup.
    pub announcements_scheduled: AtomicU64,
}

#[derive(Debug, Serialize)]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub last_run_at: Option<i64>,
    pub last_run_ok: Option<bool>,
    pub runs_ok: u64,
    pub runs_failed: u64,
    pub announcements_scheduled: u64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_run(&self, ok: bool, at_unix: i64) {
        self.last_run_at.store(at_unix, Ordering::Relaxed);
        self.last_run_ok.store(ok, Ordering::Relaxed);
        if ok {
            self.runs_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.runs_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn inc_announcements_scheduled(&self) {
        self.announcements_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let last_run_at = self.last_run_at.load(Ordering::Relaxed);
        let ran = last_run_at != 0;
        let last_run_ok = ran.then(|| self.last_run_ok.load(Ordering::Relaxed));
        HealthSnapshot {
            status: if last_run_ok == Some(false) { "degraded" } else { "ok" },
            last_run_at: ran.then_some(last_run_at),
            last_run_ok,
            runs_ok: self.runs_ok.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            announcements_scheduled: self.announcements_scheduled.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_run_degrades_status_until_next_success() {
        let health = HealthState::new();
        assert_eq!(health.snapshot().status, "ok");
        assert_eq!(health.snapshot().last_run_at, None);

        health.record_run(false, 1_700_000_000);
        let snap = health.snapshot();
        assert_eq!(snap.status, "degraded");
        assert_eq!(snap.runs_failed, 1);

        health.record_run(true, 1_700_086_400);
        let snap = health.snapshot();
        assert_eq!(snap.status, "ok");
        assert_eq!(snap.last_run_at, Some(1_700_086_400));
        assert_eq!(snap.runs_ok, 1);
    }
}
