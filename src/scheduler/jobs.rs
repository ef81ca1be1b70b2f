use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio_cron_scheduler::{Job, JobScheduler as CronScheduler};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// How a job is triggered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Six-field cron (seconds first), evaluated in `tz`.
    Cron { expr: String, tz: FixedOffset },
    /// Fires once at `at`, then removes itself.
    Once { at: DateTime<FixedOffset> },
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Cron { expr, tz } => write!(f, "cron[{expr}] (UTC{tz})"),
            Trigger::Once { at } => write!(f, "date[{}]", at.to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone)]
struct JobEntry {
    name: String,
    trigger: Trigger,
}

/// A registered job as the operator sees it.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub id: Uuid,
    pub name: String,
    pub next_fire: Option<DateTime<Utc>>,
    pub trigger: String,
}

/// Recurring and one-shot jobs on top of `tokio-cron-scheduler`.
///
/// Keeps its own registry next to the cron scheduler so jobs can be listed with a
/// name and a readable trigger. One-shot jobs drop out of the registry once they fire.
pub struct JobScheduler {
    inner: CronScheduler,
    registry: Arc<DashMap<Uuid, JobEntry>>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl JobScheduler {
    pub async fn new() -> Result<Arc<Self>> {
        Ok(Arc::new(Self {
            inner: CronScheduler::new().await?,
            registry: Arc::new(DashMap::new()),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }))
    }

    pub async fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.start().await?;
        info!("Job scheduler started");
        Ok(())
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn ensure_running(&self, name: &str) -> Result<()> {
        if self.is_stopped() {
            warn!(name, "Job rejected, scheduler already stopped");
            return Err(AppError::SchedulerStopped(name.to_string()));
        }
        Ok(())
    }

    /// Shutdown may land while a job is being added; drop it from the registry then.
    fn forget_if_stopped(&self, id: Uuid, name: &str) -> Result<()> {
        if self.is_stopped() {
            self.registry.remove(&id);
            return Err(AppError::SchedulerStopped(name.to_string()));
        }
        Ok(())
    }

    /// Register a job that runs `task` on every cron tick until shutdown.
    pub async fn schedule_recurring<F, Fut>(
        &self,
        name: &str,
        cron: &str,
        tz: FixedOffset,
        task: F,
    ) -> Result<Uuid>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.ensure_running(name)?;
        let job = Job::new_async_tz(cron, tz, move |_id, _lock| Box::pin(task()))?;
        let id = self.inner.add(job).await?;
        self.registry.insert(
            id,
            JobEntry {
                name: name.to_string(),
                trigger: Trigger::Cron { expr: cron.to_string(), tz },
            },
        );
        self.forget_if_stopped(id, name)?;
        info!(job = %id, name, cron, "Recurring job scheduled");
        Ok(id)
    }

    /// Register a job that runs `task` once at `at`. Times already past fire right away.
    pub async fn schedule_once<F, Fut>(
        &self,
        name: &str,
        at: DateTime<FixedOffset>,
        task: F,
    ) -> Result<Uuid>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.ensure_running(name)?;
        let delay = (at.with_timezone(&Utc) - Utc::now()).to_std().unwrap_or_default();
        let registry = Arc::clone(&self.registry);
        let task = Arc::new(task);

        let job = Job::new_one_shot_async(delay, move |id, _lock| {
            let registry = Arc::clone(&registry);
            let task = Arc::clone(&task);
            Box::pin(async move {
                if let Some((_, entry)) = registry.remove(&id) {
                    debug!(job = %id, name = %entry.name, "One-shot job firing");
                    (*task)().await;
                }
            })
        })?;

        let id = job.guid();
        self.registry.insert(id, JobEntry { name: name.to_string(), trigger: Trigger::Once { at } });
        if let Err(e) = self.inner.add(job).await {
            self.registry.remove(&id);
            return Err(e.into());
        }
        self.forget_if_stopped(id, name)?;
        info!(job = %id, name, fire_at = %at, "One-shot job scheduled");
        Ok(id)
    }

    /// Remove a job. Unknown ids are ignored.
    pub async fn cancel(&self, id: Uuid) -> Result<()> {
        if self.registry.remove(&id).is_some() {
            self.inner.remove(&id).await?;
            info!(job = %id, "Job cancelled");
        }
        Ok(())
    }

    /// Registered jobs, soonest first.
    pub async fn jobs(&self) -> Vec<JobSummary> {
        let entries: Vec<(Uuid, JobEntry)> =
            self.registry.iter().map(|e| (*e.key(), e.value().clone())).collect();

        let mut jobs = Vec::with_capacity(entries.len());
        for (id, entry) in entries {
            let next_fire = match &entry.trigger {
                Trigger::Once { at } => Some(at.with_timezone(&Utc)),
                Trigger::Cron { .. } => {
                    let mut inner = self.inner.clone();
                    inner.next_tick_for_job(id).await.ok().flatten()
                }
            };
            jobs.push(JobSummary {
                id,
                name: entry.name,
                next_fire,
                trigger: entry.trigger.to_string(),
            });
        }
        jobs.sort_by_key(|j| j.next_fire.unwrap_or(DateTime::<Utc>::MAX_UTC));
        jobs
    }

    /// Stop all triggers and forget pending one-shots. Safe to call more than once.
    /// Callbacks already running are left to finish.
    pub async fn shutdown(&self) -> Result<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            debug!("Scheduler already stopped");
            return Ok(());
        }

        let dropped = self.registry.len();
        self.registry.clear();
        if self.started.load(Ordering::SeqCst) {
            let mut inner = self.inner.clone();
            if let Err(e) = inner.shutdown().await {
                warn!("Scheduler shutdown reported: {e}");
            }
        }
        info!(dropped_jobs = dropped, "Job scheduler stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn edt() -> FixedOffset {
        FixedOffset::west_opt(4 * 3600).unwrap()
    }

    #[tokio::test]
    async fn lists_jobs_with_name_and_trigger() {
        let scheduler = JobScheduler::new().await.unwrap();
        let at = Utc::now().with_timezone(&edt()) + chrono::Duration::hours(3);

        scheduler
            .schedule_recurring("daily reconcile + generate", "0 0 7 * * *", edt(), || async {})
            .await
            .unwrap();
        scheduler.schedule_once("announce 1", at, || async {}).await.unwrap();

        let jobs = scheduler.jobs().await;
        assert_eq!(jobs.len(), 2);
        let once = jobs.iter().find(|j| j.name == "announce 1").unwrap();
        assert_eq!(once.next_fire, Some(at.with_timezone(&Utc)));
        assert!(once.trigger.starts_with("date["));
        let daily = jobs.iter().find(|j| j.name.starts_with("daily")).unwrap();
        assert!(daily.trigger.contains("0 0 7 * * *"));
    }

    #[tokio::test]
    async fn cancelled_job_disappears() {
        let scheduler = JobScheduler::new().await.unwrap();
        let at = Utc::now().with_timezone(&edt()) + chrono::Duration::hours(3);
        let id = scheduler.schedule_once("announce 1", at, || async {}).await.unwrap();

        scheduler.cancel(id).await.unwrap();
        assert!(scheduler.jobs().await.is_empty());
        scheduler.cancel(id).await.unwrap();
    }

    #[tokio::test]
    async fn one_shot_fires_once_then_deregisters() {
        let scheduler = JobScheduler::new().await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let at = Utc::now().with_timezone(&edt()) + chrono::Duration::milliseconds(200);

        scheduler
            .schedule_once("announce 1", at, move || {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(());
                }
            })
            .await
            .unwrap();
        scheduler.start().await.unwrap();

        tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("one-shot job did not fire")
            .unwrap();
        assert!(scheduler.jobs().await.is_empty());
        scheduler.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn stopped_scheduler_rejects_new_jobs() {
        let scheduler = JobScheduler::new().await.unwrap();
        scheduler.start().await.unwrap();
        scheduler.shutdown().await.unwrap();

        let at = Utc::now().with_timezone(&edt()) + chrono::Duration::hours(2);
        let once = scheduler.schedule_once("late", at, || async {}).await;
        assert!(matches!(once, Err(AppError::SchedulerStopped(_))));
        let daily = scheduler
            .schedule_recurring("daily", "0 0 7 * * *", edt(), || async {})
            .await;
        assert!(matches!(daily, Err(AppError::SchedulerStopped(_))));
        assert!(scheduler.jobs().await.is_empty());
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let scheduler = JobScheduler::new().await.unwrap();
        scheduler
            .schedule_recurring("daily", "0 0 7 * * *", edt(), || async {})
            .await
            .unwrap();
        scheduler.start().await.unwrap();

        scheduler.shutdown().await.unwrap();
        scheduler.shutdown().await.unwrap();
        assert!(scheduler.is_stopped());
        assert!(scheduler.jobs().await.is_empty());
    }
}
