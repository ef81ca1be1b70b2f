//! Prediction lifecycle: reconcile yesterday, generate today, schedule announcements.

pub mod generator;
pub mod reconciler;
pub mod stats;

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::api::health::HealthState;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::report::ReportDispatcher;
use crate::scheduler::{JobScheduler, JobSummary};
use crate::sources::{OddsSource, Predictor, ResultsSource};
use crate::store::PredictionStore;
use crate::types::{ModelId, PredictionRecord, RecordState};

pub use generator::{GenerationOutcome, GenerationRequest};
pub use reconciler::ReconcileReport;

/// The three read-side collaborators the lifecycle talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub odds: Arc<dyn OddsSource>,
    pub predictor: Arc<dyn Predictor>,
    pub results: Arc<dyn ResultsSource>,
}

/// What one reconcile-then-generate run did.
#[derive(Debug, Clone, Serialize)]
pub struct DailyRun {
    pub reconcile: ReconcileReport,
    pub generation: GenerationOutcome,
    pub announcements_scheduled: usize,
}

/// Accuracy over every reconciled row in the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifetimeAccuracy {
    pub correct: u32,
    pub wrong: u32,
    pub indeterminate: u32,
    pub pending: u32,
    pub accuracy_pct: Option<u32>,
}

pub struct Engine {
    cfg: EngineConfig,
    store: Arc<PredictionStore>,
    sources: Collaborators,
    dispatcher: ReportDispatcher,
    scheduler: Arc<JobScheduler>,
    model: watch::Sender<ModelId>,
    health: Arc<HealthState>,
}

impl Engine {
    pub fn new(
        cfg: EngineConfig,
        store: Arc<PredictionStore>,
        sources: Collaborators,
        dispatcher: ReportDispatcher,
        scheduler: Arc<JobScheduler>,
        model: ModelId,
        health: Arc<HealthState>,
    ) -> Arc<Self> {
        let (model, _) = watch::channel(model);
        Arc::new(Self { cfg, store, sources, dispatcher, scheduler, model, health })
    }

    // -----------------------------------------------------------------------
    // Model selection
    // -----------------------------------------------------------------------

    /// The model the next run will use.
    pub fn model(&self) -> ModelId {
        *self.model.borrow()
    }

    pub fn set_model(&self, model: ModelId) {
        let previous = self.model.send_replace(model);
        info!(from = %previous, to = %model, "Active model switched");
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.cfg.schedule_tz)
    }

    pub fn health(&self) -> &Arc<HealthState> {
        &self.health
    }

    pub async fn jobs(&self) -> Vec<JobSummary> {
        self.scheduler.jobs().await
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Resolve every due pending row, persist, then publish the pass summary.
    /// The store lock is released before anything is published.
    pub async fn reconcile_pass(&self, now: DateTime<FixedOffset>) -> Result<ReconcileReport> {
        let report = {
            let guard = self.store.lock().await;
            let mut table = guard.load()?;
            let report = reconciler::reconcile(
                &mut table,
                self.sources.results.as_ref(),
                now,
                self.cfg.reconcile_lead,
            )
            .await;
            if report.reconciled + report.indeterminate > 0 {
                guard.save(&table)?;
            }
            report
        };

        info!(
            checked = report.checked,
            reconciled = report.reconciled,
            indeterminate = report.indeterminate,
            still_pending = report.still_pending,
            failed = report.failed.len(),
            "Reconciliation pass complete"
        );
        self.dispatcher.dispatch_summary(&report.stats).await;
        Ok(report)
    }

    /// Generate predictions for `date` and register an announcement for each
    /// fresh record whose announcement time is still ahead of `now`.
    pub async fn generate(
        &self,
        date: NaiveDate,
        now: DateTime<FixedOffset>,
    ) -> Result<(GenerationOutcome, usize)> {
        let request = GenerationRequest {
            model: self.model(),
            target: date,
            now,
            tz: &self.cfg.schedule_tz,
            announce_lead: self.cfg.announce_lead,
        };

        let outcome = {
            let guard = self.store.lock().await;
            generator::generate_daily_predictions(
                &guard,
                self.sources.odds.as_ref(),
                self.sources.predictor.as_ref(),
                &request,
            )
            .await?
        };

        let mut scheduled = 0;
        if outcome.freshly_generated {
            for record in &outcome.records {
                match self.schedule_announcement(record, now).await {
                    Ok(Some(_)) => scheduled += 1,
                    Ok(None) => {}
                    Err(e) => warn!(
                        game_id = record.game_id,
                        op = "schedule_announcement",
                        "Could not schedule announcement: {e}"
                    ),
                }
            }
        }
        Ok((outcome, scheduled))
    }

    async fn schedule_announcement(
        &self,
        record: &PredictionRecord,
        now: DateTime<FixedOffset>,
    ) -> Result<Option<Uuid>> {
        let Some(fire_at) = record.time_to_tweet.filter(|t| *t > now) else {
            info!(game_id = record.game_id, "Announcement time already passed, not scheduling");
            return Ok(None);
        };

        let dispatcher = self.dispatcher.clone();
        let record = record.clone();
        let name = format!("announce {} @ {} ({})", record.away, record.home, record.game_id);
        let id = self
            .scheduler
            .schedule_once(&name, fire_at, move || {
                let dispatcher = dispatcher.clone();
                let record = record.clone();
                async move {
                    dispatcher.announce(&record).await;
                }
            })
            .await?;
        self.health.inc_announcements_scheduled();
        Ok(Some(id))
    }

    /// Reconcile, then generate for today. Used by the daily job and `POST /run`.
    pub async fn run_daily(&self) -> Result<DailyRun> {
        let now = self.now();
        let result = self.run_daily_at(now).await;
        self.health.record_run(result.is_ok(), now.timestamp());
        result
    }

    async fn run_daily_at(&self, now: DateTime<FixedOffset>) -> Result<DailyRun> {
        info!(model = %self.model(), date = %now.date_naive(), "Daily run starting");
        let reconcile = self.reconcile_pass(now).await?;
        let (generation, announcements_scheduled) = self.generate(now.date_naive(), now).await?;
        info!(
            generated = generation.records.len(),
            fresh = generation.freshly_generated,
            announcements_scheduled,
            "Daily run finished"
        );
        Ok(DailyRun { reconcile, generation, announcements_scheduled })
    }

    /// Register the recurring daily run. The active model is read at each fire.
    pub async fn register_daily(self: &Arc<Self>, cron: &str) -> Result<Uuid> {
        let engine = Arc::clone(self);
        self.scheduler
            .schedule_recurring("daily reconcile + generate", cron, self.cfg.schedule_tz, move || {
                let engine = Arc::clone(&engine);
                async move {
                    if let Err(e) = engine.run_daily().await {
                        error!(op = "daily_run", "Daily run failed: {e}");
                    }
                }
            })
            .await
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Rows whose event falls on `date` in the schedule timezone.
    pub async fn predictions_for(&self, date: NaiveDate) -> Result<Vec<PredictionRecord>> {
        let tz = self.cfg.schedule_tz;
        Ok(self
            .store
            .snapshot()
            .await?
            .into_iter()
            .filter(|r| r.event_date(&tz) == date)
            .collect())
    }

    pub async fn lifetime_accuracy(&self) -> Result<LifetimeAccuracy> {
        Ok(lifetime_accuracy(&self.store.snapshot().await?))
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    /// Stop the scheduler, then wait (bounded) for any in-flight store write.
    pub async fn shutdown(&self) -> Result<()> {
        self.scheduler.shutdown().await?;
        match self.store.lock_timeout(self.cfg.shutdown_grace).await {
            Some(_guard) => info!("Prediction table idle, safe to exit"),
            None => warn!(
                grace_secs = self.cfg.shutdown_grace.as_secs(),
                "Store still busy after grace period, exiting anyway"
            ),
        }
        Ok(())
    }
}

fn lifetime_accuracy(records: &[PredictionRecord]) -> LifetimeAccuracy {
    let mut acc = LifetimeAccuracy {
        correct: 0,
        wrong: 0,
        indeterminate: 0,
        pending: 0,
        accuracy_pct: None,
    };
    for record in records {
        match record.state() {
            RecordState::Pending => acc.pending += 1,
            RecordState::Indeterminate => acc.indeterminate += 1,
            RecordState::Reconciled if record.prediction_accuracy == Some(1.0) => acc.correct += 1,
            RecordState::Reconciled => acc.wrong += 1,
        }
    }
    acc.accuracy_pct = stats::accuracy_pct(acc.correct, acc.correct + acc.wrong);
    acc
}
