mod api;
mod config;
mod control;
mod db;
mod engine;
mod error;
mod report;
mod scheduler;
mod sources;
mod store;
mod types;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::{router, ApiState, HealthState};
use crate::config::{Config, CHANNEL_CAPACITY};
use crate::control::Console;
use crate::db::DispatchLog;
use crate::engine::{Collaborators, Engine};
use crate::error::Result;
use crate::report::ReportDispatcher;
use crate::scheduler::JobScheduler;
use crate::sources::{
    CommandPublisher, LogPublisher, MlbStatsClient, ModelServiceClient, OddsApiClient, Publisher,
};
use crate::store::PredictionStore;
use crate::types::{ControlMsg, ModelId};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Some(name) = &cfg.rejected_model {
        warn!(
            "SELECTED_MODEL={name} is not one of [{}], using {}",
            ModelId::choices(),
            cfg.selected_model
        );
    }

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup (dispatch log) ---
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect(&format!("sqlite:{}?mode=rwc", cfg.db_path))
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Dispatch log ready at {}", cfg.db_path);
    let dispatches = DispatchLog::new(pool);

    // --- Prediction table ---
    let store = Arc::new(PredictionStore::new(&cfg.predictions_path));
    info!("Prediction table at {}", store.path().display());

    // --- Collaborators ---
    if cfg.odds_api_key.is_none() {
        warn!("ODDS_API_KEY not set, odds fetches will fail until it is configured");
    }
    let sources = Collaborators {
        odds: Arc::new(OddsApiClient::new(
            cfg.odds_api_url.clone(),
            cfg.odds_api_key.clone(),
            cfg.schedule_tz,
        )?),
        predictor: Arc::new(ModelServiceClient::new(cfg.model_service_url.clone())?),
        results: Arc::new(MlbStatsClient::new(cfg.mlb_stats_api_url.clone())?),
    };
    let publisher: Arc<dyn Publisher> = match &cfg.publish_command {
        Some(command) => {
            info!("Publishing via `{}`", command.join(" "));
            Arc::new(CommandPublisher::new(command.clone())?)
        }
        None => {
            warn!("PUBLISH_COMMAND not set, reports will only be logged");
            Arc::new(LogPublisher)
        }
    };
    let dispatcher = ReportDispatcher::new(publisher, Some(dispatches.clone()));

    // --- Engine + scheduler ---
    let scheduler = JobScheduler::new().await?;
    let health = Arc::new(HealthState::new());
    let engine = Engine::new(
        cfg.engine.clone(),
        Arc::clone(&store),
        sources,
        dispatcher,
        Arc::clone(&scheduler),
        cfg.selected_model,
        Arc::clone(&health),
    );
    info!(model = %engine.model(), "Active model");

    if let Err(e) = engine.register_daily(&cfg.daily_cron).await {
        error!("Could not schedule the daily run ({}): {e}", cfg.daily_cron);
    }
    scheduler.start().await?;
    for job in engine.jobs().await {
        info!(name = %job.name, trigger = %job.trigger, next_fire = ?job.next_fire, "Job registered");
    }

    if cfg.run_on_startup {
        let startup = Arc::clone(&engine);
        tokio::spawn(async move {
            if let Err(e) = startup.run_daily().await {
                error!(op = "startup_run", "Startup run failed: {e}");
            }
        });
    }

    // --- Control channel ---
    let (control_tx, control_rx) = mpsc::channel::<ControlMsg>(CHANNEL_CAPACITY);

    // Operator console (Ctrl-C menu)
    let console = Console::new(Arc::clone(&scheduler), control_tx.clone());
    tokio::spawn(async move { console.run().await });

    // HTTP API server
    let api_state = ApiState { engine: Arc::clone(&engine), dispatches, control_tx };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = stop_rx.await;
        });
        if let Err(e) = serve.await {
            error!("HTTP API stopped: {e}");
        }
    });

    control_loop(control_rx, &engine).await;

    // --- Shutdown ---
    engine.shutdown().await?;
    let _ = stop_tx.send(());
    if let Err(e) = server.await {
        warn!("HTTP API task ended abnormally: {e}");
    }
    info!("Shutdown complete");
    Ok(())
}

/// Applies operator requests until shutdown is asked for.
async fn control_loop(mut rx: mpsc::Receiver<ControlMsg>, engine: &Engine) {
    while let Some(msg) = rx.recv().await {
        match msg {
            ControlMsg::SwitchModel(model) => engine.set_model(model),
            ControlMsg::Shutdown => {
                info!("Shutdown requested");
                return;
            }
        }
    }
}
