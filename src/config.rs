use chrono::{Duration, FixedOffset, Offset, Utc};

use crate::error::{AppError, Result};
use crate::types::ModelId;

pub const ODDS_API_URL: &str = "https://api.the-odds-api.com/v4";
pub const MLB_STATS_API_URL: &str = "https://statsapi.mlb.com/api/v1";
pub const MODEL_SERVICE_URL: &str = "http://localhost:8000";

/// Recurring reconcile+generate job: 07:00:00 every day, in the schedule timezone.
/// Six fields, seconds first.
pub const DAILY_CRON: &str = "0 0 7 * * *";

/// Channel capacity for operator control messages.
pub const CHANNEL_CAPACITY: usize = 64;

/// Timeout applied to every outbound HTTP request.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    /// CSV prediction table (PREDICTIONS_PATH)
    pub predictions_path: String,
    /// Dispatch log database (DB_PATH)
    pub db_path: String,
    pub api_port: u16,
    /// Model used at startup (SELECTED_MODEL); falls back to the default when unset or unknown.
    pub selected_model: ModelId,
    /// SELECTED_MODEL value that named no known model.
    pub rejected_model: Option<String>,
    pub daily_cron: String,
    /// Timezone used for "today", the daily trigger and display times (SCHEDULE_UTC_OFFSET_HOURS)
    pub schedule_tz: FixedOffset,
    pub engine: EngineConfig,
    /// Run reconcile+generate once right after startup (RUN_ON_STARTUP)
    pub run_on_startup: bool,
    pub odds_api_url: String,
    pub odds_api_key: Option<String>,
    pub model_service_url: String,
    pub mlb_stats_api_url: String,
    /// Program (plus leading args) that publishes a message passed as its last argument.
    pub publish_command: Option<Vec<String>>,
}

/// Timing knobs for the lifecycle engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub schedule_tz: FixedOffset,
    /// Minimum time since first pitch before a result is looked up (RECONCILE_LEAD_HOURS)
    pub reconcile_lead: Duration,
    /// How long before first pitch the announcement fires (ANNOUNCE_LEAD_MINUTES)
    pub announce_lead: Duration,
    /// Upper bound on waiting for an in-flight store write at shutdown (SHUTDOWN_GRACE_SECS)
    pub shutdown_grace: std::time::Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schedule_tz: eastern_daylight(),
            reconcile_lead: Duration::hours(6),
            announce_lead: Duration::hours(1),
            shutdown_grace: std::time::Duration::from_secs(30),
        }
    }
}

fn eastern_daylight() -> FixedOffset {
    FixedOffset::west_opt(4 * 3600).unwrap_or_else(|| Utc.fix())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let offset_hours = std::env::var("SCHEDULE_UTC_OFFSET_HOURS")
            .unwrap_or_else(|_| "-4".to_string())
            .parse::<i32>()
            .map_err(|_| AppError::Config("SCHEDULE_UTC_OFFSET_HOURS must be an integer".to_string()))?;
        let schedule_tz = FixedOffset::east_opt(offset_hours * 3600).ok_or_else(|| {
            AppError::Config(format!("SCHEDULE_UTC_OFFSET_HOURS out of range: {offset_hours}"))
        })?;

        let engine = EngineConfig {
            schedule_tz,
            reconcile_lead: Duration::hours(
                std::env::var("RECONCILE_LEAD_HOURS")
                    .unwrap_or_else(|_| "6".to_string())
                    .parse::<i64>()
                    .unwrap_or(6),
            ),
            announce_lead: Duration::minutes(
                std::env::var("ANNOUNCE_LEAD_MINUTES")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse::<i64>()
                    .unwrap_or(60),
            ),
            shutdown_grace: std::time::Duration::from_secs(
                std::env::var("SHUTDOWN_GRACE_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse::<u64>()
                    .unwrap_or(30),
            ),
        };

        let (selected_model, rejected_model) =
            resolve_model(std::env::var("SELECTED_MODEL").ok().as_deref());

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            predictions_path: std::env::var("PREDICTIONS_PATH")
                .unwrap_or_else(|_| "data/predictions.csv".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "dispatches.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            selected_model,
            rejected_model,
            daily_cron: std::env::var("DAILY_CRON").unwrap_or_else(|_| DAILY_CRON.to_string()),
            schedule_tz,
            engine,
            run_on_startup: std::env::var("RUN_ON_STARTUP")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(false),
            odds_api_url: std::env::var("ODDS_API_URL").unwrap_or_else(|_| ODDS_API_URL.to_string()),
            odds_api_key: std::env::var("ODDS_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            model_service_url: std::env::var("MODEL_SERVICE_URL")
                .unwrap_or_else(|_| MODEL_SERVICE_URL.to_string()),
            mlb_stats_api_url: std::env::var("MLB_STATS_API_URL")
                .unwrap_or_else(|_| MLB_STATS_API_URL.to_string()),
            publish_command: std::env::var("PUBLISH_COMMAND")
                .ok()
                .map(|c| c.split_whitespace().map(str::to_string).collect::<Vec<_>>())
                .filter(|parts| !parts.is_empty()),
        })
    }
}

/// Startup model selection: the override when it names a known model, else the default.
/// A rejected override is handed back so it can be reported once logging is up.
pub fn resolve_model(raw: Option<&str>) -> (ModelId, Option<String>) {
    match raw.map(|name| (name, name.parse::<ModelId>())) {
        None => (ModelId::default(), None),
        Some((_, Ok(model))) => (model, None),
        Some((name, Err(_))) => (ModelId::default(), Some(name.to_string())),
    }
}
