use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Prediction table error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),

    #[error("Scheduler is shut down, not accepting {0}")]
    SchedulerStopped(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// An external collaborator answered, but with something unusable.
    #[error("{source_name} error: {message}")]
    Collaborator { source_name: &'static str, message: String },

    #[error("Predictions can only be generated for today ({today}), not {requested}")]
    UnsupportedDate {
        requested: chrono::NaiveDate,
        today: chrono::NaiveDate,
    },

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn collaborator(source_name: &'static str, message: impl Into<String>) -> Self {
        AppError::Collaborator { source_name, message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::UnsupportedDate { .. } | AppError::UnknownModel(_) => StatusCode::BAD_REQUEST,
            AppError::Collaborator { .. } | AppError::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
