//! External collaborators: odds, model, results and publishing.
//! The engine only sees these traits; concrete clients live in the submodules.

pub mod mlb_stats;
pub mod model_service;
pub mod odds_api;
pub mod publisher;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::types::{FixtureBatch, GameResult, ModelId, Prediction};

pub use mlb_stats::MlbStatsClient;
pub use model_service::ModelServiceClient;
pub use odds_api::OddsApiClient;
pub use publisher::{CommandPublisher, LogPublisher};

/// Today's games with moneyline odds.
#[async_trait]
pub trait OddsSource: Send + Sync {
    async fn todays_fixtures(&self, date: NaiveDate) -> Result<FixtureBatch>;
}

/// Turns a matchup into a pick. Declining is `Ok` with `winner: None`.
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(&self, model: ModelId, home_team: &str) -> Result<Prediction>;
}

/// Final score and status for a single game.
#[async_trait]
pub trait ResultsSource: Send + Sync {
    async fn lookup(&self, game_id: u64) -> Result<GameResult>;
}

/// Posts a short text message somewhere public.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, text: &str) -> Result<()>;
}

pub(crate) fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(crate::config::HTTP_TIMEOUT_SECS))
        .build()?)
}
