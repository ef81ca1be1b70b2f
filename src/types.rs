use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

// ---------------------------------------------------------------------------
// Model identifiers
// ---------------------------------------------------------------------------

/// The closed set of prediction models the model service knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModelId {
    #[default]
    #[serde(rename = "mlb3year")]
    Mlb3Year,
    #[serde(rename = "mlb2023")]
    Mlb2023,
    #[serde(rename = "mets6year")]
    Mets6Year,
}

impl ModelId {
    pub const ALL: [ModelId; 3] = [ModelId::Mlb3Year, ModelId::Mlb2023, ModelId::Mets6Year];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Mlb3Year => "mlb3year",
            ModelId::Mlb2023 => "mlb2023",
            ModelId::Mets6Year => "mets6year",
        }
    }

    /// Comma-separated list for prompts and error messages.
    pub fn choices() -> String {
        Self::ALL.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ")
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ModelId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| AppError::UnknownModel(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Prediction records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Home => write!(f, "home"),
            Side::Away => write!(f, "away"),
        }
    }
}

/// One persisted prediction. Field order is the persisted column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub prediction_accuracy: Option<f64>,
    pub date: NaiveDate,
    pub time: String,
    pub home: String,
    pub home_probable: Option<String>,
    pub away: String,
    pub away_probable: Option<String>,
    pub predicted_winner: String,
    pub predicted_winner_location: Side,
    pub model: String,
    pub favorite: Option<String>,
    pub home_odds: Option<i32>,
    pub home_odds_bookmaker: Option<String>,
    pub away_odds: Option<i32>,
    pub away_odds_bookmaker: Option<String>,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub winning_pitcher: Option<String>,
    pub losing_pitcher: Option<String>,
    pub prediction_value: f64,
    pub venue: String,
    pub series_status: Option<String>,
    pub national_broadcasts: Option<String>,
    pub odds_retrieval_time: Option<DateTime<FixedOffset>>,
    pub prediction_generation_time: DateTime<FixedOffset>,
    pub datetime: DateTime<FixedOffset>,
    pub game_id: u64,
    pub summary: Option<String>,
    pub tweet: Option<String>,
    pub time_to_tweet: Option<DateTime<FixedOffset>>,
    #[serde(rename = "tweeted?")]
    pub tweeted: bool,
}

/// Where a record sits in its lifecycle. Derived from the resolution columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Pending,
    Reconciled,
    /// The game went final without a determinable winner.
    Indeterminate,
}

impl PredictionRecord {
    pub fn state(&self) -> RecordState {
        match (self.prediction_accuracy, &self.summary) {
            (Some(_), _) => RecordState::Reconciled,
            (None, Some(_)) => RecordState::Indeterminate,
            (None, None) => RecordState::Pending,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.state() != RecordState::Pending
    }

    /// Calendar date of the event in the given schedule timezone.
    pub fn event_date(&self, tz: &FixedOffset) -> NaiveDate {
        self.datetime.with_timezone(tz).date_naive()
    }

    pub fn generated_on(&self, tz: &FixedOffset) -> NaiveDate {
        self.prediction_generation_time.with_timezone(tz).date_naive()
    }

    /// The team the model picked against.
    pub fn predicted_loser(&self) -> &str {
        match self.predicted_winner_location {
            Side::Home => &self.away,
            Side::Away => &self.home,
        }
    }

    /// `(winner_odds, loser_odds)` for the given actual winner, if both sides are priced.
    pub fn odds_for_winner(&self, winner: &str) -> Option<(i32, i32)> {
        let (home, away) = (self.home_odds?, self.away_odds?);
        if winner == self.home {
            Some((home, away))
        } else if winner == self.away {
            Some((away, home))
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborator payloads
// ---------------------------------------------------------------------------

/// One scheduled game with its best available moneyline per team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub home_team: String,
    pub away_team: String,
    pub commence_time: DateTime<FixedOffset>,
    /// Display start time in the schedule timezone, e.g. `7:10 PM`.
    pub time: String,
    pub favorite: Option<String>,
    /// team name → American odds
    pub odds: HashMap<String, i32>,
    /// team name → bookmaker offering those odds
    pub bookmakers: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixtureBatch {
    pub fixtures: Vec<Fixture>,
    pub retrieved_at: DateTime<FixedOffset>,
}

/// Game metadata the model service returns alongside its pick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameInfo {
    pub game_id: u64,
    pub date: NaiveDate,
    pub datetime: DateTime<FixedOffset>,
    pub home: String,
    pub away: String,
    #[serde(default)]
    pub home_probable: Option<String>,
    #[serde(default)]
    pub away_probable: Option<String>,
    #[serde(default)]
    pub venue: String,
    #[serde(default)]
    pub series_status: Option<String>,
    #[serde(default)]
    pub national_broadcasts: Option<String>,
}

/// Model output. `winner == None` means the model declined to predict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub winner: Option<String>,
    pub confidence: f64,
    pub info: GameInfo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameStatus {
    /// Played to an end: `Final`, `Final: Tied`, `Game Over`, `Completed Early`.
    Final,
    /// Called off for good. Never produces a winner.
    Cancelled,
    /// Anything still open, including `Postponed` (the gamePk is reused on reschedule).
    Other(String),
}

impl GameStatus {
    pub fn from_detailed_state(s: &str) -> Self {
        let state = s.trim().to_ascii_lowercase();
        let is = |prefix: &str| state == prefix || state.starts_with(&format!("{prefix}:"));
        if is("final") || is("game over") || is("completed early") {
            GameStatus::Final
        } else if is("cancelled") || is("canceled") {
            GameStatus::Cancelled
        } else {
            GameStatus::Other(s.to_string())
        }
    }

    /// No further change is coming for this game.
    pub fn is_concluded(&self) -> bool {
        matches!(self, GameStatus::Final | GameStatus::Cancelled)
    }
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameStatus::Final => write!(f, "Final"),
            GameStatus::Cancelled => write!(f, "Cancelled"),
            GameStatus::Other(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameResult {
    pub game_id: u64,
    pub status: GameStatus,
    pub winner: Option<String>,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub winning_pitcher: Option<String>,
    pub losing_pitcher: Option<String>,
    pub summary: String,
}

// ---------------------------------------------------------------------------
// Control channel
// ---------------------------------------------------------------------------

/// Operator requests routed to the main control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMsg {
    SwitchModel(ModelId),
    Shutdown,
}
