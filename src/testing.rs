//! Shared fixtures and in-memory collaborators for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::error::{AppError, Result};
use crate::sources::{OddsSource, Predictor, Publisher, ResultsSource};
use crate::types::{
    Fixture, FixtureBatch, GameInfo, GameResult, GameStatus, ModelId, Prediction,
    PredictionRecord, Side,
};

pub fn edt() -> FixedOffset {
    FixedOffset::west_opt(4 * 3600).unwrap()
}

/// Top of the hour `h` on the given day, Eastern daylight time.
pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<FixedOffset> {
    edt().with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

/// Pending pick on the home team for an evening game on 2026-10-18.
pub fn record(game_id: u64, home: &str, away: &str) -> PredictionRecord {
    PredictionRecord {
        prediction_accuracy: None,
        date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        time: "7:10 PM".to_string(),
        home: home.to_string(),
        home_probable: None,
        away: away.to_string(),
        away_probable: None,
        predicted_winner: home.to_string(),
        predicted_winner_location: Side::Home,
        model: "mlb3year".to_string(),
        favorite: Some(home.to_string()),
        home_odds: Some(-150),
        home_odds_bookmaker: Some("FanDuel".to_string()),
        away_odds: Some(130),
        away_odds_bookmaker: Some("FanDuel".to_string()),
        home_score: None,
        away_score: None,
        winning_pitcher: None,
        losing_pitcher: None,
        prediction_value: 0.62,
        venue: String::new(),
        series_status: None,
        national_broadcasts: None,
        odds_retrieval_time: Some(at(2026, 10, 18, 7)),
        prediction_generation_time: at(2026, 10, 18, 7),
        datetime: at(2026, 10, 18, 19),
        game_id,
        summary: None,
        tweet: None,
        time_to_tweet: Some(at(2026, 10, 18, 18)),
        tweeted: false,
    }
}

pub fn final_result(game_id: u64, winner: Option<&str>) -> GameResult {
    GameResult {
        game_id,
        status: GameStatus::Final,
        winner: winner.map(str::to_string),
        home_score: Some(5),
        away_score: Some(3),
        winning_pitcher: Some("Winner Pitcher".to_string()),
        losing_pitcher: Some("Loser Pitcher".to_string()),
        summary: format!("2026-10-18 - game {game_id} (Final)"),
    }
}

pub fn fixture(home: &str, away: &str) -> Fixture {
    Fixture {
        home_team: home.to_string(),
        away_team: away.to_string(),
        commence_time: at(2026, 10, 18, 19),
        time: "7:10 PM".to_string(),
        favorite: Some(home.to_string()),
        odds: HashMap::from([(home.to_string(), -150), (away.to_string(), 130)]),
        bookmakers: HashMap::from([
            (home.to_string(), "FanDuel".to_string()),
            (away.to_string(), "FanDuel".to_string()),
        ]),
    }
}

pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

// ---------------------------------------------------------------------------
// Fake collaborators
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeResults {
    results: HashMap<u64, GameResult>,
    failing: HashSet<u64>,
    lookups: AtomicUsize,
}

impl FakeResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, result: GameResult) -> Self {
        self.results.insert(result.game_id, result);
        self
    }

    pub fn failing(mut self, game_id: u64) -> Self {
        self.failing.insert(game_id);
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResultsSource for FakeResults {
    async fn lookup(&self, game_id: u64) -> Result<GameResult> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&game_id) {
            return Err(AppError::collaborator("results", "connection reset"));
        }
        self.results
            .get(&game_id)
            .cloned()
            .ok_or_else(|| AppError::collaborator("results", format!("no game {game_id}")))
    }
}

pub struct FakeOdds {
    fixtures: Vec<Fixture>,
    calls: AtomicUsize,
}

impl FakeOdds {
    pub fn new(fixtures: Vec<Fixture>) -> Self {
        Self { fixtures, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OddsSource for FakeOdds {
    async fn todays_fixtures(&self, _date: NaiveDate) -> Result<FixtureBatch> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Let a concurrent caller run while this one holds the store lock.
        tokio::task::yield_now().await;
        Ok(FixtureBatch { fixtures: self.fixtures.clone(), retrieved_at: at(2026, 10, 18, 7) })
    }
}

enum Answer {
    Pick { game_id: u64, winner: String },
    Decline { game_id: u64 },
    Fail,
}

/// Answers keyed by home team.
#[derive(Default)]
pub struct FakePredictor {
    answers: HashMap<String, Answer>,
    calls: AtomicUsize,
}

impl FakePredictor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn picks(mut self, home: &str, game_id: u64, winner: &str) -> Self {
        self.answers
            .insert(home.to_string(), Answer::Pick { game_id, winner: winner.to_string() });
        self
    }

    pub fn declines(mut self, home: &str, game_id: u64) -> Self {
        self.answers.insert(home.to_string(), Answer::Decline { game_id });
        self
    }

    pub fn failing(mut self, home: &str) -> Self {
        self.answers.insert(home.to_string(), Answer::Fail);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn opponent(home: &str) -> &'static str {
    match home {
        "Mets" => "Braves",
        "Cubs" => "Reds",
        "Giants" => "Padres",
        "Yankees" => "Red Sox",
        _ => "Visitors",
    }
}

fn info(game_id: u64, home: &str) -> GameInfo {
    GameInfo {
        game_id,
        date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        datetime: at(2026, 10, 18, 19),
        home: home.to_string(),
        away: opponent(home).to_string(),
        home_probable: None,
        away_probable: None,
        venue: String::new(),
        series_status: None,
        national_broadcasts: None,
    }
}

#[async_trait]
impl Predictor for FakePredictor {
    async fn predict(&self, _model: ModelId, home_team: &str) -> Result<Prediction> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.answers.get(home_team) {
            Some(Answer::Pick { game_id, winner }) => Ok(Prediction {
                winner: Some(winner.clone()),
                confidence: 0.62,
                info: info(*game_id, home_team),
            }),
            Some(Answer::Decline { game_id }) => {
                Ok(Prediction { winner: None, confidence: 0.0, info: info(*game_id, home_team) })
            }
            Some(Answer::Fail) | None => Err(AppError::collaborator("model service", "500")),
        }
    }
}

/// Keeps every published message; optionally refuses them all.
#[derive(Default)]
pub struct RecordingPublisher {
    sent: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { sent: Mutex::new(Vec::new()), fail: true }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(AppError::collaborator("publisher", "rate limited"));
        }
        Ok(())
    }
}
