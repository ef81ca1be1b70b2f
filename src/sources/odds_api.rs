use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::sources::{http_client, OddsSource};
use crate::types::{Fixture, FixtureBatch};

const SPORT_KEY: &str = "baseball_mlb";

// ── Odds API response types ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct OddsEvent {
    commence_time: DateTime<Utc>,
    home_team: String,
    away_team: String,
    #[serde(default)]
    bookmakers: Vec<Bookmaker>,
}

#[derive(Debug, Deserialize)]
struct Bookmaker {
    title: String,
    #[serde(default)]
    markets: Vec<Market>,
}

#[derive(Debug, Deserialize)]
struct Market {
    key: String,
    outcomes: Vec<Outcome>,
}

#[derive(Debug, Deserialize)]
struct Outcome {
    name: String,
    price: f64,
}

// ── Client ────────────────────────────────────────────────────────────────────

/// The Odds API v4, h2h market, American odds.
pub struct OddsApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    tz: FixedOffset,
}

impl OddsApiClient {
    pub fn new(base_url: String, api_key: Option<String>, tz: FixedOffset) -> Result<Self> {
        Ok(Self { client: http_client()?, base_url, api_key, tz })
    }
}

#[async_trait]
impl OddsSource for OddsApiClient {
    async fn todays_fixtures(&self, date: NaiveDate) -> Result<FixtureBatch> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Config("ODDS_API_KEY is not set".to_string()))?;

        let url = format!("{}/sports/{SPORT_KEY}/odds", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("apiKey", api_key),
                ("regions", "us"),
                ("markets", "h2h"),
                ("oddsFormat", "american"),
            ])
            .send()
            .await?
            .error_for_status()?;

        if let Some(remaining) = resp.headers().get("x-requests-remaining") {
            debug!("Odds API requests remaining: {:?}", remaining);
        }

        let events: Vec<OddsEvent> = resp.json().await?;
        let retrieved_at = Utc::now().with_timezone(&self.tz);
        let fixtures = fixtures_for_date(events, date, &self.tz);
        info!(date = %date, fixtures = fixtures.len(), "Fetched today's odds");

        Ok(FixtureBatch { fixtures, retrieved_at })
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

fn fixtures_for_date(events: Vec<OddsEvent>, date: NaiveDate, tz: &FixedOffset) -> Vec<Fixture> {
    events
        .into_iter()
        .filter(|e| e.commence_time.with_timezone(tz).date_naive() == date)
        .map(|e| to_fixture(e, tz))
        .collect()
}

fn to_fixture(event: OddsEvent, tz: &FixedOffset) -> Fixture {
    let mut odds: HashMap<String, i32> = HashMap::new();
    let mut bookmakers: HashMap<String, String> = HashMap::new();

    // Best (highest) American price per team across every bookmaker.
    for book in &event.bookmakers {
        for market in book.markets.iter().filter(|m| m.key == "h2h") {
            for outcome in &market.outcomes {
                let price = outcome.price.round() as i32;
                let better = odds.get(&outcome.name).map_or(true, |&best| price > best);
                if better {
                    odds.insert(outcome.name.clone(), price);
                    bookmakers.insert(outcome.name.clone(), book.title.clone());
                }
            }
        }
    }

    let favorite = match (odds.get(&event.home_team), odds.get(&event.away_team)) {
        (Some(h), Some(a)) if h < a => Some(event.home_team.clone()),
        (Some(h), Some(a)) if a < h => Some(event.away_team.clone()),
        _ => None,
    };

    let commence_time = event.commence_time.with_timezone(tz);
    Fixture {
        time: commence_time.format("%-I:%M %p").to_string(),
        commence_time,
        home_team: event.home_team,
        away_team: event.away_team,
        favorite,
        odds,
        bookmakers,
    }
}
