use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::sources::{http_client, ResultsSource};
use crate::types::{GameResult, GameStatus};

#[derive(Debug, Deserialize)]
struct ScheduleResponse {
    #[serde(default)]
    dates: Vec<ScheduleDate>,
}

#[derive(Debug, Deserialize)]
struct ScheduleDate {
    #[serde(default)]
    games: Vec<ScheduleGame>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleGame {
    game_pk: u64,
    official_date: String,
    status: Status,
    teams: Teams,
    #[serde(default)]
    decisions: Option<Decisions>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Status {
    detailed_state: String,
}

#[derive(Debug, Deserialize)]
struct Teams {
    home: TeamSide,
    away: TeamSide,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeamSide {
    team: TeamRef,
    #[serde(default)]
    score: Option<u32>,
    #[serde(default)]
    is_winner: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct TeamRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Decisions {
    winner: Option<Person>,
    loser: Option<Person>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Person {
    full_name: String,
}

/// MLB Stats API schedule lookup by `gamePk`.
pub struct MlbStatsClient {
    client: reqwest::Client,
    base_url: String,
}

impl MlbStatsClient {
    pub fn new(base_url: String) -> Result<Self> {
        Ok(Self { client: http_client()?, base_url })
    }
}

#[async_trait]
impl ResultsSource for MlbStatsClient {
    async fn lookup(&self, game_id: u64) -> Result<GameResult> {
        let url = format!("{}/schedule", self.base_url.trim_end_matches('/'));
        let resp: ScheduleResponse = self
            .client
            .get(&url)
            .query(&[
                ("sportId", "1".to_string()),
                ("gamePk", game_id.to_string()),
                ("hydrate", "decisions".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        to_result(resp, game_id)
    }
}

fn to_result(resp: ScheduleResponse, game_id: u64) -> Result<GameResult> {
    let game = resp
        .dates
        .into_iter()
        .flat_map(|d| d.games)
        .find(|g| g.game_pk == game_id)
        .ok_or_else(|| AppError::collaborator("MLB Stats API", format!("game {game_id} not found")))?;

    let status = GameStatus::from_detailed_state(&game.status.detailed_state);
    let home = &game.teams.home;
    let away = &game.teams.away;

    let winner = if status == GameStatus::Final {
        match (home.is_winner, away.is_winner) {
            (Some(true), _) => Some(home.team.name.clone()),
            (_, Some(true)) => Some(away.team.name.clone()),
            _ => None,
        }
    } else {
        None
    };

    let score = |s: Option<u32>| s.map(|v| v.to_string()).unwrap_or_default();
    let summary = format!(
        "{} - {} ({}) @ {} ({}) ({})",
        game.official_date,
        away.team.name,
        score(away.score),
        home.team.name,
        score(home.score),
        game.status.detailed_state,
    );

    let (winning_pitcher, losing_pitcher) = match game.decisions {
        Some(d) => (d.winner.map(|p| p.full_name), d.loser.map(|p| p.full_name)),
        None => (None, None),
    };

    Ok(GameResult {
        game_id,
        status,
        winner,
        home_score: home.score,
        away_score: away.score,
        winning_pitcher,
        losing_pitcher,
        summary,
    })
}
