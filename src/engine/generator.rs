use std::collections::HashSet;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::sources::{OddsSource, Predictor};
use crate::store::StoreGuard;
use crate::types::{Fixture, ModelId, Prediction, PredictionRecord, Side};

/// Records for the target date, and whether this call produced them.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub date: NaiveDate,
    pub records: Vec<PredictionRecord>,
    /// False when an earlier run for the same date was reused as-is.
    pub freshly_generated: bool,
    /// Fixtures the model declined to predict.
    pub declined: usize,
    /// Fixtures skipped because the model call failed or answered nonsense.
    pub failed: usize,
}

/// Inputs that stay fixed for one generation call.
pub struct GenerationRequest<'a> {
    pub model: ModelId,
    pub target: NaiveDate,
    pub now: DateTime<FixedOffset>,
    pub tz: &'a FixedOffset,
    pub announce_lead: Duration,
}

enum Prior {
    /// A completed run for the date exists; hand it back untouched.
    Reuse(Vec<PredictionRecord>),
    /// Nothing usable; `stale` rows for the date are dropped before regenerating.
    Regenerate { stale: usize },
}

fn prior_run(records: &[PredictionRecord], date: NaiveDate, tz: &FixedOffset) -> Prior {
    let for_date: Vec<&PredictionRecord> =
        records.iter().filter(|r| r.event_date(tz) == date).collect();

    let completed: Vec<PredictionRecord> = for_date
        .iter()
        .filter(|r| r.generated_on(tz) == date)
        .map(|r| (*r).clone())
        .collect();

    if completed.is_empty() {
        Prior::Regenerate { stale: for_date.len() }
    } else {
        Prior::Reuse(completed)
    }
}

/// Generate today's predictions at most once per date.
///
/// Must be called with the store lock held for the whole span; the caller's guard is
/// used for both the dedup read and the final save.
pub async fn generate_daily_predictions(
    store: &StoreGuard<'_>,
    odds: &dyn OddsSource,
    predictor: &dyn Predictor,
    req: &GenerationRequest<'_>,
) -> Result<GenerationOutcome> {
    let today = req.now.with_timezone(req.tz).date_naive();
    if req.target != today {
        return Err(AppError::UnsupportedDate { requested: req.target, today });
    }

    let mut table = store.load()?;
    match prior_run(&table, req.target, req.tz) {
        Prior::Reuse(records) => {
            info!(
                date = %req.target,
                count = records.len(),
                "Predictions already generated for this date, reusing them"
            );
            return Ok(GenerationOutcome {
                date: req.target,
                records,
                freshly_generated: false,
                declined: 0,
                failed: 0,
            });
        }
        Prior::Regenerate { stale } if stale > 0 => {
            warn!(date = %req.target, stale, "Dropping rows from an incomplete earlier run");
            table.retain(|r| r.event_date(req.tz) != req.target);
        }
        Prior::Regenerate { .. } => {}
    }

    let batch = odds.todays_fixtures(req.target).await?;
    info!(
        date = %req.target,
        model = %req.model,
        fixtures = batch.fixtures.len(),
        "Making predictions"
    );

    let mut seen: HashSet<u64> = table.iter().map(|r| r.game_id).collect();
    let mut fresh = Vec::new();
    let (mut declined, mut failed) = (0usize, 0usize);

    for fixture in &batch.fixtures {
        let prediction = match predictor.predict(req.model, &fixture.home_team).await {
            Ok(p) => p,
            Err(e) => {
                warn!(
                    home = %fixture.home_team,
                    op = "predict",
                    "Model call failed, skipping fixture: {e}"
                );
                failed += 1;
                continue;
            }
        };

        if prediction.winner.is_none() {
            debug!(home = %fixture.home_team, "Model declined to predict");
            declined += 1;
            continue;
        }

        if !seen.insert(prediction.info.game_id) {
            debug!(game_id = prediction.info.game_id, "Game already has a prediction, skipping");
            continue;
        }

        match build_record(fixture, prediction, req, batch.retrieved_at) {
            Some(record) => {
                info!(
                    game_id = record.game_id,
                    "{} @ {}: picking {}",
                    record.away,
                    record.home,
                    record.predicted_winner
                );
                fresh.push(record);
            }
            None => failed += 1,
        }
    }

    table.extend(fresh.iter().cloned());
    store.save(&table)?;
    info!(date = %req.target, generated = fresh.len(), declined, failed, "Predictions saved");

    Ok(GenerationOutcome {
        date: req.target,
        records: fresh,
        freshly_generated: true,
        declined,
        failed,
    })
}

fn build_record(
    fixture: &Fixture,
    prediction: Prediction,
    req: &GenerationRequest<'_>,
    odds_time: DateTime<FixedOffset>,
) -> Option<PredictionRecord> {
    let Prediction { winner, confidence, info } = prediction;
    let winner = winner?;

    let location = if winner == info.home {
        Side::Home
    } else if winner == info.away {
        Side::Away
    } else {
        warn!(
            game_id = info.game_id,
            winner = %winner,
            "Model picked a team that is not playing, skipping"
        );
        return None;
    };

    Some(PredictionRecord {
        prediction_accuracy: None,
        date: info.date,
        time: fixture.time.clone(),
        home_odds: fixture.odds.get(&info.home).copied(),
        home_odds_bookmaker: fixture.bookmakers.get(&info.home).cloned(),
        away_odds: fixture.odds.get(&info.away).copied(),
        away_odds_bookmaker: fixture.bookmakers.get(&info.away).cloned(),
        home: info.home,
        home_probable: info.home_probable,
        away: info.away,
        away_probable: info.away_probable,
        predicted_winner: winner,
        predicted_winner_location: location,
        model: req.model.to_string(),
        favorite: fixture.favorite.clone(),
        home_score: None,
        away_score: None,
        winning_pitcher: None,
        losing_pitcher: None,
        prediction_value: confidence,
        venue: info.venue,
        series_status: info.series_status,
        national_broadcasts: info.national_broadcasts,
        odds_retrieval_time: Some(odds_time),
        prediction_generation_time: req.now,
        datetime: info.datetime,
        game_id: info.game_id,
        summary: None,
        tweet: None,
        time_to_tweet: Some(info.datetime - req.announce_lead),
        tweeted: false,
    })
}
