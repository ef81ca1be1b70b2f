use chrono::{DateTime, Duration, FixedOffset};
use futures_util::{stream, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::engine::stats::RunStatistics;
use crate::sources::ResultsSource;
use crate::types::{GameResult, PredictionRecord, RecordState};

/// What one reconciliation pass did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub stats: RunStatistics,
    /// Rows that were due and looked up.
    pub checked: usize,
    pub reconciled: usize,
    pub indeterminate: usize,
    /// Looked up, but the game is not final yet.
    pub still_pending: usize,
    /// game_ids whose lookup failed; they stay pending for the next pass.
    pub failed: Vec<u64>,
}

/// Result lookups in flight at once.
const LOOKUP_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Correct,
    Wrong,
    Indeterminate,
}

/// A pending row is due once `lead` has passed since first pitch.
pub fn is_due(record: &PredictionRecord, now: DateTime<FixedOffset>, lead: Duration) -> bool {
    record.state() == RecordState::Pending && record.datetime + lead <= now
}

/// Resolve every due row in place. Resolved rows are never touched, and a failed
/// lookup only affects its own row.
pub async fn reconcile(
    records: &mut [PredictionRecord],
    results: &dyn ResultsSource,
    now: DateTime<FixedOffset>,
    lead: Duration,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    let due: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| is_due(r, now, lead))
        .map(|(i, _)| i)
        .collect();
    let ids: Vec<u64> = due.iter().map(|&i| records[i].game_id).collect();
    let lookups: Vec<_> = stream::iter(ids)
        .map(|id| results.lookup(id))
        .buffered(LOOKUP_CONCURRENCY)
        .collect()
        .await;

    for (idx, lookup) in due.into_iter().zip(lookups) {
        let record = &mut records[idx];
        report.checked += 1;

        let result = match lookup {
            Ok(r) => r,
            Err(e) => {
                warn!(game_id = record.game_id, op = "result_lookup", "Result lookup failed: {e}");
                report.failed.push(record.game_id);
                continue;
            }
        };

        if !result.status.is_concluded() {
            debug!(game_id = record.game_id, status = %result.status, "Game not over yet");
            report.still_pending += 1;
            continue;
        }

        match apply_result(record, &result) {
            Resolution::Correct => {
                let winner = record.predicted_winner.clone();
                let loser = record.predicted_loser().to_string();
                let odds = record.odds_for_winner(&winner);
                report.stats.record_correct(&winner, &loser, odds);
                report.reconciled += 1;
                info!(
                    game_id = record.game_id,
                    "Correct! Predicted {} defeated the {}.", winner, loser
                );
            }
            Resolution::Wrong => {
                report.stats.record_wrong();
                report.reconciled += 1;
                info!(
                    game_id = record.game_id,
                    "Wrong! Predicted {} lost to the {}.",
                    record.predicted_winner,
                    result.winner.as_deref().unwrap_or("?"),
                );
            }
            Resolution::Indeterminate => {
                report.indeterminate += 1;
                info!(game_id = record.game_id, "Game final without a winner: {}", result.summary);
            }
        }
    }

    report
}

/// Copy a final result into the row and score the pick.
fn apply_result(record: &mut PredictionRecord, result: &GameResult) -> Resolution {
    let resolution = match result.winner.as_deref() {
        Some(w) if w == record.predicted_winner => Resolution::Correct,
        Some(_) => Resolution::Wrong,
        None => Resolution::Indeterminate,
    };

    record.prediction_accuracy = match resolution {
        Resolution::Correct => Some(1.0),
        Resolution::Wrong => Some(0.0),
        Resolution::Indeterminate => None,
    };
    record.home_score = result.home_score;
    record.away_score = result.away_score;
    record.winning_pitcher = result.winning_pitcher.clone();
    record.losing_pitcher = result.losing_pitcher.clone();
    // A populated summary is what marks an indeterminate row as terminal.
    record.summary = Some(if result.summary.trim().is_empty() {
        format!("{} @ {} ({})", record.away, record.home, result.status)
    } else {
        result.summary.clone()
    });

    resolution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, final_result, record, FakeResults};
    use crate::types::GameStatus;

    fn six_hours() -> Duration {
        Duration::hours(6)
    }

    #[tokio::test]
    async fn correct_pick_is_scored_and_filled_in() {
        let mut rows = vec![record(1, "Mets", "Braves")];
        let results = FakeResults::new().with(final_result(1, Some("Mets")));

        let report = reconcile(&mut rows, &results, at(2026, 10, 19, 7), six_hours()).await;

        assert_eq!(report.stats.correct_count, 1);
        assert_eq!(report.reconciled, 1);
        assert_eq!(rows[0].prediction_accuracy, Some(1.0));
        assert_eq!(rows[0].home_score, Some(5));
        assert_eq!(rows[0].winning_pitcher.as_deref(), Some("Winner Pitcher"));
        assert!(rows[0].summary.is_some());
    }

    #[tokio::test]
    async fn wrong_pick_scores_zero() {
        let mut rows = vec![record(1, "Mets", "Braves")];
        let results = FakeResults::new().with(final_result(1, Some("Braves")));

        let report = reconcile(&mut rows, &results, at(2026, 10, 19, 7), six_hours()).await;

        assert_eq!(report.stats.wrong_count, 1);
        assert_eq!(rows[0].prediction_accuracy, Some(0.0));
    }

    #[tokio::test]
    async fn game_not_final_is_left_alone() {
        let mut rows = vec![record(1, "Mets", "Braves")];
        let before = rows.clone();
        let mut live = final_result(1, None);
        live.status = GameStatus::Other("In Progress".to_string());
        let results = FakeResults::new().with(live);

        let report = reconcile(&mut rows, &results, at(2026, 10, 19, 7), six_hours()).await;

        assert_eq!(report.still_pending, 1);
        assert_eq!(rows, before);
    }

    #[tokio::test]
    async fn final_without_winner_is_terminal_but_unscored() {
        let mut rows = vec![record(1, "Mets", "Braves")];
        let results = FakeResults::new().with(final_result(1, None));

        let report = reconcile(&mut rows, &results, at(2026, 10, 19, 7), six_hours()).await;
        assert_eq!(report.indeterminate, 1);
        assert_eq!(report.stats.total(), 0);
        assert_eq!(rows[0].prediction_accuracy, None);
        assert_eq!(rows[0].state(), RecordState::Indeterminate);

        // A later pass does not look it up again.
        let again = reconcile(&mut rows, &results, at(2026, 10, 20, 7), six_hours()).await;
        assert_eq!(again.checked, 0);
        assert_eq!(results.lookups(), 1);
    }

    #[tokio::test]
    async fn cancelled_game_settles_as_indeterminate() {
        let mut rows = vec![record(1, "Mets", "Braves")];
        let mut called_off = final_result(1, None);
        called_off.status = GameStatus::Cancelled;
        called_off.home_score = None;
        called_off.away_score = None;
        let results = FakeResults::new().with(called_off);

        let report = reconcile(&mut rows, &results, at(2026, 10, 19, 7), six_hours()).await;

        assert_eq!(report.indeterminate, 1);
        assert_eq!(report.still_pending, 0);
        assert_eq!(rows[0].state(), RecordState::Indeterminate);

        let again = reconcile(&mut rows, &results, at(2026, 10, 20, 7), six_hours()).await;
        assert_eq!(again.checked, 0);
        assert_eq!(results.lookups(), 1);
    }

    #[tokio::test]
    async fn games_inside_the_lead_time_are_skipped() {
        // First pitch 19:00 local; six hours later is 01:00 the next day.
        let mut rows = vec![record(1, "Mets", "Braves")];
        let results = FakeResults::new().with(final_result(1, Some("Mets")));

        let report = reconcile(&mut rows, &results, at(2026, 10, 18, 23), six_hours()).await;
        assert_eq!(report.checked, 0);
        assert_eq!(results.lookups(), 0);

        let report = reconcile(&mut rows, &results, at(2026, 10, 18, 23), Duration::zero()).await;
        assert_eq!(report.checked, 1);
    }

    #[tokio::test]
    async fn resolved_rows_are_never_revisited() {
        let mut done = record(1, "Mets", "Braves");
        done.prediction_accuracy = Some(0.0);
        done.summary = Some("old".to_string());
        let mut rows = vec![done];
        let before = rows.clone();
        let results = FakeResults::new().with(final_result(1, Some("Mets")));

        let report = reconcile(&mut rows, &results, at(2026, 10, 25, 7), six_hours()).await;

        assert_eq!(report.checked, 0);
        assert_eq!(rows, before);
    }

    #[tokio::test]
    async fn one_failed_lookup_does_not_stop_the_batch() {
        let mut rows: Vec<_> = (1..=5).map(|id| record(id, "Mets", "Braves")).collect();
        let mut results = FakeResults::new();
        for id in [1, 2, 4, 5] {
            results = results.with(final_result(id, Some("Mets")));
        }
        let results = results.failing(3);

        let report = reconcile(&mut rows, &results, at(2026, 10, 19, 7), six_hours()).await;

        assert_eq!(report.failed, vec![3]);
        assert_eq!(report.reconciled, 4);
        for row in &rows {
            if row.game_id == 3 {
                assert_eq!(row.state(), RecordState::Pending);
            } else {
                assert_eq!(row.prediction_accuracy, Some(1.0));
            }
        }
    }

    #[tokio::test]
    async fn underdog_win_becomes_the_upset() {
        let mut pick = record(1, "Mets", "Braves");
        pick.predicted_winner = "Braves".to_string();
        pick.predicted_winner_location = crate::types::Side::Away;
        pick.home_odds = Some(-180);
        pick.away_odds = Some(150);
        let mut rows = vec![pick];
        let results = FakeResults::new().with(final_result(1, Some("Braves")));

        let report = reconcile(&mut rows, &results, at(2026, 10, 19, 7), six_hours()).await;

        let upset = report.stats.biggest_upset.unwrap();
        assert_eq!(upset.winner, "Braves");
        assert_eq!(upset.winner_odds, 150);
        assert_eq!(upset.loser, "Mets");
        assert_eq!(upset.loser_odds, -180);
    }
}
