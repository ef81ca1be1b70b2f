use crate::engine::stats::RunStatistics;
use crate::types::PredictionRecord;

/// American odds with an explicit sign: `+150`, `-180`.
pub fn fmt_odds(odds: i32) -> String {
    format!("{odds:+}")
}

/// `"{correct}/{total} correct ({pct}%)"`, plus the biggest upset when there was one.
/// `None` when the pass resolved nothing.
pub fn summary_text(stats: &RunStatistics) -> Option<String> {
    let pct = stats.accuracy_pct()?;
    let mut text = format!("{}/{} correct ({pct}%)", stats.correct_count, stats.total());

    if let Some(upset) = &stats.biggest_upset {
        text.push_str(&format!(
            " Biggest upset: {} ({}) over {} ({}).",
            upset.winner,
            fmt_odds(upset.winner_odds),
            upset.loser,
            fmt_odds(upset.loser_odds),
        ));
    }
    Some(text)
}

/// Pre-game pick for one record.
pub fn announcement_text(record: &PredictionRecord) -> String {
    let mut text = format!("{} @ {}, {}", record.away, record.home, record.time);
    if !record.venue.is_empty() {
        text.push_str(&format!(" at {}", record.venue));
    }
    text.push_str(&format!(
        ". Pick: {} (confidence {:.2}).",
        record.predicted_winner, record.prediction_value
    ));

    if let (Some(away), Some(home)) = (record.away_odds, record.home_odds) {
        text.push_str(&format!(
            " Odds: {} {}, {} {}.",
            record.away,
            fmt_odds(away),
            record.home,
            fmt_odds(home)
        ));
    }
    if let (Some(away), Some(home)) = (&record.away_probable, &record.home_probable) {
        text.push_str(&format!(" Probables: {away} vs {home}."));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::stats::Upset;
    use crate::testing::record;

    #[test]
    fn plain_summary() {
        let mut stats = RunStatistics::new();
        stats.record_correct("Mets", "Braves", None);
        assert_eq!(summary_text(&stats).unwrap(), "1/1 correct (100%)");
    }

    #[test]
    fn summary_with_upset() {
        let mut stats = RunStatistics::new();
        stats.record_wrong();
        stats.biggest_upset = Some(Upset {
            winner: "Padres".to_string(),
            winner_odds: 150,
            loser: "Dodgers".to_string(),
            loser_odds: -180,
        });
        stats.correct_count = 2;
        assert_eq!(
            summary_text(&stats).unwrap(),
            "2/3 correct (67%) Biggest upset: Padres (+150) over Dodgers (-180)."
        );
    }

    #[test]
    fn nothing_resolved_means_no_summary() {
        assert!(summary_text(&RunStatistics::new()).is_none());
    }

    #[test]
    fn announcement_mentions_pick_odds_and_starters() {
        let mut rec = record(11, "Mets", "Braves");
        rec.venue = "Citi Field".to_string();
        rec.home_probable = Some("Kodai Senga".to_string());
        rec.away_probable = Some("Max Fried".to_string());
        rec.prediction_value = 0.615;

        assert_eq!(
            announcement_text(&rec),
            "Braves @ Mets, 7:10 PM at Citi Field. Pick: Mets (confidence 0.61). \
             Odds: Braves +130, Mets -150. Probables: Max Fried vs Kodai Senga."
        );
    }
}
