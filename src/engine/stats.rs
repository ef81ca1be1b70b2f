use serde::Serialize;

/// A correct pick on a team the market priced as an underdog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Upset {
    pub winner: String,
    pub winner_odds: i32,
    pub loser: String,
    pub loser_odds: i32,
}

/// Counters for one reconciliation pass. Built fresh every pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStatistics {
    pub correct_count: u32,
    pub wrong_count: u32,
    pub biggest_upset: Option<Upset>,
    /// Odds-implied margin of `biggest_upset`; 0 while there is none.
    pub upset_margin: i32,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a correct pick. `odds` is `(winner_odds, loser_odds)` when both sides were priced.
    pub fn record_correct(&mut self, winner: &str, loser: &str, odds: Option<(i32, i32)>) {
        self.correct_count += 1;

        let Some((winner_odds, loser_odds)) = odds else { return };
        let margin = odds_margin(winner_odds, loser_odds);
        if margin > self.upset_margin && winner_odds > 100 {
            self.upset_margin = margin;
            self.biggest_upset = Some(Upset {
                winner: winner.to_string(),
                winner_odds,
                loser: loser.to_string(),
                loser_odds,
            });
        }
    }

    pub fn record_wrong(&mut self) {
        self.wrong_count += 1;
    }

    pub fn total(&self) -> u32 {
        self.correct_count + self.wrong_count
    }

    /// Accuracy as a whole percent. `None` with nothing counted.
    pub fn accuracy_pct(&self) -> Option<u32> {
        accuracy_pct(self.correct_count, self.total())
    }
}

/// `(|w| - 100) + (|l| - 100)`: distance of both prices from even money.
pub fn odds_margin(winner_odds: i32, loser_odds: i32) -> i32 {
    (winner_odds.abs() - 100) + (loser_odds.abs() - 100)
}

/// `correct / total` rounded to a whole percent. Exact ties go to the even
/// percent (1/8 is 12%, 3/8 is 38%). `None` when `total == 0`.
pub fn accuracy_pct(correct: u32, total: u32) -> Option<u32> {
    if total == 0 {
        return None;
    }
    let (correct, total) = (u64::from(correct), u64::from(total));
    let (pct, rem) = ((100 * correct) / total, (100 * correct) % total);
    let round_up = match (2 * rem).cmp(&total) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Equal => pct % 2 == 1,
        std::cmp::Ordering::Less => false,
    };
    Some((pct + u64::from(round_up)) as u32)
}
