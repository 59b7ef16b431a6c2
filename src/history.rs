use chrono::{DateTime, Utc};

use crate::util::{accuracy_percent, mean, round_tenth};

/// Runs averaged into each trend point unless the caller says otherwise
pub const DEFAULT_WINDOW: usize = 5;

/// A persisted run as returned by a history query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PastRun {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub score: u32,
    pub attempted: u32,
    pub correct: u32,
}

impl PastRun {
    pub fn accuracy(&self) -> u32 {
        accuracy_percent(self.correct, self.attempted)
    }
}

/// One point of the score trend
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryPoint {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub raw_score: u32,
    pub windowed_average: f64,
}

/// Turns an unordered set of runs into a chronological trend with a trailing
/// moving average over the last `window_size` runs (rounded to one decimal).
///
/// Runs sharing a timestamp are ordered by id and then by their counters so
/// the output never depends on input order. A `window_size` of zero is
/// treated as one.
pub fn build_history(runs: &[PastRun], window_size: usize) -> Vec<HistoryPoint> {
    let window_size = window_size.max(1);
    let mut sorted: Vec<&PastRun> = runs.iter().collect();
    sorted.sort_by_key(|r| (r.timestamp, r.id, r.score, r.attempted, r.correct));

    let scores: Vec<f64> = sorted.iter().map(|r| f64::from(r.score)).collect();

    sorted
        .iter()
        .enumerate()
        .map(|(i, run)| {
            let start = (i + 1).saturating_sub(window_size);
            let avg = mean(&scores[start..=i]).unwrap_or_default();
            HistoryPoint {
                id: run.id,
                timestamp: run.timestamp,
                raw_score: run.score,
                windowed_average: round_tenth(avg),
            }
        })
        .collect()
}
