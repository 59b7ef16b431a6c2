use chrono::{TimeZone, Utc};

use mathdash::config::MODE;
use mathdash::{build_history, HistoryQuery, RunStore, RunSummary, SqliteRunStore};

fn summary(key: &str, score: u32) -> RunSummary {
    RunSummary {
        mode: MODE.to_string(),
        configuration_key: key.to_string(),
        score,
        attempted: score + 2,
        correct: score,
    }
}

#[test]
fn stored_runs_feed_the_trend_line() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("runs.db");
    let key = "+*|a:2-100,2-100|m:2-12,2-100|t:60";

    {
        let mut store = SqliteRunStore::open(&db).unwrap();
        // saved out of chronological order on purpose
        for (minute, score) in [(3, 14), (1, 10), (2, 20)] {
            let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, minute, 0).unwrap();
            store.save_at(&summary(key, score), at).unwrap();
        }
        // another scope must not leak in
        store.save(&summary("+|a:2-100,2-100|m:2-12,2-100|t:30", 99)).unwrap();
    }

    let store = SqliteRunStore::open(&db).unwrap();
    let runs = store
        .query(&HistoryQuery {
            mode: MODE.to_string(),
            configuration_key: key.to_string(),
            limit: 50,
        })
        .unwrap();
    assert_eq!(runs.len(), 3);
    assert_eq!(store.best_score(MODE, key).unwrap(), 20);

    let history = build_history(&runs, 2);
    let raw: Vec<u32> = history.iter().map(|p| p.raw_score).collect();
    let averages: Vec<f64> = history.iter().map(|p| p.windowed_average).collect();
    assert_eq!(raw, vec![10, 20, 14]);
    assert_eq!(averages, vec![10.0, 15.0, 17.0]);
}

#[test]
fn query_limit_keeps_most_recent_runs() {
    let mut store = SqliteRunStore::open_in_memory().unwrap();
    let key = "*|a:2-100,2-100|m:2-12,2-100|t:30";
    for minute in 0..10 {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, 0).unwrap();
        store.save_at(&summary(key, minute), at).unwrap();
    }

    let runs = store
        .query(&HistoryQuery {
            mode: MODE.to_string(),
            configuration_key: key.to_string(),
            limit: 3,
        })
        .unwrap();
    let history = build_history(&runs, 5);
    let raw: Vec<u32> = history.iter().map(|p| p.raw_score).collect();
    assert_eq!(raw, vec![7, 8, 9]);
}
