use chrono::{DateTime, SecondsFormat, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

use crate::error::DrillError;
use crate::history::PastRun;

/// Environment variable overriding the database location
pub const DB_PATH_ENV: &str = "MATHDASH_DB";

/// Largest number of runs a single history query returns
pub const MAX_QUERY_LIMIT: usize = 500;

/// What gets persisted at the end of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub mode: String,
    pub configuration_key: String,
    pub score: u32,
    pub attempted: u32,
    pub correct: u32,
}

/// The store's answer to a save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    pub run_id: i64,
    pub is_new_high_score: bool,
    pub best_score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub mode: String,
    pub configuration_key: String,
    pub limit: usize,
}

/// Persistence for finished runs and per-scope high scores. A scope is the
/// pair `(mode, configuration_key)`.
pub trait RunStore: Send {
    fn save(&mut self, summary: &RunSummary) -> Result<SaveOutcome, DrillError>;
    /// Runs for the scope; callers must not rely on the order.
    fn query(&self, query: &HistoryQuery) -> Result<Vec<PastRun>, DrillError>;
    fn best_score(&self, mode: &str, configuration_key: &str) -> Result<u32, DrillError>;
}

/// SQLite-backed store with a `runs` table and a `high_scores` table
#[derive(Debug)]
pub struct SqliteRunStore {
    conn: Connection,
}

impl SqliteRunStore {
    /// `$MATHDASH_DB`, else `runs.db` in the per-user data directory
    pub fn default_path() -> PathBuf {
        if let Some(path) = std::env::var_os(DB_PATH_ENV) {
            return PathBuf::from(path);
        }
        ProjectDirs::from("", "", "mathdash")
            .map(|pd| pd.data_local_dir().join("runs.db"))
            .unwrap_or_else(|| PathBuf::from("mathdash.db"))
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DrillError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DrillError::StoreUnavailable(format!(
                    "failed to create {}: {e}",
                    parent.display()
                ))
            })?;
        }
        log::debug!("opening run store at {}", path.display());
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, DrillError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, DrillError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                mode TEXT NOT NULL,
                config_key TEXT NOT NULL,
                score INTEGER NOT NULL,
                attempted INTEGER NOT NULL,
                correct INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_runs_scope ON runs(mode, config_key);
            CREATE TABLE IF NOT EXISTS high_scores (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mode TEXT NOT NULL,
                config_key TEXT NOT NULL,
                best_score INTEGER NOT NULL,
                best_run_id INTEGER NOT NULL,
                UNIQUE(mode, config_key)
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    /// Save with an explicit timestamp instead of now
    pub fn save_at(
        &mut self,
        summary: &RunSummary,
        created_at: DateTime<Utc>,
    ) -> Result<SaveOutcome, DrillError> {
        let tx = self.conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO runs (created_at, mode, config_key, score, attempted, correct)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                summary.mode,
                summary.configuration_key,
                summary.score,
                summary.attempted,
                summary.correct,
            ],
        )?;
        let run_id = tx.last_insert_rowid();

        let prior: Option<u32> = tx
            .query_row(
                "SELECT best_score FROM high_scores WHERE mode = ?1 AND config_key = ?2",
                params![summary.mode, summary.configuration_key],
                |row| row.get(0),
            )
            .optional()?;

        let outcome = match prior {
            Some(best) if summary.score <= best => SaveOutcome {
                run_id,
                is_new_high_score: false,
                best_score: best,
            },
            _ => {
                tx.execute(
                    r#"
                    INSERT INTO high_scores (mode, config_key, best_score, best_run_id)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(mode, config_key)
                    DO UPDATE SET best_score = excluded.best_score, best_run_id = excluded.best_run_id
                    "#,
                    params![summary.mode, summary.configuration_key, summary.score, run_id],
                )?;
                SaveOutcome {
                    run_id,
                    is_new_high_score: true,
                    best_score: summary.score,
                }
            }
        };

        tx.commit()?;
        log::debug!(
            "saved run {run_id} (score {}, best {})",
            summary.score,
            outcome.best_score
        );
        Ok(outcome)
    }
}

impl RunStore for SqliteRunStore {
    fn save(&mut self, summary: &RunSummary) -> Result<SaveOutcome, DrillError> {
        self.save_at(summary, Utc::now())
    }

    fn query(&self, query: &HistoryQuery) -> Result<Vec<PastRun>, DrillError> {
        let limit = query.limit.clamp(1, MAX_QUERY_LIMIT);
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, created_at, score, attempted, correct
            FROM runs
            WHERE mode = ?1 AND config_key = ?2
            ORDER BY created_at DESC, id DESC
            LIMIT ?3
            "#,
        )?;

        let run_iter = stmt.query_map(
            params![query.mode, query.configuration_key, limit as i64],
            |row| {
                let created_at: String = row.get(1)?;
                let timestamp = DateTime::parse_from_rfc3339(&created_at)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            1,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?
                    .with_timezone(&Utc);

                Ok(PastRun {
                    id: row.get(0)?,
                    timestamp,
                    score: row.get(2)?,
                    attempted: row.get(3)?,
                    correct: row.get(4)?,
                })
            },
        )?;

        let mut runs = Vec::new();
        for run in run_iter {
            runs.push(run?);
        }
        Ok(runs)
    }

    fn best_score(&self, mode: &str, configuration_key: &str) -> Result<u32, DrillError> {
        let best: Option<u32> = self
            .conn
            .query_row(
                "SELECT best_score FROM high_scores WHERE mode = ?1 AND config_key = ?2",
                params![mode, configuration_key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(best.unwrap_or(0))
    }
}
