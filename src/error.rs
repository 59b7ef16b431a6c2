use thiserror::Error;

use crate::session::Phase;

/// Reasons a configuration is rejected before a run starts
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("at least one operation must be enabled")]
    NoOperations,
    #[error("{name} range is empty (min {min} > max {max})")]
    EmptyRange { name: &'static str, min: i64, max: i64 },
    #[error("unsupported duration {0}s (expected 30, 60 or 120)")]
    UnsupportedDuration(u32),
    #[error("could not parse {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DrillError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error("cannot {operation} while {phase}")]
    InvalidState {
        operation: &'static str,
        phase: Phase,
    },
    #[error("question provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("run store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<rusqlite::Error> for DrillError {
    fn from(e: rusqlite::Error) -> Self {
        DrillError::StoreUnavailable(e.to_string())
    }
}
