// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod config;
pub mod error;
pub mod history;
pub mod question;
pub mod runtime;
pub mod session;
pub mod store;
pub mod util;

pub use config::{DrillConfig, OperandRange, Operation, Ranges, RunDuration};
pub use error::{ConfigError, DrillError};
pub use history::{build_history, HistoryPoint, PastRun, DEFAULT_WINDOW};
pub use question::{Question, QuestionProvider, RandomQuestionProvider};
pub use session::{Effect, Phase, RunResult, RunState, Session, Ticket, Verdict};
pub use store::{HistoryQuery, RunStore, RunSummary, SaveOutcome, SqliteRunStore};
