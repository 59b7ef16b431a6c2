//! Run lifecycle for a timed drill.
//!
//! [`Session`] is a pure state machine: it never talks to a question provider
//! or a run store directly. Operations that need a collaborator return
//! [`Effect`]s, and the caller reports the outcome back with the [`Ticket`]
//! the effect carried. Completions with an unknown or outdated ticket are
//! dropped, which is how late responses after a run ended are discarded.

use std::fmt;

use crate::config::{DrillConfig, MODE};
use crate::error::DrillError;
use crate::question::Question;
use crate::store::{RunSummary, SaveOutcome};
use crate::util::accuracy_percent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    Idle,
    Running,
    Settling,
    Complete,
}

/// Correlates a collaborator request with its completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Work the caller must carry out on behalf of the session
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Start delivering ticks
    ArmTimer,
    /// Stop delivering ticks
    DisarmTimer,
    /// Ask the question provider for a problem, then call
    /// [`Session::question_loaded`]
    FetchQuestion { ticket: Ticket, config: DrillConfig },
    /// Persist the run, then call [`Session::run_saved`]
    SaveRun { ticket: Ticket, summary: RunSummary },
}

/// How the last evaluated answer went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    Incorrect,
}

/// Mutable state of the current run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    pub phase: Phase,
    pub time_left: u32,
    pub score: u32,
    pub streak: u32,
    pub attempted: u32,
    pub correct: u32,
    pub current_question: Option<Question>,
    pub pending_input: String,
}

impl RunState {
    fn idle(duration_secs: u32) -> Self {
        Self {
            phase: Phase::Idle,
            time_left: duration_secs,
            score: 0,
            streak: 0,
            attempted: 0,
            correct: 0,
            current_question: None,
            pending_input: String::new(),
        }
    }

    pub fn accuracy(&self) -> u32 {
        accuracy_percent(self.correct, self.attempted)
    }
}

/// Final summary of a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub score: u32,
    pub attempted: u32,
    pub correct: u32,
    pub accuracy: u32,
    pub configuration_key: String,
    pub is_new_high_score: bool,
    /// Best score for the scope after saving; `None` when the run was not saved
    pub best_score: Option<u32>,
}

impl RunResult {
    pub fn saved(&self) -> bool {
        self.best_score.is_some()
    }
}

#[derive(Debug)]
pub struct Session {
    config: DrillConfig,
    state: RunState,
    result: Option<RunResult>,
    next_ticket: u64,
    /// Outstanding question request. Doubles as the advance lock: answers are
    /// not evaluated while it is set.
    question_ticket: Option<Ticket>,
    /// Set together with the move to Settling; a run saves at most once.
    settled: bool,
    save_ticket: Option<Ticket>,
    summary: Option<RunSummary>,
    last_verdict: Option<Verdict>,
    last_error: Option<DrillError>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DrillConfig::default())
    }
}

impl Session {
    pub fn new(config: DrillConfig) -> Self {
        Self {
            state: RunState::idle(config.duration_secs()),
            config,
            result: None,
            next_ticket: 0,
            question_ticket: None,
            settled: false,
            save_ticket: None,
            summary: None,
            last_verdict: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn config(&self) -> &DrillConfig {
        &self.config
    }

    pub fn result(&self) -> Option<&RunResult> {
        self.result.as_ref()
    }

    pub fn accuracy(&self) -> u32 {
        self.state.accuracy()
    }

    pub fn last_verdict(&self) -> Option<Verdict> {
        self.last_verdict
    }

    /// Most recent collaborator failure, cleared when the next request succeeds
    pub fn last_error(&self) -> Option<&DrillError> {
        self.last_error.as_ref()
    }

    pub fn awaiting_question(&self) -> bool {
        self.question_ticket.is_some()
    }

    /// True when the run is over but the store rejected the save
    pub fn settlement_failed(&self) -> bool {
        self.state.phase == Phase::Settling && self.save_ticket.is_none()
    }

    /// Replace the configuration. Only allowed between runs.
    pub fn set_config(&mut self, config: DrillConfig) -> Result<(), DrillError> {
        if self.state.phase != Phase::Idle {
            return Err(self.invalid_state("change configuration"));
        }
        config.validate()?;
        self.state.time_left = config.duration_secs();
        self.config = config;
        Ok(())
    }

    pub fn start(&mut self, config: DrillConfig) -> Result<Vec<Effect>, DrillError> {
        if self.state.phase != Phase::Idle {
            return Err(self.invalid_state("start"));
        }
        config.validate()?;

        self.config = config;
        self.state = RunState::idle(self.config.duration_secs());
        self.state.phase = Phase::Running;
        self.result = None;
        self.settled = false;
        self.save_ticket = None;
        self.summary = None;
        self.last_verdict = None;
        self.last_error = None;
        log::debug!("run started with {}", self.config.key());

        let fetch = self.fetch_question();
        Ok(vec![Effect::ArmTimer, fetch])
    }

    /// Advance the countdown by one second
    pub fn tick(&mut self) -> Vec<Effect> {
        if self.state.phase != Phase::Running {
            return Vec::new();
        }
        self.state.time_left = self.state.time_left.saturating_sub(1);
        if self.state.time_left == 0 {
            return self.begin_settlement();
        }
        Vec::new()
    }

    /// Evaluate an explicitly submitted answer. Input that is empty or not an
    /// integer is not an attempt.
    pub fn submit(&mut self, raw_answer: &str) -> Vec<Effect> {
        if self.state.phase != Phase::Running || self.question_ticket.is_some() {
            return Vec::new();
        }
        let Some(expected) = self.state.current_question.as_ref().map(|q| q.answer) else {
            return Vec::new();
        };
        let Ok(value) = raw_answer.trim().parse::<i64>() else {
            return Vec::new();
        };

        self.state.attempted += 1;
        if value == expected {
            self.state.correct += 1;
            self.state.score += 1;
            self.state.streak += 1;
            self.last_verdict = Some(Verdict::Correct);
            vec![self.fetch_question()]
        } else {
            self.state.streak = 0;
            self.last_verdict = Some(Verdict::Incorrect);
            Vec::new()
        }
    }

    /// Observe the answer field as it is edited. A value equal to the current
    /// answer is evaluated once and the field is cleared; anything else only
    /// updates the field.
    pub fn input_changed(&mut self, text: &str) -> Vec<Effect> {
        if self.state.phase != Phase::Running {
            return Vec::new();
        }
        self.state.pending_input = text.to_string();
        if self.question_ticket.is_some() {
            return Vec::new();
        }
        let Some(expected) = self.state.current_question.as_ref().map(|q| q.answer) else {
            return Vec::new();
        };
        match text.trim().parse::<i64>() {
            Ok(value) if value == expected => {
                self.state.pending_input.clear();
                self.submit(text)
            }
            _ => Vec::new(),
        }
    }

    /// Submit whatever is in the answer field and clear it
    pub fn submit_pending(&mut self) -> Vec<Effect> {
        if self.state.phase != Phase::Running {
            return Vec::new();
        }
        let raw = std::mem::take(&mut self.state.pending_input);
        if raw.trim().is_empty() {
            return Vec::new();
        }
        self.submit(&raw)
    }

    pub fn end_early(&mut self) -> Vec<Effect> {
        if self.state.phase != Phase::Running {
            return Vec::new();
        }
        self.state.time_left = 0;
        self.begin_settlement()
    }

    /// Request a question again after the provider failed
    pub fn retry_question(&mut self) -> Vec<Effect> {
        if self.state.phase != Phase::Running
            || self.question_ticket.is_some()
            || self.state.current_question.is_some()
        {
            return Vec::new();
        }
        vec![self.fetch_question()]
    }

    pub fn question_loaded(
        &mut self,
        ticket: Ticket,
        outcome: Result<Question, DrillError>,
    ) -> Vec<Effect> {
        if self.state.phase != Phase::Running || self.question_ticket != Some(ticket) {
            log::warn!("discarding stale question response {ticket}");
            return Vec::new();
        }
        self.question_ticket = None;
        match outcome {
            Ok(question) => {
                self.state.current_question = Some(question);
                self.last_error = None;
            }
            Err(e) => {
                log::warn!("question request {ticket} failed: {e}");
                self.state.current_question = None;
                self.last_error = Some(e);
            }
        }
        Vec::new()
    }

    pub fn run_saved(
        &mut self,
        ticket: Ticket,
        outcome: Result<SaveOutcome, DrillError>,
    ) -> Vec<Effect> {
        if self.state.phase != Phase::Settling || self.save_ticket != Some(ticket) {
            log::warn!("discarding stale save response {ticket}");
            return Vec::new();
        }
        self.save_ticket = None;
        match outcome {
            Ok(saved) => {
                self.last_error = None;
                self.complete(Some(saved));
            }
            Err(e) => {
                log::warn!("saving run failed: {e}");
                self.last_error = Some(e);
            }
        }
        Vec::new()
    }

    /// Try the save again after a failure. Never happens on its own.
    pub fn retry_settlement(&mut self) -> Vec<Effect> {
        if !self.settlement_failed() {
            return Vec::new();
        }
        let Some(summary) = self.summary.clone() else {
            return Vec::new();
        };
        let ticket = self.issue_ticket();
        self.save_ticket = Some(ticket);
        vec![Effect::SaveRun { ticket, summary }]
    }

    /// Give up on saving and show the result as unsaved
    pub fn abandon_settlement(&mut self) -> Vec<Effect> {
        if self.settlement_failed() {
            self.complete(None);
        }
        Vec::new()
    }

    pub fn dismiss(&mut self) -> Result<(), DrillError> {
        if self.state.phase != Phase::Complete {
            return Err(self.invalid_state("dismiss"));
        }
        self.state = RunState::idle(self.config.duration_secs());
        self.result = None;
        self.summary = None;
        self.last_verdict = None;
        self.last_error = None;
        Ok(())
    }

    fn begin_settlement(&mut self) -> Vec<Effect> {
        if self.settled {
            return Vec::new();
        }
        self.settled = true;
        self.state.phase = Phase::Settling;
        self.question_ticket = None;

        let summary = RunSummary {
            mode: MODE.to_string(),
            configuration_key: self.config.key(),
            score: self.state.score,
            attempted: self.state.attempted,
            correct: self.state.correct,
        };
        log::debug!(
            "run over: score {} ({}/{})",
            summary.score,
            summary.correct,
            summary.attempted
        );
        let ticket = self.issue_ticket();
        self.save_ticket = Some(ticket);
        self.summary = Some(summary.clone());
        vec![Effect::DisarmTimer, Effect::SaveRun { ticket, summary }]
    }

    fn complete(&mut self, saved: Option<SaveOutcome>) {
        self.result = Some(RunResult {
            score: self.state.score,
            attempted: self.state.attempted,
            correct: self.state.correct,
            accuracy: self.state.accuracy(),
            configuration_key: self.config.key(),
            is_new_high_score: saved.is_some_and(|s| s.is_new_high_score),
            best_score: saved.map(|s| s.best_score),
        });
        self.state.phase = Phase::Complete;
    }

    fn fetch_question(&mut self) -> Effect {
        let ticket = self.issue_ticket();
        self.question_ticket = Some(ticket);
        Effect::FetchQuestion {
            ticket,
            config: self.config.clone(),
        }
    }

    fn issue_ticket(&mut self) -> Ticket {
        self.next_ticket += 1;
        Ticket(self.next_ticket)
    }

    fn invalid_state(&self, operation: &'static str) -> DrillError {
        DrillError::InvalidState {
            operation,
            phase: self.state.phase,
        }
    }
}
