use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};

use crate::config::DrillConfig;
use crate::error::DrillError;
use crate::question::{Question, QuestionProvider};
use crate::session::{Effect, Session, Ticket};
use crate::store::{RunStore, RunSummary, SaveOutcome};

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum DrillEvent {
    Key(KeyEvent),
    Resize,
    Tick,
    QuestionReady(Ticket, Result<Question, DrillError>),
    RunSaved(Ticket, Result<SaveOutcome, DrillError>),
}

/// Source of events (keyboard, resize, collaborator completions)
pub trait EventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<DrillEvent, RecvTimeoutError>;
}

/// Production event source using crossterm. Completions from the
/// [`Dispatcher`] arrive on the same channel through [`Self::sender`].
pub struct CrosstermEventSource {
    tx: Sender<DrillEvent>,
    rx: Receiver<DrillEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let key_tx = tx.clone();

        thread::spawn(move || loop {
            let forwarded = match event::read() {
                // key release events show up on some platforms; only presses count
                Ok(CtEvent::Key(key)) if key.kind != KeyEventKind::Release => {
                    key_tx.send(DrillEvent::Key(key))
                }
                Ok(CtEvent::Resize(_, _)) => key_tx.send(DrillEvent::Resize),
                Ok(_) => Ok(()),
                Err(_) => break,
            };
            if forwarded.is_err() {
                break;
            }
        });

        Self { tx, rx }
    }

    pub fn sender(&self) -> Sender<DrillEvent> {
        self.tx.clone()
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<DrillEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<DrillEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<DrillEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<DrillEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Runner that advances the application one event/tick at a time
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> DrillEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => DrillEvent::Tick,
        }
    }
}

enum Job {
    Fetch(Ticket, DrillConfig),
    Save(Ticket, RunSummary),
}

/// Carries out session effects. Collaborator calls run on one worker thread
/// so the event loop keeps ticking while they are in flight; their results
/// come back as [`DrillEvent`]s. Timer effects flip [`Self::timer_armed`].
pub struct Dispatcher {
    jobs: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    timer_armed: bool,
}

impl Dispatcher {
    pub fn new<P, S>(provider: P, mut store: S, events: Sender<DrillEvent>) -> Self
    where
        P: QuestionProvider + 'static,
        S: RunStore + 'static,
    {
        let (jobs, rx) = mpsc::channel::<Job>();
        let worker = thread::spawn(move || {
            for job in rx {
                let event = match job {
                    Job::Fetch(ticket, config) => {
                        DrillEvent::QuestionReady(ticket, provider.request(&config))
                    }
                    Job::Save(ticket, summary) => {
                        DrillEvent::RunSaved(ticket, store.save(&summary))
                    }
                };
                if events.send(event).is_err() {
                    break;
                }
            }
        });

        Self {
            jobs: Some(jobs),
            worker: Some(worker),
            timer_armed: false,
        }
    }

    pub fn timer_armed(&self) -> bool {
        self.timer_armed
    }

    pub fn run(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            let job = match effect {
                Effect::ArmTimer => {
                    self.timer_armed = true;
                    continue;
                }
                Effect::DisarmTimer => {
                    self.timer_armed = false;
                    continue;
                }
                Effect::FetchQuestion { ticket, config } => Job::Fetch(ticket, config),
                Effect::SaveRun { ticket, summary } => Job::Save(ticket, summary),
            };
            if let Some(jobs) = &self.jobs {
                if jobs.send(job).is_err() {
                    log::error!("worker thread is gone; dropping request");
                }
            }
        }
    }

    /// Route a completion event back into the session. Returns false for
    /// events that are not completions.
    pub fn complete(&mut self, session: &mut Session, event: DrillEvent) -> bool {
        let effects = match event {
            DrillEvent::QuestionReady(ticket, outcome) => session.question_loaded(ticket, outcome),
            DrillEvent::RunSaved(ticket, outcome) => session.run_saved(ticket, outcome),
            _ => return false,
        };
        self.run(effects);
        true
    }

    /// Deliver a tick to the session if the timer is armed
    pub fn tick(&mut self, session: &mut Session) {
        if self.timer_armed {
            let effects = session.tick();
            self.run(effects);
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // closing the job channel ends the worker loop
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
