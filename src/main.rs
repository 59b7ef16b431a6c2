pub mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use directories::ProjectDirs;
use itertools::Itertools;
use mathdash::{
    build_history,
    config::{FileSettingsStore, Settings, SettingsStore, MODE},
    runtime::{CrosstermEventSource, Dispatcher, DrillEvent, FixedTicker, Runner},
    ConfigError, DrillConfig, HistoryPoint, HistoryQuery, OperandRange, Operation, PastRun, Phase,
    RandomQuestionProvider, RunDuration, RunStore, Session, SqliteRunStore,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    fs::OpenOptions,
    io::{self, stdin},
    time::{Duration, Instant},
};

/// How many runs the history screen pulls from the store
const HISTORY_LIMIT: usize = 200;

/// timed arithmetic drills with high scores and score trends
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Answer as many arithmetic problems as you can before the clock runs out. Runs are saved per configuration so high scores and trends only compare like with like."
)]
pub struct Cli {
    /// operations to practise, any of "+-*/"
    #[clap(short = 'o', long, allow_hyphen_values = true)]
    ops: Option<String>,

    /// run length in seconds (30, 60 or 120)
    #[clap(short = 'd', long)]
    duration: Option<u32>,

    /// range for the first addition operand
    #[clap(long, value_name = "MIN-MAX", allow_hyphen_values = true)]
    add_a: Option<OperandRange>,

    /// range for the second addition operand
    #[clap(long, value_name = "MIN-MAX", allow_hyphen_values = true)]
    add_b: Option<OperandRange>,

    /// range for the first multiplication operand
    #[clap(long, value_name = "MIN-MAX", allow_hyphen_values = true)]
    mul_a: Option<OperandRange>,

    /// range for the second multiplication operand
    #[clap(long, value_name = "MIN-MAX", allow_hyphen_values = true)]
    mul_b: Option<OperandRange>,

    /// number of runs averaged into the history trend line
    #[clap(short = 'w', long)]
    window: Option<usize>,
}

impl Cli {
    /// Overlay command line values on top of the saved settings
    fn apply(&self, mut settings: Settings) -> Result<Settings, ConfigError> {
        let config = &mut settings.config;
        if let Some(ops) = &self.ops {
            config.operations = DrillConfig::parse_operations(ops)?;
        }
        if let Some(secs) = self.duration {
            config.duration = RunDuration::try_from(secs)?;
        }
        let ranges = &mut config.ranges;
        for (arg, slot) in [
            (self.add_a, &mut ranges.add_a),
            (self.add_b, &mut ranges.add_b),
            (self.mul_a, &mut ranges.mul_a),
            (self.mul_b, &mut ranges.mul_b),
        ] {
            if let Some(range) = arg {
                *slot = range;
            }
        }
        if let Some(window) = self.window {
            settings.window_size = window.max(1);
        }
        settings.config.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppState {
    Drill,
    History,
}

#[derive(Debug, Default)]
pub struct HistoryView {
    /// Configuration whose runs are shown; starts as the one being played
    pub scope: DrillConfig,
    pub points: Vec<HistoryPoint>,
    pub recent: Vec<PastRun>,
    pub best_score: u32,
    pub show_average: bool,
    pub error: Option<String>,
}

pub struct App {
    pub session: Session,
    pub settings: Settings,
    pub state: AppState,
    pub history: HistoryView,
}

impl App {
    pub fn new(settings: Settings) -> Self {
        Self {
            session: Session::new(settings.config.clone()),
            history: HistoryView {
                scope: settings.config.clone(),
                show_average: true,
                ..HistoryView::default()
            },
            settings,
            state: AppState::Drill,
        }
    }

    /// Open the history screen on the configuration being played
    pub fn load_history<S: RunStore>(&mut self, store: &S) {
        self.history.scope = self.settings.config.clone();
        self.reload_history(store);
    }

    /// Flip one operation in the browsed scope and re-read its history.
    /// Removing the last operation is ignored.
    pub fn toggle_history_operation<S: RunStore>(&mut self, op: Operation, store: &S) {
        let operations = &mut self.history.scope.operations;
        if !operations.remove(&op) {
            operations.insert(op);
        } else if operations.is_empty() {
            operations.insert(op);
            return;
        }
        self.reload_history(store);
    }

    fn reload_history<S: RunStore>(&mut self, store: &S) {
        let key = self.history.scope.key();
        let query = HistoryQuery {
            mode: MODE.to_string(),
            configuration_key: key.clone(),
            limit: HISTORY_LIMIT,
        };
        let loaded = store
            .query(&query)
            .and_then(|runs| Ok((runs, store.best_score(MODE, &key)?)));

        match loaded {
            Ok((runs, best)) => {
                self.history.points = build_history(&runs, self.settings.window_size);
                self.history.recent = runs
                    .into_iter()
                    .sorted_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)))
                    .take(20)
                    .collect();
                self.history.best_score = best;
                self.history.error = None;
            }
            Err(e) => {
                log::warn!("loading history failed: {e}");
                self.history.points.clear();
                self.history.recent.clear();
                self.history.best_score = 0;
                self.history.error = Some(e.to_string());
            }
        }
        self.state = AppState::History;
    }
}

fn init_logging() {
    let log_file = ProjectDirs::from("", "", "mathdash").and_then(|pd| {
        let dir = pd.data_local_dir();
        std::fs::create_dir_all(dir).ok()?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("mathdash.log"))
            .ok()
    });

    // stderr belongs to the terminal UI, so only log when there is a file
    if let Some(file) = log_file {
        env_logger::Builder::from_default_env()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging();

    let settings_store = FileSettingsStore::new();
    let settings = match cli.apply(settings_store.load()) {
        Ok(settings) => settings,
        Err(e) => {
            let mut cmd = Cli::command();
            cmd.error(ErrorKind::InvalidValue, e).exit();
        }
    };

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let db_path = SqliteRunStore::default_path();
    let writer = SqliteRunStore::open(&db_path)?;
    let reader = SqliteRunStore::open(&db_path)?;

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let events = CrosstermEventSource::new();
    let dispatcher = Dispatcher::new(RandomQuestionProvider::new(), writer, events.sender());
    let runner = Runner::new(events, FixedTicker::new(Duration::from_millis(100)));

    let mut app = App::new(settings);
    let outcome = start_tui(
        &mut terminal,
        &mut app,
        &runner,
        dispatcher,
        &reader,
        &settings_store,
    );

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    terminal.show_cursor()?;

    outcome
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<CrosstermEventSource, FixedTicker>,
    mut dispatcher: Dispatcher,
    reader: &SqliteRunStore,
    settings_store: &FileSettingsStore,
) -> Result<(), Box<dyn Error>> {
    let second = Duration::from_secs(1);
    let mut next_tick = Instant::now() + second;

    loop {
        terminal.draw(|f| ui::draw(app, f))?;

        let event = runner.step();

        // count down against the wall clock so a burst of keys cannot stall it
        if dispatcher.timer_armed() {
            while Instant::now() >= next_tick {
                dispatcher.tick(&mut app.session);
                next_tick += second;
            }
        }

        let key = match event {
            DrillEvent::Key(key) => key,
            DrillEvent::Tick | DrillEvent::Resize => continue,
            completion => {
                dispatcher.complete(&mut app.session, completion);
                continue;
            }
        };

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            break;
        }

        match app.state {
            AppState::History => match key.code {
                KeyCode::Esc | KeyCode::Char('b') | KeyCode::Char('h') => {
                    app.state = AppState::Drill;
                }
                KeyCode::Char('a') => {
                    app.history.show_average = !app.history.show_average;
                }
                KeyCode::Char(c) => {
                    if let Some(op) = Operation::from_symbol(c) {
                        app.toggle_history_operation(op, reader);
                    }
                }
                _ => {}
            },
            AppState::Drill => {
                let was_idle = app.session.phase() == Phase::Idle;
                if handle_drill_key(app, key, &mut dispatcher, reader, settings_store) {
                    break;
                }
                // a new run gets a full first second
                if was_idle && app.session.phase() == Phase::Running {
                    next_tick = Instant::now() + second;
                }
            }
        }
    }

    Ok(())
}

/// Returns true when the app should quit
fn handle_drill_key(
    app: &mut App,
    key: KeyEvent,
    dispatcher: &mut Dispatcher,
    reader: &SqliteRunStore,
    settings_store: &FileSettingsStore,
) -> bool {
    match app.session.phase() {
        Phase::Idle => match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return true,
            KeyCode::Enter | KeyCode::Char(' ') => {
                match app.session.start(app.settings.config.clone()) {
                    Ok(effects) => {
                        dispatcher.run(effects);
                        if let Err(e) = settings_store.save(&app.settings) {
                            log::warn!("could not save settings: {e}");
                        }
                    }
                    Err(e) => log::warn!("{e}"),
                }
            }
            KeyCode::Char('h') => app.load_history(reader),
            _ => {}
        },
        Phase::Running => {
            let pending = app.session.state().pending_input.clone();
            let effects = match key.code {
                KeyCode::Esc => app.session.end_early(),
                KeyCode::Enter => app.session.submit_pending(),
                KeyCode::Char('r') => app.session.retry_question(),
                KeyCode::Char(c) if c.is_ascii_digit() || (c == '-' && pending.is_empty()) => {
                    app.session.input_changed(&format!("{pending}{c}"))
                }
                KeyCode::Backspace => {
                    let mut chars = pending.chars();
                    chars.next_back();
                    app.session.input_changed(chars.as_str())
                }
                _ => Vec::new(),
            };
            dispatcher.run(effects);
        }
        Phase::Settling => {
            let effects = match key.code {
                KeyCode::Char('r') => app.session.retry_settlement(),
                KeyCode::Char('d') => app.session.abandon_settlement(),
                _ => Vec::new(),
            };
            dispatcher.run(effects);
        }
        Phase::Complete => match key.code {
            KeyCode::Enter | KeyCode::Esc => {
                let _ = app.session.dismiss();
            }
            KeyCode::Char('h') => {
                let _ = app.session.dismiss();
                app.load_history(reader);
            }
            _ => {}
        },
    }
    false
}
