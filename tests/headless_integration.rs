use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use mathdash::config::{DrillConfig, OperandRange, Operation, Ranges, RunDuration, MODE};
use mathdash::runtime::{Dispatcher, DrillEvent, FixedTicker, Runner, TestEventSource};
use mathdash::{
    DrillError, Effect, Phase, Question, QuestionProvider, RunStore, Session, SqliteRunStore,
};

// Headless integration using the runtime + Session without a TTY.
// Completions from the dispatcher's worker arrive on the same channel the
// test would push keys into, just like the crossterm source in the binary.

/// Hands out `n + n` with n counting up from 1
#[derive(Default)]
struct CountingProvider {
    next: AtomicI64,
}

impl QuestionProvider for CountingProvider {
    fn request(&self, _config: &DrillConfig) -> Result<Question, DrillError> {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(Question::new(n as u64, format!("{n} + {n}"), n * 2))
    }
}

struct DownProvider;

impl QuestionProvider for DownProvider {
    fn request(&self, _config: &DrillConfig) -> Result<Question, DrillError> {
        Err(DrillError::ProviderUnavailable("offline".into()))
    }
}

fn drill_config() -> DrillConfig {
    DrillConfig::new(
        [Operation::Add, Operation::Multiply],
        Ranges {
            add_a: OperandRange::new(2, 100),
            add_b: OperandRange::new(2, 100),
            mul_a: OperandRange::new(2, 12),
            mul_b: OperandRange::new(2, 100),
        },
        RunDuration::Sixty,
    )
}

/// Pump events into the session until `done` holds or the step budget runs out
fn drive<F>(
    runner: &Runner<TestEventSource, FixedTicker>,
    dispatcher: &mut Dispatcher,
    session: &mut Session,
    done: F,
) -> bool
where
    F: Fn(&Session) -> bool,
{
    for _ in 0..500u32 {
        if done(session) {
            return true;
        }
        match runner.step() {
            DrillEvent::Tick | DrillEvent::Resize | DrillEvent::Key(_) => {}
            completion => {
                dispatcher.complete(session, completion);
            }
        }
    }
    done(session)
}

#[test]
fn headless_run_is_scored_and_saved() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("runs.db");

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );
    let store = SqliteRunStore::open(&db).unwrap();
    let mut dispatcher = Dispatcher::new(CountingProvider::default(), store, tx);
    let mut session = Session::default();

    let config = drill_config();
    assert_eq!(config.key(), "+*|a:2-100,2-100|m:2-12,2-100|t:60");
    dispatcher.run(session.start(config).unwrap());
    assert!(dispatcher.timer_armed());

    // two correct answers, one wrong
    for _ in 0..2 {
        assert!(drive(&runner, &mut dispatcher, &mut session, |s| s
            .state()
            .current_question
            .is_some()
            && !s.awaiting_question()));
        let answer = session.state().current_question.as_ref().unwrap().answer;
        let effects = session.input_changed(&answer.to_string());
        dispatcher.run(effects);
    }
    assert!(drive(&runner, &mut dispatcher, &mut session, |s| !s
        .awaiting_question()));
    dispatcher.run(session.submit("1"));
    assert_eq!(session.state().streak, 0);

    // the clock runs out
    for _ in 0..60 {
        dispatcher.tick(&mut session);
    }
    assert_eq!(session.phase(), Phase::Settling);
    assert!(!dispatcher.timer_armed());

    assert!(drive(&runner, &mut dispatcher, &mut session, |s| s.phase()
        == Phase::Complete));
    let result = session.result().unwrap().clone();
    assert_eq!(result.score, 2);
    assert_eq!((result.correct, result.attempted), (2, 3));
    assert_eq!(result.accuracy, 67);
    assert!(result.is_new_high_score);
    assert_eq!(result.best_score, Some(2));

    // extra ticks after the run are ignored
    dispatcher.tick(&mut session);
    assert_eq!(session.phase(), Phase::Complete);

    session.dismiss().unwrap();
    assert_eq!(session.phase(), Phase::Idle);

    drop(dispatcher);
    let reader = SqliteRunStore::open(&db).unwrap();
    assert_eq!(reader.best_score(MODE, &result.configuration_key).unwrap(), 2);
}

#[test]
fn headless_provider_failure_keeps_run_alive() {
    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );
    let store = SqliteRunStore::open_in_memory().unwrap();
    let mut dispatcher = Dispatcher::new(DownProvider, store, tx);
    let mut session = Session::default();

    dispatcher.run(session.start(drill_config()).unwrap());
    assert!(drive(&runner, &mut dispatcher, &mut session, |s| s
        .last_error()
        .is_some()));
    assert_eq!(session.phase(), Phase::Running);
    assert!(session.state().current_question.is_none());

    // answers are ignored while there is no question
    dispatcher.run(session.submit("4"));
    assert_eq!(session.state().attempted, 0);

    let retry = session.retry_question();
    assert!(matches!(retry.as_slice(), [Effect::FetchQuestion { .. }]));
    dispatcher.run(retry);

    dispatcher.run(session.end_early());
    assert!(drive(&runner, &mut dispatcher, &mut session, |s| s.phase()
        == Phase::Complete));
    assert_eq!(session.result().unwrap().score, 0);
}

#[test]
fn headless_late_question_after_end_is_discarded() {
    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );
    let store = SqliteRunStore::open_in_memory().unwrap();
    let mut dispatcher = Dispatcher::new(CountingProvider::default(), store, tx);
    let mut session = Session::default();

    // end before the first question is delivered
    dispatcher.run(session.start(drill_config()).unwrap());
    dispatcher.run(session.end_early());

    assert!(drive(&runner, &mut dispatcher, &mut session, |s| s.phase()
        == Phase::Complete));
    assert!(session.state().current_question.is_none());
    assert_eq!(session.result().unwrap().attempted, 0);
}
