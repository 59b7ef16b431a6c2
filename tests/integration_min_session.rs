// Minimal integration test that drives the compiled binary through a PTY.
// This exercises the real event loop, the worker thread and the SQLite store
// end to end.
//
// Notes:
// - Requires a TTY; uses expectrl which allocates a pseudo terminal.
// - Marked Unix-only and ignored by default to avoid CI/platform issues.
// - Run manually via: `cargo test --test integration_min_session -- --ignored`.

#![cfg(unix)]

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use expectrl::{Eof, Session};
use mathdash::config::MODE;
use mathdash::{DrillConfig, RunStore, SqliteRunStore};

/// The binary with every per-user directory (settings, database, log)
/// pointed into `dir`
fn mathdash_in(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin("mathdash"));
    cmd.env("MATHDASH_DB", dir.join("runs.db"))
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join("config"))
        .env("XDG_DATA_HOME", dir.join("data"));
    cmd
}

#[test]
#[ignore]
fn minimal_run_is_saved_and_app_exits() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("runs.db");

    // Resolve path to compiled binary (debug build during tests)
    let mut cmd = mathdash_in(dir.path());
    cmd.args(["--ops", "+", "-d", "30"]);

    // Spawn the TUI inside a pseudo terminal
    let mut p = Session::spawn(cmd)?;
    std::thread::sleep(Duration::from_millis(300));

    // start, then end the run straight away
    p.send("\r")?;
    std::thread::sleep(Duration::from_millis(300));
    p.send("\x1b")?; // ESC ends the run
    std::thread::sleep(Duration::from_millis(300));

    // close the result, then quit from the idle screen
    p.send("\r")?;
    std::thread::sleep(Duration::from_millis(200));
    p.send("\x1b")?;

    p.expect(Eof)?;

    let store = SqliteRunStore::open(&db)?;
    let key = DrillConfig {
        operations: DrillConfig::parse_operations("+")?,
        duration: mathdash::RunDuration::Thirty,
        ..DrillConfig::default()
    }
    .key();
    let runs = store.query(&mathdash::HistoryQuery {
        mode: MODE.to_string(),
        configuration_key: key,
        limit: 10,
    })?;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].score, 0);
    Ok(())
}

#[test]
fn rejects_unsupported_duration() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = mathdash_in(dir.path());
    cmd.args(["-d", "45"]);

    let assert = assert_cmd::Command::from_std(cmd).assert().failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).into_owned();
    assert!(stderr.contains("unsupported duration 45s"), "{stderr}");
}
