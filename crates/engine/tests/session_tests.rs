//! End-to-end sessions against the simulated debuggee.

use std::{sync::mpsc, time::Duration};

use rdb_common::logging::ensure_test_logging;
use rdb_engine::{
    sim::{Program, SimTarget},
    EngineConfig, LoopState, Mode, Session, SessionMode, TranscriptPresenter,
};

const DEMO_OUTPUT: &str = "added 5\nadded 7\nadded 9\nTotal: 21\n";

/// Runs a whole session over the demo program, feeding `commands` as operator input.
fn run_demo(
    mode: SessionMode,
    config: EngineConfig,
    commands: &[&str],
) -> (Session<SimTarget>, TranscriptPresenter) {
    ensure_test_logging(None);
    let target = SimTarget::new(Program::demo().unwrap()).unwrap();
    let (tx, rx) = mpsc::channel();
    for command in commands {
        tx.send(command.to_string()).unwrap();
    }
    drop(tx);

    let config = config.with_command_poll_interval(Duration::from_millis(10));
    let mut session = Session::new(target, config, mode, rx);
    let mut presenter = TranscriptPresenter::default();
    session.run(&mut presenter).unwrap();
    (session, presenter)
}

fn message(presenter: &TranscriptPresenter, index: usize) -> &str {
    &presenter.results[index].message
}

#[test]
fn test_record_then_replay() {
    let (session, presenter) = run_demo(
        SessionMode::Record,
        EngineConfig::default(),
        &["goto 4", "print-var amount", "stack", "back", "back", "quit"],
    );

    let state = session.state();
    assert_eq!(session.loop_state(), LoopState::Terminated);
    assert_eq!(state.mode, Mode::Replay);
    assert_eq!(state.history.len(), 25);
    assert!(state.history.is_recording_complete());
    assert!(presenter.saw_info("Starting auto-recording from main() entry..."));
    assert!(presenter.saw_info("Total steps recorded: 25"));

    let lines = state.history.iter().map(|s| s.location.line).collect::<Vec<_>>();
    assert_eq!(&lines[..8], &[3, 4, 5, 6, 4, 5, 6, 7]);
    assert!(state.history.iter().enumerate().all(|(i, s)| s.seq == i));

    assert!(message(&presenter, 0).contains("Counter.add"));
    assert_eq!(message(&presenter, 1), "amount (int) = 5");
    assert!(message(&presenter, 2).starts_with("Call stack (2 frames):"));
    assert_eq!(state.history.cursor(), Some(2));
    assert!(presenter.results.iter().all(|r| r.success));
}

#[test]
fn test_replay_output_follows_cursor() {
    let (session, presenter) =
        run_demo(SessionMode::Record, EngineConfig::default(), &["continue", "output"]);

    assert_eq!(session.state().history.cursor(), Some(24));
    assert_eq!(message(&presenter, 1), DEMO_OUTPUT.trim_end());
    // Output of a replay is never re-emitted as live output.
    assert!(presenter.output.is_empty());
}

#[test]
fn test_replay_boundaries() {
    let (_, presenter) = run_demo(
        SessionMode::Record,
        EngineConfig::default(),
        &["back", "step-back", "goto 99"],
    );

    assert!(presenter.results.iter().all(|r| !r.success));
    assert_eq!(message(&presenter, 0), "Already at the beginning of execution history.");
    assert_eq!(message(&presenter, 2), "Step 99 is out of range (0..25)");
}

#[test]
fn test_replay_variable_graph() {
    let (_, presenter) = run_demo(
        SessionMode::Record,
        EngineConfig::default(),
        &["goto 22", "print-var first", "print-var counter", "receiver"],
    );

    let first = message(&presenter, 1);
    assert!(first.starts_with("first (Node) = Node@"));
    assert!(first.contains("next (Node) = Node@"));

    let counter = message(&presenter, 2);
    assert!(counter.contains("count (int) = 21"));
    assert!(counter.contains("label (String) = \"clicks\""));
    assert_eq!(message(&presenter, 3), "Receiver: static context");
}

#[test]
fn test_live_breakpoint_flow() {
    let (session, presenter) = run_demo(
        SessionMode::Interactive,
        EngineConfig::default(),
        &["break Counter 5", "continue", "print-var amount", "remove-break Counter 5", "continue"],
    );

    assert!(presenter.saw_info("=== Method entry: main() ==="));
    assert!(presenter.saw_info("=== Breakpoint hit ===\nCounter.add() at Counter.java:5 (hit 1)"));
    assert!(presenter.saw_info("=== Program terminated ==="));
    assert_eq!(message(&presenter, 0), "Breakpoint set at Counter.java:5 [normal]");
    assert_eq!(message(&presenter, 2), "amount (int) = 5");
    assert_eq!(message(&presenter, 3), "Breakpoint removed at Counter.java:5");
    assert_eq!(presenter.output, DEMO_OUTPUT);

    let state = session.state();
    assert_eq!(state.mode, Mode::Live);
    assert!(state.history.is_empty());
    assert!(state.context.is_none());
}

#[test]
fn test_live_step_and_quit() {
    let (session, presenter) =
        run_demo(SessionMode::Interactive, EngineConfig::default(), &["step", "frame", "quit"]);

    assert!(presenter.saw_info("Stepped to: Main.main() at Main.java:4"));
    assert!(message(&presenter, 1).contains("Main.java:4"));
    assert_eq!(session.loop_state(), LoopState::Terminated);
    // Quitting detaches and lets the program finish.
    assert_eq!(presenter.output, DEMO_OUTPUT);
}

#[test]
fn test_initial_breakpoint_without_entry_stop() {
    let config = EngineConfig::default()
        .with_stop_on_entry(false)
        .with_initial_breakpoint("Main.java:9")
        .with_initial_breakpoint("Main.java:2");
    let (session, presenter) = run_demo(SessionMode::Interactive, config, &["print-var total"]);

    assert!(presenter.saw_info("Breakpoint set at Main.java:9"));
    assert!(presenter.saw_info("Could not set breakpoint Main.java:2"));
    assert!(!presenter.saw_info("Method entry"));
    assert_eq!(message(&presenter, 0), "total (int) = 0");
    assert_eq!(session.state().stops, 1);
}
