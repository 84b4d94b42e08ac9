//! Execution and history navigation commands.
//!
//! `step`, `step-over`, `step-back` and `continue` delegate to the active
//! [`ExecutionStrategy`](crate::ExecutionStrategy); `back`, `forward`, `goto` and
//! `history` work directly on the recorded history.

use crate::{
    select_strategy, Command, CommandPayload, CommandResult, ControlInterface, DebuggerError,
    DebuggerResult, DebuggerState,
};

/// `step`: next line, entering calls.
#[derive(Debug, Default)]
pub struct StepCommand;

impl Command for StepCommand {
    fn name(&self) -> &'static str {
        "step"
    }

    fn run(
        &self,
        state: &mut DebuggerState,
        control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        select_strategy(state).step(state, control)
    }
}

/// `step-over`: next line at the same or a shallower depth.
#[derive(Debug, Default)]
pub struct StepOverCommand;

impl Command for StepOverCommand {
    fn name(&self) -> &'static str {
        "step-over"
    }

    fn run(
        &self,
        state: &mut DebuggerState,
        control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        select_strategy(state).step_over(state, control)
    }
}

/// `step-back`: previous line at the same or a shallower depth.
#[derive(Debug, Default)]
pub struct StepBackCommand;

impl Command for StepBackCommand {
    fn name(&self) -> &'static str {
        "step-back"
    }

    fn run(
        &self,
        state: &mut DebuggerState,
        control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        select_strategy(state).step_back(state, control)
    }
}

/// `continue`: run to the next qualifying breakpoint.
#[derive(Debug, Default)]
pub struct ContinueCommand;

impl Command for ContinueCommand {
    fn name(&self) -> &'static str {
        "continue"
    }

    fn run(
        &self,
        state: &mut DebuggerState,
        control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        select_strategy(state).continue_execution(state, control)
    }
}

fn require_history(state: &DebuggerState) -> DebuggerResult<()> {
    if !state.is_replay() {
        return Err(DebuggerError::illegal_state(
            "History navigation is only available in replay mode.",
        ));
    }
    if state.history.is_empty() {
        return Err(DebuggerError::illegal_state("No execution history recorded."));
    }
    Ok(())
}

fn cursor_result(state: &DebuggerState, prefix: &str) -> DebuggerResult<CommandResult> {
    let snapshot = crate::command::current_view(state)?;
    let message = format!("{prefix}{}", snapshot.detailed());
    Ok(CommandResult::with_payload(message, CommandPayload::Snapshot(snapshot)))
}

/// `back`: one step back in history.
#[derive(Debug, Default)]
pub struct BackCommand;

impl Command for BackCommand {
    fn name(&self) -> &'static str {
        "back"
    }

    fn run(
        &self,
        state: &mut DebuggerState,
        _control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        require_history(state)?;
        if !state.history.back() {
            return Err(DebuggerError::illegal_state(
                "Already at the beginning of execution history.",
            ));
        }
        cursor_result(state, "")
    }
}

/// `forward`: one step forward in history.
#[derive(Debug, Default)]
pub struct ForwardCommand;

impl Command for ForwardCommand {
    fn name(&self) -> &'static str {
        "forward"
    }

    fn run(
        &self,
        state: &mut DebuggerState,
        _control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        require_history(state)?;
        if !state.history.forward() {
            return Err(DebuggerError::illegal_state("Already at the end of execution history."));
        }
        cursor_result(state, "")
    }
}

/// `goto <step>`: jump to a recorded step.
#[derive(Debug)]
pub struct GotoCommand {
    /// Target step number
    pub step: usize,
}

impl Command for GotoCommand {
    fn name(&self) -> &'static str {
        "goto"
    }

    fn run(
        &self,
        state: &mut DebuggerState,
        _control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        require_history(state)?;
        if !state.history.go_to_step(self.step) {
            return Err(DebuggerError::user_input(format!(
                "Step {} is out of range (0..{})",
                self.step,
                state.history.len()
            )));
        }
        cursor_result(state, "")
    }
}

/// `history`: overview of the recorded steps around the cursor.
#[derive(Debug, Default)]
pub struct HistoryCommand;

impl Command for HistoryCommand {
    fn name(&self) -> &'static str {
        "history"
    }

    fn run(
        &self,
        state: &mut DebuggerState,
        _control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        let history = &state.history;
        Ok(CommandResult::with_payload(
            history.to_string(),
            CommandPayload::History { cursor: history.cursor(), len: history.len() },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{replay_state, FakeControl};
    use crate::{EngineConfig, Mode};

    #[test]
    fn test_back_and_forward() {
        let mut state = replay_state(&[(1, 1), (2, 1), (3, 1)]);
        let mut control = FakeControl::default();

        assert!(!BackCommand.execute(&mut state, &mut control).success);
        let result = ForwardCommand.execute(&mut state, &mut control);
        assert!(result.success);
        assert!(result.message.starts_with("=== Step #1 ==="));
        assert!(BackCommand.execute(&mut state, &mut control).success);
        assert_eq!(state.history.cursor(), Some(0));
    }

    #[test]
    fn test_history_navigation_requires_replay() {
        let mut state = DebuggerState::new(Mode::Live, EngineConfig::default());
        let mut control = FakeControl::default();
        let result = ForwardCommand.execute(&mut state, &mut control);
        assert!(!result.success);
        assert!(result.message.contains("only available in replay mode"));
    }

    #[test]
    fn test_goto() {
        let mut state = replay_state(&[(1, 1), (2, 1), (3, 1)]);
        let mut control = FakeControl::default();
        assert!(GotoCommand { step: 2 }.execute(&mut state, &mut control).success);
        assert_eq!(state.history.cursor(), Some(2));
        assert!(!GotoCommand { step: 3 }.execute(&mut state, &mut control).success);
        assert_eq!(state.history.cursor(), Some(2));
    }

    #[test]
    fn test_step_back_in_live_mode_fails() {
        let mut state = DebuggerState::new(Mode::Live, EngineConfig::default());
        let mut control = FakeControl::default();
        let result = StepBackCommand.execute(&mut state, &mut control);
        assert!(!result.success);
        assert!(result.message.contains("not available"));
    }

    #[test]
    fn test_history_command() {
        let mut state = replay_state(&[(1, 1), (2, 1)]);
        let mut control = FakeControl::default();
        let result = HistoryCommand.execute(&mut state, &mut control);
        assert!(result.message.contains("Total steps: 2"));
        assert!(matches!(
            result.payload,
            Some(CommandPayload::History { cursor: Some(0), len: 2 })
        ));
    }
}
