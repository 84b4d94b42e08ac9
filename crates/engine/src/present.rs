//! Presentation boundary of a session.
//!
//! The control loop hands everything meant for the operator to a [`ResultPresenter`];
//! front ends decide how it looks.

use rdb_common::ProgressMessage;

use crate::{CommandResult, Mode};

/// Sink for everything the operator sees.
pub trait ResultPresenter {
    /// Shows the outcome of a command.
    fn present(&mut self, result: &CommandResult);

    /// Shows an informational message, such as why the debuggee stopped.
    fn info(&mut self, message: &str);

    /// Shows an error the session recovered from.
    fn error(&mut self, message: &str);

    /// Shows debuggee output.
    fn output(&mut self, text: &str);

    /// Shows a recording progress notice.
    fn progress(&mut self, progress: &ProgressMessage);

    /// Invites the operator to type a command.
    fn prompt(&mut self, _mode: Mode) {}
}

/// Presenter that keeps everything in memory.
///
/// Used by embedders that render the transcript themselves, and by tests.
#[derive(Debug, Default, Clone)]
pub struct TranscriptPresenter {
    /// Command results, in order
    pub results: Vec<CommandResult>,
    /// Informational messages
    pub infos: Vec<String>,
    /// Errors
    pub errors: Vec<String>,
    /// Debuggee output
    pub output: String,
    /// Progress notices
    pub progress: Vec<ProgressMessage>,
    /// Number of prompts shown
    pub prompts: usize,
}

impl TranscriptPresenter {
    /// Whether any info message contains `needle`.
    pub fn saw_info(&self, needle: &str) -> bool {
        self.infos.iter().any(|m| m.contains(needle))
    }
}

impl ResultPresenter for TranscriptPresenter {
    fn present(&mut self, result: &CommandResult) {
        self.results.push(result.clone());
    }

    fn info(&mut self, message: &str) {
        self.infos.push(message.to_string());
    }

    fn error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    fn output(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn progress(&mut self, progress: &ProgressMessage) {
        self.progress.push(progress.clone());
    }

    fn prompt(&mut self, _mode: Mode) {
        self.prompts += 1;
    }
}
