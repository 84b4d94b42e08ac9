//! Console front ends.

use std::io::Write;

use rdb_common::ProgressMessage;
use rdb_engine::{CommandResult, Mode, ResultPresenter};
use serde::Serialize;
use tracing::warn;

/// Writes results as plain text.
#[derive(Debug)]
pub struct ConsolePresenter<W: Write> {
    out: W,
}

impl<W: Write> ConsolePresenter<W> {
    /// Creates a presenter writing to `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn write(&mut self, text: &str) {
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|()| self.out.flush()) {
            warn!("Failed to write to the console: {e}");
        }
    }

    fn line(&mut self, text: &str) {
        self.write(&format!("{}\n", text.trim_end_matches('\n')));
    }
}

impl<W: Write> ResultPresenter for ConsolePresenter<W> {
    fn present(&mut self, result: &CommandResult) {
        self.line(&result.to_string());
    }

    fn info(&mut self, message: &str) {
        self.line(message);
    }

    fn error(&mut self, message: &str) {
        self.line(&format!("Error: {message}"));
    }

    fn output(&mut self, text: &str) {
        self.write(text);
    }

    fn progress(&mut self, progress: &ProgressMessage) {
        self.line(&format!("... {progress}"));
    }

    fn prompt(&mut self, mode: Mode) {
        self.write(&format!("rdb[{mode}]> "));
    }
}

/// One line of JSON output.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum JsonLine<'a> {
    Result(&'a CommandResult),
    Info { message: &'a str },
    Error { message: &'a str },
    Output { text: &'a str },
    Progress(&'a ProgressMessage),
}

/// Writes every presented item as a JSON object on its own line.
#[derive(Debug)]
pub struct JsonPresenter<W: Write> {
    out: W,
}

impl<W: Write> JsonPresenter<W> {
    /// Creates a presenter writing to `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn emit(&mut self, line: &JsonLine<'_>) {
        let written = serde_json::to_writer(&mut self.out, line)
            .map_err(std::io::Error::from)
            .and_then(|()| writeln!(self.out))
            .and_then(|()| self.out.flush());
        if let Err(e) = written {
            warn!("Failed to write JSON output: {e}");
        }
    }
}

impl<W: Write> ResultPresenter for JsonPresenter<W> {
    fn present(&mut self, result: &CommandResult) {
        self.emit(&JsonLine::Result(result));
    }

    fn info(&mut self, message: &str) {
        self.emit(&JsonLine::Info { message });
    }

    fn error(&mut self, message: &str) {
        self.emit(&JsonLine::Error { message });
    }

    fn output(&mut self, text: &str) {
        self.emit(&JsonLine::Output { text });
    }

    fn progress(&mut self, progress: &ProgressMessage) {
        self.emit(&JsonLine::Progress(progress));
    }
}
