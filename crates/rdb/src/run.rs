//! Session wiring.

use std::io;

use eyre::Result;
use rdb_engine::{
    sim::{Program, SimTarget},
    EngineConfig, ResultPresenter, Session, SessionMode,
};
use tracing::info;

use crate::{
    input::spawn_stdin_reader,
    presenter::{ConsolePresenter, JsonPresenter},
    OutputFormat,
};

/// Runs one debugging session over `program`, reading commands from stdin.
pub fn run_session(
    program: Program,
    config: EngineConfig,
    mode: SessionMode,
    format: OutputFormat,
) -> Result<()> {
    let target = SimTarget::new(program)?;
    let commands = spawn_stdin_reader()?;
    let mut session = Session::new(target, config, mode, commands);

    let mut presenter: Box<dyn ResultPresenter> = match format {
        OutputFormat::Text => Box::new(ConsolePresenter::new(io::stdout())),
        OutputFormat::Json => Box::new(JsonPresenter::new(io::stdout())),
    };
    session.run(presenter.as_mut())?;

    let state = session.into_state();
    info!(mode = %state.mode, steps = state.history.len(), "Session finished");
    Ok(())
}
