//! Operator input.

use std::{
    io::{self, BufRead},
    sync::mpsc::{self, Receiver},
    thread,
};

use eyre::{Result, WrapErr};
use tracing::{debug, warn};

/// Spawns the thread reading operator commands from stdin, one per line.
///
/// The channel closes when stdin reaches end of file, which the session treats as `quit`.
pub fn spawn_stdin_reader() -> Result<Receiver<String>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("rdb-input".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to read operator input: {e}");
                        break;
                    }
                }
            }
            debug!("Operator input closed");
        })
        .wrap_err("Failed to spawn the input thread")?;
    Ok(rx)
}
