//! Logging configuration for RDB components
//!
//! Provides centralized logging setup with:
//! - Console output on stderr, so that stdout stays reserved for the debugger console
//! - Optional file logging to a temporary directory with daily rotation
//! - Environment variable support (RUST_LOG)

use eyre::{eyre, Result};
use std::{env, fs, io, path::PathBuf, sync::Once};
use tracing::Level;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, time::LocalTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize logging for an RDB component
///
/// This function sets up:
/// - Compact console logging on stderr with timestamps
/// - File logging to `<tmp>/rdb-logs/<component>/` with daily rotation, when enabled
/// - Environment variable support for log levels (RUST_LOG), falling back to `default_level`
///
/// # Arguments
/// * `component_name` - Name of the component (e.g., "rdb")
/// * `enable_file_logging` - Whether to also write logs to a rolling file
/// * `default_level` - Level used when RUST_LOG is not set
///
/// # Returns
/// The guard of the non-blocking file writer when file logging is enabled. Dropping it
/// flushes and stops the writer, so callers keep it alive for the whole session.
pub fn init_logging(
    component_name: &str,
    enable_file_logging: bool,
    default_level: Level,
) -> Result<Option<WorkerGuard>> {
    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_timer(LocalTime::rfc_3339())
        .with_writer(io::stderr)
        .compact();

    let registry =
        tracing_subscriber::registry().with(env_filter(default_level)?).with(console_layer);

    let guard = if enable_file_logging {
        let log_dir = create_log_directory(component_name)?;
        let file_appender = rolling::daily(&log_dir, format!("{component_name}.log"));
        let (non_blocking_appender, guard) = non_blocking(file_appender);

        let file_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(LocalTime::rfc_3339())
            .with_ansi(false)
            .with_writer(non_blocking_appender);

        registry
            .with(file_layer)
            .try_init()
            .map_err(|e| eyre!("Failed to initialize tracing subscriber: {e}"))?;

        tracing::info!(
            component = component_name,
            log_dir = %log_dir.display(),
            "Logging initialized with console and file output"
        );
        Some(guard)
    } else {
        registry.try_init().map_err(|e| eyre!("Failed to initialize tracing subscriber: {e}"))?;
        tracing::debug!(component = component_name, "Logging initialized with console output only");
        None
    };

    log_environment_info(component_name);
    Ok(guard)
}

/// Environment filter honoring RUST_LOG, with `default_level` as fallback
fn env_filter(default_level: Level) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level.as_str()))
        .map_err(|e| eyre!("Failed to create environment filter: {e}"))
}

/// Create log directory in system temp folder
fn create_log_directory(component_name: &str) -> Result<PathBuf> {
    let log_dir = env::temp_dir().join("rdb-logs").join(component_name);
    fs::create_dir_all(&log_dir)?;
    Ok(log_dir)
}

/// Log useful environment information
fn log_environment_info(component_name: &str) {
    let rust_log = env::var("RUST_LOG").unwrap_or_default();
    let args: Vec<String> = env::args().collect();

    tracing::debug!(
        component = component_name,
        rust_log = %rust_log,
        args = ?args,
        "Environment information"
    );
}

/// Initialize simple logging (console only, no file output)
///
/// Useful for tests and small utilities.
pub fn init_simple_logging(level: Level) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level)?)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .try_init()
        .map_err(|e| eyre!("Failed to initialize simple logging: {e}"))
}

// Ensures test logging is only set up once per test process
static TEST_LOGGING_INIT: Once = Once::new();

/// Safe logging initialization for tests - can be called multiple times
///
/// Uses `std::sync::Once` so that only the first call installs a subscriber. Defaults
/// to INFO but respects RUST_LOG.
///
/// # Usage
/// ```rust
/// use rdb_common::logging;
///
/// logging::ensure_test_logging(None);
/// tracing::info!("This works safely in any test");
/// ```
pub fn ensure_test_logging(default_level: Option<Level>) {
    TEST_LOGGING_INIT.call_once(|| {
        // A failure here means a subscriber is already installed, which is fine
        let _ = init_simple_logging(default_level.unwrap_or(Level::INFO));
    });
}
