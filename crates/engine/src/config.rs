//! Engine configuration.
//!
//! [`EngineConfig`] is a plain value threaded through session construction. It can be
//! persisted as TOML (by default at `~/.rdb.toml`); every field has a default so
//! partial files are accepted.

use std::{fs, path::Path, path::PathBuf, time::Duration};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Name of the configuration file in the user's home directory
const CONFIG_FILE_NAME: &str = ".rdb.toml";

/// Limits applied when capturing variable trees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureLimits {
    /// Maximum nesting depth; top-level variables are at depth 0
    pub max_depth: usize,
    /// Maximum number of children kept per composite value
    pub max_width: usize,
}

/// Configuration for the debugger engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Name of the designated entry routine of the target
    pub entry_method: String,
    /// Class owning the entry routine. `None` accepts the first loaded class
    pub entry_class: Option<String>,
    /// Source file extension appended to bare file names in breakpoints
    pub source_extension: String,
    /// Class patterns that single-step requests never stop in
    pub step_exclusions: Vec<String>,
    /// Maximum variable tree depth
    pub max_variable_depth: usize,
    /// Maximum children per composite variable
    pub max_variable_width: usize,
    /// Number of recorded snapshots between two progress notices
    pub progress_interval: usize,
    /// Bounded wait, in milliseconds, when blocking for operator input
    pub command_poll_interval_ms: u64,
    /// In interactive sessions, stop before the entry routine runs
    pub stop_on_entry: bool,
    /// `file:line` breakpoints armed when the target class is loaded
    pub initial_breakpoints: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            entry_method: "main".into(),
            entry_class: None,
            source_extension: "java".into(),
            step_exclusions: ["java.*", "javax.*", "sun.*", "com.sun.*", "jdk.*"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_variable_depth: 3,
            max_variable_width: 50,
            progress_interval: 100,
            command_poll_interval_ms: 100,
            stop_on_entry: true,
            initial_breakpoints: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Set the designated entry routine
    pub fn with_entry_method(mut self, method: impl Into<String>) -> Self {
        self.entry_method = method.into();
        self
    }

    /// Restrict entry detection to one class
    pub fn with_entry_class(mut self, class: impl Into<String>) -> Self {
        self.entry_class = Some(class.into());
        self
    }

    /// Set the variable capture limits
    pub fn with_capture_limits(mut self, max_depth: usize, max_width: usize) -> Self {
        self.max_variable_depth = max_depth;
        self.max_variable_width = max_width;
        self
    }

    /// Set the recording progress interval
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Enable or disable stopping before the entry routine
    pub fn with_stop_on_entry(mut self, stop: bool) -> Self {
        self.stop_on_entry = stop;
        self
    }

    /// Add a `file:line` breakpoint armed at class load
    pub fn with_initial_breakpoint(mut self, location: impl Into<String>) -> Self {
        self.initial_breakpoints.push(location.into());
        self
    }

    /// Set the operator input poll interval
    pub fn with_command_poll_interval(mut self, interval: Duration) -> Self {
        self.command_poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Variable capture limits
    pub fn capture_limits(&self) -> CaptureLimits {
        CaptureLimits { max_depth: self.max_variable_depth, max_width: self.max_variable_width }
    }

    /// Operator input poll interval
    pub fn command_poll_interval(&self) -> Duration {
        Duration::from_millis(self.command_poll_interval_ms.max(1))
    }

    /// Default location of the configuration file
    pub fn default_path() -> Result<PathBuf> {
        let home =
            dirs::home_dir().ok_or_else(|| eyre::eyre!("Unable to determine home directory"))?;
        Ok(home.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load configuration from the default location, falling back to defaults when the
    /// file does not exist
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            info!("Config file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).with_context(|| "Failed to serialize config to TOML")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        debug!("Saved configuration to {}", path.display());
        Ok(())
    }
}
