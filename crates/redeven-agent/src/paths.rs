//! Agent state file paths, alongside the config file.

use std::path::{Path, PathBuf};

/// Filesystem paths for agent state: the process lock file and the log
/// directory, both kept next to the config file.
pub struct AgentPaths {
    /// The directory the config file lives in (e.g. `~/.redeven/`).
    pub base_dir: PathBuf,
}

impl AgentPaths {
    /// Derive paths from the config file's parent directory.
    #[must_use]
    pub fn from_config_path(config_path: &Path) -> Self {
        let base_dir = config_path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self { base_dir }
    }

    /// The process lock file: holds this instance's pid while it runs.
    #[must_use]
    pub fn lock_file(&self) -> PathBuf {
        self.base_dir.join("agent.lock")
    }

    /// Log file path, when file-based logging is configured.
    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.base_dir.join("logs").join("agent.log")
    }
}
