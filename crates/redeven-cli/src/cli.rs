//! `redeven` argument grammar.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// `redeven` — endpoint agent for the redeven coordinator.
#[derive(Parser)]
#[command(name = "redeven")]
#[command(author, version, about = "redeven agent: bootstrap, run, or inspect a local endpoint", long_about = None)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Exchange an environment token for direct credentials and write the
    /// local config file.
    Bootstrap {
        /// The coordinator's base HTTP(S) URL.
        #[arg(long)]
        controlplane: String,
        /// This environment's id, as assigned by the coordinator.
        #[arg(long = "env-id")]
        env_id: String,
        /// One-time environment token exchanged for direct credentials.
        #[arg(long = "env-token")]
        env_token: String,
        /// Filesystem root all virtual paths resolve inside. Defaults to
        /// `$HOME` at runtime if unset here.
        #[arg(long = "root-dir")]
        root_dir: Option<PathBuf>,
        /// Shell command used to spawn terminal sessions. Defaults to
        /// `$SHELL`, falling back to `/bin/bash`, if unset here.
        #[arg(long)]
        shell: Option<String>,
        /// The local permission cap.
        #[arg(long = "permission-policy", value_enum, default_value = "execute_read")]
        permission_policy: PermissionPolicyArg,
        /// Log output format.
        #[arg(long = "log-format", value_enum, default_value = "text")]
        log_format: LogFormatArg,
        /// Log verbosity.
        #[arg(long = "log-level", value_enum, default_value = "info")]
        log_level: LogLevelArg,
        /// Write the config to this path instead of the default
        /// (`~/.redeven/config.json`).
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Start the agent supervisor.
    Run {
        /// Path to the config file. Defaults to `~/.redeven/config.json`.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print build info and exit.
    Version,
}

/// CLI mirror of [`redeven_permissions::PermissionPolicy`]'s named presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum PermissionPolicyArg {
    /// Read and execute, never write.
    ExecuteRead,
    /// Read only.
    ReadOnly,
    /// Read, write, and execute.
    ExecuteReadWrite,
}

impl PermissionPolicyArg {
    /// Build the corresponding [`redeven_permissions::PermissionPolicy`].
    #[must_use]
    pub fn resolve(self) -> redeven_permissions::PermissionPolicy {
        match self {
            Self::ExecuteRead => redeven_permissions::PermissionPolicy::execute_read(),
            Self::ReadOnly => redeven_permissions::PermissionPolicy::read_only(),
            Self::ExecuteReadWrite => redeven_permissions::PermissionPolicy::execute_read_write(),
        }
    }
}

/// CLI mirror of [`redeven_config::LogFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    /// Machine-parseable JSON lines.
    Json,
    /// Human-readable text.
    Text,
}

impl From<LogFormatArg> for redeven_config::LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Json => Self::Json,
            LogFormatArg::Text => Self::Text,
        }
    }
}

/// CLI mirror of [`redeven_config::LogLevel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevelArg {
    /// Verbose diagnostic output.
    Debug,
    /// Normal operational logging.
    Info,
    /// Recoverable problems.
    Warn,
    /// Failures.
    Error,
}

impl From<LogLevelArg> for redeven_config::LogLevel {
    fn from(value: LogLevelArg) -> Self {
        match value {
            LogLevelArg::Debug => Self::Debug,
            LogLevelArg::Info => Self::Info,
            LogLevelArg::Warn => Self::Warn,
            LogLevelArg::Error => Self::Error,
        }
    }
}
