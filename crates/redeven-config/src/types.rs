use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use redeven_permissions::PermissionPolicy;

/// Log output format: `json` or `text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Structured, machine-parseable JSON lines.
    Json,
    /// Human-readable text.
    Text,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self::Text
    }
}

/// Log verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose diagnostic output.
    Debug,
    /// Normal operational logging.
    Info,
    /// Recoverable problems.
    Warn,
    /// Failures.
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    /// The `tracing` directive string for this level.
    #[must_use]
    pub const fn as_tracing_directive(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Cached control-channel handshake parameters, produced by `redeven
/// bootstrap` and consumed by the control-channel client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectParams {
    /// The coordinator's direct WebSocket endpoint.
    pub ws_url: String,
    /// The tunnel channel id this agent owns.
    pub channel_id: String,
    /// Base64url-encoded pre-shared key for the end-to-end encrypted
    /// handshake (opaque to this crate; consumed only by the handshake
    /// library).
    pub e2ee_psk_b64u: String,
    /// Unix seconds after which this channel's init parameters expire.
    pub channel_init_expire_at_unix_s: i64,
    /// The negotiated cipher suite identifier.
    pub default_suite: String,
}

/// Immutable, validated agent configuration.
///
/// Every path operation is bounded by `root_dir`; every persisted value is
/// written atomically (temp file + rename, mode `0600`) by [`crate::save`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The coordinator's base HTTP(S) URL.
    pub controlplane_base_url: String,
    /// This environment's id, as assigned by the coordinator.
    pub environment_id: String,
    /// This agent instance's stable id. Generated on first bootstrap if
    /// absent (see [`crate::load`]).
    pub agent_instance_id: String,
    /// Cached control-channel handshake parameters.
    pub direct: DirectParams,
    /// The local permission cap and per-user/per-app overrides.
    #[serde(default)]
    pub permission_policy: PermissionPolicy,
    /// The absolute filesystem root all virtual paths resolve inside.
    /// Defaults to `$HOME` if unset.
    #[serde(default)]
    pub root_dir: Option<PathBuf>,
    /// The shell command used to spawn terminal sessions. Defaults to
    /// `$SHELL`, falling back to `/bin/bash`.
    #[serde(default)]
    pub shell: Option<String>,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
    /// Log verbosity.
    #[serde(default)]
    pub log_level: LogLevel,
}

impl Config {
    /// Resolve `root_dir`, falling back to `$HOME`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ConfigError::NoHomeDirectory`] if `root_dir` is
    /// unset and `$HOME` cannot be resolved.
    pub fn resolved_root_dir(&self) -> crate::ConfigResult<PathBuf> {
        if let Some(root) = &self.root_dir {
            return Ok(root.clone());
        }
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or(crate::ConfigError::NoHomeDirectory)
    }

    /// Resolve the shell command, falling back to `$SHELL` then
    /// `/bin/bash`.
    #[must_use]
    pub fn resolved_shell(&self) -> String {
        self.shell.clone().unwrap_or_else(|| {
            std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string())
        })
    }
}
