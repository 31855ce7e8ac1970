//! Config fixtures backed by a throwaway directory.

use std::path::PathBuf;

use redeven_config::{Config, DirectParams, LogFormat, LogLevel};
use redeven_permissions::PermissionPolicy;
use tempfile::TempDir;

/// A config file rooted in a temporary directory, deleted on drop.
///
/// Keeps the [`TempDir`] alive alongside the config path so callers can pass
/// `dir.config_path()` to [`redeven_config::load`]/[`redeven_config::save`]
/// without the directory being cleaned up underneath them.
pub struct TempConfigDir {
    dir: TempDir,
}

impl TempConfigDir {
    /// Create a fresh temporary directory for a config file.
    ///
    /// # Panics
    ///
    /// Panics if a temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self { dir: TempDir::new().expect("create temp config dir") }
    }

    /// Path to `config.json` inside the temp directory.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.json")
    }

    /// The temp directory's root, usable as a `root_dir`.
    #[must_use]
    pub fn root_dir(&self) -> PathBuf {
        self.dir.path().join("workspace")
    }
}

impl Default for TempConfigDir {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`Config`] with every field populated with deterministic test values.
#[must_use]
pub fn test_config() -> Config {
    Config {
        controlplane_base_url: "https://coordinator.test".to_string(),
        environment_id: "env-test-0001".to_string(),
        agent_instance_id: "agent-test-0001".to_string(),
        direct: DirectParams {
            ws_url: "wss://coordinator.test/direct".to_string(),
            channel_id: "chan-test-0001".to_string(),
            e2ee_psk_b64u: "dGVzdC1wc2s".to_string(),
            channel_init_expire_at_unix_s: 4_102_444_800,
            default_suite: "x25519-chacha20poly1305".to_string(),
        },
        permission_policy: PermissionPolicy::execute_read_write(),
        root_dir: None,
        shell: None,
        log_format: LogFormat::Text,
        log_level: LogLevel::Info,
    }
}
