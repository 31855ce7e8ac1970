//! `redeven run`: start the agent supervisor.

use std::path::{Path, PathBuf};

use redeven_telemetry::{LogConfig, LogFormat, setup_logging};

/// Run `redeven run`.
///
/// Reads the config once up front purely to pick a logging format/level
/// before the supervisor takes over; the supervisor reloads and validates
/// the config itself as part of its startup order.
///
/// # Errors
///
/// Returns an error if the config path cannot be resolved, the process
/// lock cannot be acquired, or the supervisor itself fails to start.
pub async fn run(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = resolve_config_path(config_path.as_deref())?;

    if let Ok(config) = redeven_config::load(&path) {
        let format = match config.log_format {
            redeven_config::LogFormat::Json => LogFormat::Json,
            redeven_config::LogFormat::Text => LogFormat::Compact,
        };
        let log_config = LogConfig::new(config.log_level.as_tracing_directive()).with_format(format);
        if let Err(error) = setup_logging(&log_config) {
            eprintln!("failed to initialize logging: {error}");
        }
    }

    redeven_agent::run(&path).await?;
    Ok(())
}

fn resolve_config_path(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(redeven_config::default_config_path()?),
    }
}
