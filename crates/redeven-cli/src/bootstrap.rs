//! `redeven bootstrap`: exchange an environment token for direct credentials
//! and write the local config file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::cli::{LogFormatArg, LogLevelArg, PermissionPolicyArg};

/// The coordinator's response to a bootstrap request: the direct
/// credentials and tunnel handshake parameters this agent will use from
/// then on.
#[derive(Debug, Deserialize)]
struct BootstrapResponse {
    ws_url: String,
    channel_id: String,
    e2ee_psk_b64u: String,
    channel_init_expire_at_unix_s: i64,
    default_suite: String,
}

/// Run `redeven bootstrap`.
///
/// # Errors
///
/// Returns an error if the coordinator request fails or returns a non-2xx
/// status, or if the resulting config cannot be written.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    controlplane: String,
    env_id: String,
    env_token: String,
    root_dir: Option<PathBuf>,
    shell: Option<String>,
    permission_policy: PermissionPolicyArg,
    log_format: LogFormatArg,
    log_level: LogLevelArg,
    config_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let url = format!("{}/v1/environments/{env_id}/bootstrap", controlplane.trim_end_matches('/'));

    let response = client
        .post(&url)
        .bearer_auth(&env_token)
        .send()
        .await
        .map_err(|source| anyhow::anyhow!("bootstrap request to {url} failed: {source}"))?;

    if !response.status().is_success() {
        anyhow::bail!("bootstrap request to {url} returned {}", response.status());
    }

    let body: BootstrapResponse = response.json().await.map_err(|source| anyhow::anyhow!("malformed bootstrap response: {source}"))?;

    let config = redeven_config::Config {
        controlplane_base_url: controlplane,
        environment_id: env_id,
        agent_instance_id: uuid::Uuid::new_v4().to_string(),
        direct: redeven_config::DirectParams {
            ws_url: body.ws_url,
            channel_id: body.channel_id,
            e2ee_psk_b64u: body.e2ee_psk_b64u,
            channel_init_expire_at_unix_s: body.channel_init_expire_at_unix_s,
            default_suite: body.default_suite,
        },
        permission_policy: permission_policy.resolve(),
        root_dir,
        shell,
        log_format: log_format.into(),
        log_level: log_level.into(),
    };

    let path = resolve_config_path(config_path.as_deref())?;
    redeven_config::save(&config, &path)?;

    println!("wrote config to {}", path.display());
    Ok(())
}

fn resolve_config_path(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(redeven_config::default_config_path()?),
    }
}
