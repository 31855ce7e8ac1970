//! `redeven` — command-line entry point for the endpoint agent.
//!
//! A thin dispatcher: parse arguments (clap exits with code `2` on a usage
//! error on its own), hand off to the matching subcommand, and translate
//! any other failure into exit code `1`.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(unreachable_pub)]

mod bootstrap;
mod cli;
mod run;
mod version;

use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Bootstrap { controlplane, env_id, env_token, root_dir, shell, permission_policy, log_format, log_level, config } => {
            bootstrap::run(controlplane, env_id, env_token, root_dir, shell, permission_policy, log_format, log_level, config).await
        }
        Commands::Run { config } => run::run(config).await,
        Commands::Version => {
            version::run();
            Ok(())
        }
    };

    if let Err(error) = result {
        eprintln!("error: {error:#}");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}
