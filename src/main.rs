mod bridge;
mod config;
mod discord;
mod error;
mod http_server;
mod logging;
mod ports;
mod services;
mod spotify_rs;
mod track;

use std::path::PathBuf;

use clap::Parser;
use color_eyre::{Result, eyre::Context};

use crate::bridge::BridgeOptions;
use crate::config::CredentialArgs;
use crate::logging::init_tracing;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port for the HTTP server (OAuth callback and debug endpoints)
    #[arg(short, long, default_value = "8080", env = "PORT")]
    port: u16,

    /// Tracing filter directive
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Log full message payloads, playlist metadata and filtered track IDs
    #[arg(
        long,
        env = "VERBOSE_LOGS_ENABLED",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    verbose_logs: Option<String>,

    /// Where the Spotify token is cached (default: ~/.discordbot/spotify_token.json)
    #[arg(long, env = "SPOTIFY_TOKEN_PATH")]
    token_path: Option<PathBuf>,

    #[command(flatten)]
    credentials: CredentialArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    // Must run before clap reads the environment
    dotenvy::dotenv().wrap_err("Failed to load .env file")?;

    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let token_path = match args.token_path {
        Some(path) => path,
        None => config::default_token_path()?,
    };

    bridge::run(BridgeOptions {
        port: args.port,
        verbose_logs: config::parse_verbose_flag(args.verbose_logs.as_deref()),
        token_path,
        credentials: args.credentials,
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_flag_without_value() {
        let args = Args::try_parse_from(["playlist-bridge", "--verbose-logs"]).unwrap();
        assert!(config::parse_verbose_flag(args.verbose_logs.as_deref()));
    }

    #[test]
    fn test_unparseable_verbose_value_is_accepted() {
        let args =
            Args::try_parse_from(["playlist-bridge", "--verbose-logs", "yes please"]).unwrap();
        assert_eq!(args.verbose_logs.as_deref(), Some("yes please"));
        assert!(!config::parse_verbose_flag(args.verbose_logs.as_deref()));
    }
}
