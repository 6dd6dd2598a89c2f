//! `matterbridge`: relay messages between an IRC network and a Mattermost team.

use clap::{Parser, Subcommand};
use matterbridge_core::{BridgeConfig, RemoteMode};
use matterbridge_relay::Bridge;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "matterbridge", version, about = "IRC <-> Mattermost bridge")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "matterbridge.toml")]
    config: PathBuf,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Run the bridge (default)
    Run,
    /// Validate the configuration and print the channel mapping
    Check,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_summary(config: &BridgeConfig) {
    let map = config.channel_map();
    println!(
        "IRC {}:{} as {} (tls: {})",
        config.irc.server, config.irc.port, config.irc.nick, config.irc.use_tls
    );
    match config.mattermost.mode {
        RemoteMode::Api => println!(
            "Mattermost API {} team {}",
            config.mattermost.server, config.mattermost.team
        ),
        RemoteMode::Webhook => println!(
            "Mattermost webhooks, listening on {}",
            config.mattermost.bind_address
        ),
    }
    println!("Default: {} <-> {}", map.default_irc(), map.default_remote());
    for mapping in &config.channels {
        println!("  {} <-> {}", mapping.irc, mapping.mattermost);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine.
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json);
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded environment file");
    }

    let config = BridgeConfig::load_with_env(&cli.config).map_err(|e| {
        anyhow::anyhow!("Invalid configuration '{}': {}", cli.config.display(), e)
    })?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Check => {
            print_summary(&config);
            println!("Configuration OK");
        }
        Commands::Run => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => info!("Shutdown requested"),
                    Err(e) => warn!(error = %e, "Cannot listen for Ctrl-C"),
                }
                on_signal.cancel();
            });

            info!(config = %cli.config.display(), "Starting matterbridge");
            if let Err(e) = Bridge::new(config).run(cancel).await {
                error!(error = %e, "Bridge stopped with a fatal error");
                return Err(e.into());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["matterbridge"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("matterbridge.toml"));
        assert_eq!(cli.log_level, "info");
        assert!(!cli.json);
        assert_eq!(cli.command, None);
    }

    #[test]
    fn test_flags_and_subcommand() {
        let cli = Cli::try_parse_from([
            "matterbridge",
            "--config",
            "/etc/matterbridge.toml",
            "--log-level",
            "debug",
            "--json",
            "check",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/matterbridge.toml"));
        assert_eq!(cli.log_level, "debug");
        assert!(cli.json);
        assert_eq!(cli.command, Some(Commands::Check));
    }
}
