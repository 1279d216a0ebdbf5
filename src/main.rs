//! Chatrelay Server
//!
//! Run with: cargo run -- serve
//!
//! # Configuration
//!
//! Settings come from (later wins): built-in defaults, a TOML config file,
//! `CHATRELAY_*` environment variables, command-line flags.
//! `RUST_LOG` overrides the configured log level.

use anyhow::Context;
use chatrelay::api::{serve, AppState};
use chatrelay::config::{generate_default_config, Config, LoggingConfig};
use chatrelay::relay::RegistryConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "chatrelay")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Real-time chat broadcast relay over WebSocket")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the relay server
    Serve {
        /// Config file (default: search standard locations)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, host, port } => {
            let mut config = match config {
                Some(path) => Config::load_with_env(&path)
                    .with_context(|| format!("loading config from {:?}", path))?,
                None => Config::load_default(),
            };
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            init_tracing(&config.logging);
            run(config).await
        }
        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("writing config to {:?}", path))?;
                    println!("Wrote default config to {:?}", path);
                }
                None => print!("{}", content),
            }
            Ok(())
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting Chatrelay v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        max_username_len = config.relay.max_username_len,
        "Relay configured"
    );

    let handle = chatrelay::metrics::install_recorder();
    let registry_config = RegistryConfig::from(&config.relay);
    let state = AppState::new(config.server.clone(), registry_config, handle);

    serve(state, &config.server)
        .await
        .context("relay server failed")?;

    tracing::info!("Chatrelay stopped");
    Ok(())
}

/// Initialize the tracing subscriber from logging config
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("chatrelay={},tower_http=info", logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.is_json() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
