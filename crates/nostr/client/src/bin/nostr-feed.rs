use anyhow::Context;
use clap::{Parser, Subcommand};
use nostr_client::{
    CLOSE_GRACE, FeedClient, FeedConfig, drain_pending_closes, load_config, load_config_or_default,
};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::prelude::*;

const DEFAULT_CONFIG_FILE: &str = "nostr-feed.json";

#[derive(Parser, Debug)]
#[command(
    name = "nostr-feed",
    about = "Read an author's posts and profile from Nostr relays",
    version
)]
struct Opts {
    /// Config file (JSON). Defaults to ./nostr-feed.json when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Relay to query; repeat to query several. Replaces the configured list
    #[arg(long = "relay", global = true)]
    relays: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print an author's posts, newest first
    Posts { npub: String },
    /// Print an author's latest profile metadata
    Profile { npub: String },
    /// Convert an npub to hex
    Decode { npub: String },
    /// Convert a hex public key to an npub
    Encode { hex: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();
    init_tracing();

    let output = match &opts.command {
        Command::Decode { npub } => nostr::npub_to_hex(npub)?,
        Command::Encode { hex } => nostr::hex_to_npub(hex)?,
        Command::Posts { npub } => {
            let client = FeedClient::new(resolve_config(&opts)?)?;
            serde_json::to_string_pretty(&client.fetch_posts(npub).await?)?
        }
        Command::Profile { npub } => {
            let client = FeedClient::new(resolve_config(&opts)?)?;
            serde_json::to_string_pretty(&client.fetch_profile(npub).await?)?
        }
    };
    println!("{output}");

    // Let relay sockets finish closing before the runtime goes away
    if !drain_pending_closes(CLOSE_GRACE).await {
        debug!("Exiting with relay close handshakes still running");
    }
    Ok(())
}

fn resolve_config(opts: &Opts) -> anyhow::Result<FeedConfig> {
    let mut config = match &opts.config {
        Some(path) => load_config(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => load_config_or_default(DEFAULT_CONFIG_FILE)?,
    };

    if !opts.relays.is_empty() {
        config.relays = opts.relays.clone();
    }
    debug!("Querying relays: {:?}", config.relays);
    Ok(config)
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
