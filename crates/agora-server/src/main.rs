//! Agora server binary: config, issuer key, then serve.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use agora_protocol::crypto;
use agora_server::{http, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "agora-server", version, about = "Realtime voting and chat server")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, e.g. 127.0.0.1:9470.
    #[arg(long)]
    listen: Option<String>,

    /// Ed25519 signing key path.
    #[arg(long)]
    key: Option<PathBuf>,

    /// JSON agenda seed file loaded at startup.
    #[arg(long)]
    seed: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ServerConfig::load(cli.config.as_deref())?;
    config.apply_env()?;
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }
    if let Some(key) = cli.key {
        config.key_path = key;
    }
    if let Some(seed) = cli.seed {
        config.seed_path = Some(seed);
    }

    let signing_key = crypto::load_or_create_keypair(&config.key_path)
        .with_context(|| format!("loading signing key from {}", config.key_path.display()))?;
    tracing::info!(
        fingerprint = %crypto::key_fingerprint(&signing_key.verifying_key()),
        key_path = %config.key_path.display(),
        "Issuer identity ready"
    );

    let state = http::AppState::new(signing_key, &config);

    if let Some(seed_path) = &config.seed_path {
        let loaded = state
            .directory
            .load_seed(seed_path)
            .await
            .with_context(|| format!("loading seed from {}", seed_path.display()))?;
        tracing::info!(loaded, "Startup seed applied");
    }

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "Agora server listening");
    axum::serve(listener, http::router(state)).await?;
    Ok(())
}
