mod config;
mod connection;
mod error;
mod server;

use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use playback_engine::PlaybackManager;
use server::Server;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "playback_server=info,playback_engine=info".into()),
        )
        .init();

    let args = config::CliArgs::parse();
    let config = config::Config::from_args(args);

    match config.player.locate() {
        Some(path) => tracing::info!("Using player {}", path.display()),
        None => tracing::warn!(
            "Player {} not found, play commands will fail until it is installed",
            config.player.program().display()
        ),
    }
    if !config.media_path.is_file() {
        tracing::warn!(
            "Media file {} does not exist yet",
            config.media_path.display()
        );
    }

    // The manager owns the only player process for the lifetime of the server
    let manager = Arc::new(PlaybackManager::new(
        config.player.clone(),
        config.stop_grace,
    ));

    let server = Server::bind(&config, Arc::clone(&manager)).await?;
    tracing::info!(
        "Remote playback service listening on {}, playing {}",
        server.local_addr()?,
        config.media_path.display()
    );

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            server::shutdown_signal().await;
            shutdown.cancel();
        }
    });

    server.run(shutdown).await;
    tracing::info!("Remote playback service stopped");

    Ok(())
}
