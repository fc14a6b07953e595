use clap::Parser;
use color_eyre::Result;
use std::time::Duration;
mod commands;

use commands::Commands;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address of the remote playback service
    #[arg(long, default_value = "127.0.0.1:8899", env = "REMOTE_PLAYER_ADDR")]
    addr: String,

    /// Seconds to wait for the reply
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let client = media_client::MediaClient::new(cli.addr)
        .with_timeout(Duration::from_secs(cli.timeout_secs));

    let path = match cli.command {
        Commands::Play { params } => {
            let params = commands::parse_params(&params)?;
            client.play(params).await?
        }
        Commands::Raw { json } => client.send_line(&json).await?,
    };

    println!("Remote device started playing {}", path.display());

    Ok(())
}
