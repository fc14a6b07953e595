// bases/playback_server/src/config.rs
use clap::Parser;
use playback_engine::PlayerCommand;
use std::path::PathBuf;
use std::time::Duration;

/// Playback server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Interface to listen on
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Pending connection queue length
    pub backlog: u32,

    /// The one media file every play command starts
    pub media_path: PathBuf,

    /// External player used for playback
    pub player: PlayerCommand,

    /// How long a player gets to exit before it is killed
    pub stop_grace: Duration,

    /// Upper bound for a client to send its command line
    pub read_timeout: Option<Duration>,
}

/// Remote playback service - plays a media file on command from a gateway
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Interface to listen on
    #[arg(long, default_value = "0.0.0.0", env = "REMOTE_PLAYER_HOST")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8899, env = "REMOTE_PLAYER_PORT")]
    pub port: u16,

    /// Media file to play whenever a command arrives
    #[arg(short, long, env = "REMOTE_PLAYER_MEDIA")]
    pub media: PathBuf,

    /// Player executable
    #[arg(long, default_value = PlayerCommand::DEFAULT_PROGRAM, env = "REMOTE_PLAYER_PROGRAM")]
    pub player: PathBuf,

    /// Argument passed to the player before the media path (repeatable)
    ///
    /// Defaults to `-nodisp -autoexit -loglevel quiet` when none are given.
    #[arg(long = "player-arg", allow_hyphen_values = true)]
    pub player_args: Vec<String>,

    /// Milliseconds a stopped player gets before it is killed
    #[arg(long, default_value_t = 3000)]
    pub stop_grace_ms: u64,

    /// Seconds to wait for a client's command line (waits forever if unset)
    #[arg(long)]
    pub read_timeout_secs: Option<u64>,

    /// Listen backlog
    #[arg(long, default_value_t = 5)]
    pub backlog: u32,
}

impl Config {
    /// Create configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Self {
        let player = if args.player_args.is_empty() {
            PlayerCommand::new(args.player, PlayerCommand::DEFAULT_ARGS)
        } else {
            PlayerCommand::new(args.player, args.player_args)
        };

        Self {
            host: args.host,
            port: args.port,
            backlog: args.backlog,
            media_path: args.media,
            player,
            stop_grace: Duration::from_millis(args.stop_grace_ms),
            read_timeout: args.read_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
