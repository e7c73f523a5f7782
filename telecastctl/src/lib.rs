mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use thiserror::Error;

pub use commands::{guide::GuideArgs, manifest::ManifestArgs};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] telecast_core::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("unknown channel `{0}`")]
    UnknownChannel(String),
    #[error("channel `{0}` has not started broadcasting")]
    ChannelNotStarted(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Telecast command-line control interface", long_about = None)]
pub struct Cli {
    /// Output format for listing commands
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the broadcast engine: pre-generate bundles, watch definitions,
    /// keep the guide cache warm
    Run,
    /// One-shot pre-generation pass over every configured channel
    Generate,
    /// List configured channels and their broadcast state
    Channels,
    /// Print the live manifest a client would receive
    Manifest(ManifestArgs),
    /// Print a channel's programming-day schedule
    Guide(GuideArgs),
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run => commands::engine::execute().await,
        Commands::Generate => commands::generate::execute().await,
        Commands::Channels => commands::channels::execute(cli.format),
        Commands::Manifest(args) => commands::manifest::execute(args),
        Commands::Guide(args) => commands::guide::execute(args, cli.format),
    }
}
