use clap::Parser;
use tracing::metadata::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let cli = telecastctl::Cli::parse();
    if let Err(err) = telecastctl::run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
