use clap::Parser;
use oidc_gatekeeper::{config::Config, logging, run_server, shutdown};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// OIDC relying-party gatekeeper
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// TOML configuration file (skipped when missing)
    #[arg(short, long, default_value = "gatekeeper.toml")]
    config: PathBuf,

    /// Override server.port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override log.level
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load(Some(&args.config))?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(level) = args.log_level {
        config.log.level = level;
    }

    logging::init_tracing(&config.log)?;

    let (version, git_sha, build_timestamp) = logging::build_info();
    info!(
        version,
        git_sha,
        build_timestamp,
        log_level = %config.log.level,
        "Hello 👋"
    );

    let shutdown = CancellationToken::new();
    let listener = shutdown::spawn_signal_listener(shutdown.clone());

    let result = run_server(config, shutdown.clone()).await;

    // Startup failures return before any signal arrived
    shutdown.cancel();
    let _ = listener.await;

    if let Err(ref e) = result {
        error!("Server terminated: {:#}", e);
    }

    info!("Bye 👋");
    result
}
