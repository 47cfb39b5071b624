use std::path::PathBuf;

use clap::Parser;
use shardkv::server::config::{NodeConfig, DEFAULT_PORT};
use shardkv::server::Server;
use shardkv::store::Store;
use shardkv::telemetry::init_telemetry;
use tokio::sync::watch;

#[derive(Debug, Parser)]
#[command(name = "shardkv-node")]
#[command(about = "shardkv backend node", long_about = None)]
struct Cli {
    /// Port to serve the store on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// JSON configuration file. Overrides the flags when provided
    #[arg(long)]
    config_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry();
    let args = Cli::parse();

    let config = match args.config_path {
        Some(path) => NodeConfig::load(path).await?,
        None => NodeConfig { port: args.port },
    };

    // ctrl-c tears down the store actor and the HTTP server together
    let (shutdown_sender, shutdown_receiver) = watch::channel(());
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        drop(shutdown_sender);
    });

    let store = Store::new(closed(shutdown_receiver.clone()));
    let server = Server::new(config, store).await?;
    server.run(closed(shutdown_receiver)).await?;

    Ok(())
}

async fn closed(mut shutdown: watch::Receiver<()>) {
    while shutdown.changed().await.is_ok() {}
}
