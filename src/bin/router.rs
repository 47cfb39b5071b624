use std::path::PathBuf;

use clap::Parser;
use shardkv::router::config::{RouterConfig, DEFAULT_BACKEND_PORTS, DEFAULT_LISTEN_PORT};
use shardkv::router::Router;
use shardkv::telemetry::init_telemetry;

#[derive(Debug, Parser)]
#[command(name = "shardkv-router")]
#[command(about = "shardkv routing front-end", long_about = None)]
struct Cli {
    /// Comma separated list of backend ports (host is always localhost)
    #[arg(long, default_value = DEFAULT_BACKEND_PORTS)]
    ports: String,
    /// Port to listen on
    #[arg(long, default_value_t = DEFAULT_LISTEN_PORT)]
    listen_port: u16,
    /// JSON configuration file. Overrides the flags when provided
    #[arg(long)]
    config_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry();
    let args = Cli::parse();

    let config = match args.config_path {
        Some(path) => RouterConfig::load(path).await?,
        None => {
            let mut config = RouterConfig::from_ports(RouterConfig::parse_ports(&args.ports)?);
            config.listen_port = args.listen_port;
            config
        }
    };

    let router = Router::new(config).await?;
    router
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
