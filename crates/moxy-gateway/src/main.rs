use clap::Parser;
use moxy_gateway::config::Config;
use moxy_gateway::server::{GatewayServer, GatewayState};
use moxy_gateway::store::InMemoryStore;
use moxy_gateway::transport::HyperTransport;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "moxy-gateway", version, about)]
struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "MOXY_CONFIG")]
    config: PathBuf,

    /// Override the configured listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("moxy_gateway=info")),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::from_file(&args.config)?;
    if let Some(port) = args.port {
        config.listen.port = port;
    }

    let store = Arc::new(InMemoryStore::from_config(&config.store)?);
    if let Some(path) = &config.store.snapshot_path {
        store.load_from_file(path)?;
    }

    let transport = Arc::new(HyperTransport::new(&config.connection_pool)?);
    let state = Arc::new(GatewayState::new(
        store.clone(),
        transport,
        config.mock.ceiling(),
    ));

    let server = GatewayServer::bind(config.listen.socket_addr()?, state).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Gateway server stopped: {:#}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    if let Some(path) = &config.store.snapshot_path {
        store.save_to_file(path)?;
    }
    Ok(())
}
