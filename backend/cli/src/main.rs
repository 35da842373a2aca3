mod config;
mod status_cmd;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use keyrelay_core::{Component, RelayBus};
use keyrelay_gateway::{Dispatcher, GatewayState, Relay, SessionRegistry};

use config::Config;

#[derive(Parser)]
#[command(name = "keyrelay")]
#[command(about = "KeyRelay: relay for end-to-end encrypted chat clients")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
        /// Address to bind the HTTP server to
        #[arg(short, long)]
        bind: Option<String>,
        /// Capacity of the inbound queue
        #[arg(long)]
        queue_capacity: Option<usize>,
    },
    /// Show whether a relay is running and how many clients it holds
    Status {
        /// Port the relay listens on
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse first so --help and --version work whatever the environment holds.
    let cli = Cli::parse();

    let config = Config::from_env()?;

    keyrelay_logging::init_logger(config.log_dir.as_deref(), &config.log_level);

    match cli.command {
        Commands::Serve {
            port,
            bind,
            queue_capacity,
        } => {
            let config = Config {
                port: port.unwrap_or(config.port),
                bind_address: bind.unwrap_or(config.bind_address),
                queue_capacity: queue_capacity.unwrap_or(config.queue_capacity),
                ..config
            };
            run_server(config).await?;
        }
        Commands::Status { port } => {
            status_cmd::run(port.unwrap_or(config.port)).await?;
        }
    }

    Ok(())
}

async fn run_server(config: Config) -> Result<()> {
    let addr = config.listen_addr()?;
    info!(
        addr = %addr,
        queue_capacity = config.queue_capacity,
        index = %config.index_path.display(),
        "Starting KeyRelay"
    );

    let mut bus = RelayBus::with_capacity(config.queue_capacity);
    let registry = SessionRegistry::new();

    let dispatcher = Dispatcher::new(registry.clone());
    let inbound_rx = bus
        .take_inbound_rx()
        .ok_or_else(|| anyhow::anyhow!("inbound receiver already taken"))?;

    tokio::spawn(async move {
        if let Err(e) = dispatcher.start(inbound_rx).await {
            error!(error = %e, "Dispatcher task failed");
        }
    });

    let relay = Relay::new(registry, bus.inbound_tx.clone());
    let state = GatewayState::new(relay, config.index_path.clone());

    keyrelay_gateway::start_server(addr, state).await
}
