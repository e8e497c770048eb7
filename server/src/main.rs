use chase_server::{Server, ServerConfig};
use chase_shared::{DEFAULT_PORT, MAX_BOTS, MAX_PLAYERS};
use clap::Parser;
use log::{error, info};
use std::net::{IpAddr, SocketAddr};
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(author, version, about = "Chase arena server")]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// TCP port to listen on
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_PORT,
        value_parser = clap::value_parser!(u16).range(1024..)
    )]
    port: u16,

    /// Number of bots roaming the board
    #[arg(
        short,
        long,
        default_value_t = 3,
        value_parser = clap::value_parser!(u8).range(1..=MAX_BOTS as i64)
    )]
    bots: u8,

    /// Maximum number of concurrent players
    #[arg(
        short,
        long,
        default_value_t = MAX_PLAYERS as u8,
        value_parser = clap::value_parser!(u8).range(1..=MAX_PLAYERS as i64)
    )]
    max_players: u8,

    /// Seed for placement and bot movement
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig {
        bind_addr: SocketAddr::new(args.host, args.port),
        bot_count: usize::from(args.bots),
        max_players: usize::from(args.max_players),
        seed: args.seed,
        ..ServerConfig::default()
    };

    info!("Starting chase server on {}", config.bind_addr);
    let server = Server::bind(config).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut server_handle = tokio::spawn(server.run(shutdown_rx));

    tokio::select! {
        result = &mut server_handle => {
            if let Err(e) = result {
                error!("Server task panicked: {}", e);
            }
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    let _ = shutdown_tx.send(true);
    server_handle.await?;
    Ok(())
}
