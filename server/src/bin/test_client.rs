//! Scripted client for poking at a running arena.
//!
//! Connects, wanders in random directions and asks to continue whenever it
//! dies. Field updates are logged as a player table.

use chase_server::display::stats_panel;
use chase_server::network::{read_record, write_record};
use chase_shared::{Direction, Packet, DEFAULT_PORT};
use clap::Parser;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Parser, Debug)]
#[command(author, version, about = "Scripted chase client")]
struct Args {
    /// Server host
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Number of moves to send before disconnecting
    #[arg(short, long, default_value_t = 50)]
    moves: u32,

    /// Milliseconds between moves
    #[arg(short, long, default_value_t = 250)]
    interval_ms: u64,

    /// Seed for the move sequence
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let stream = TcpStream::connect((args.host.as_str(), args.port)).await?;
    info!("Connected to {}", stream.peer_addr()?);
    let (mut reader, mut writer) = stream.into_split();

    write_record(&mut writer, &Packet::Connect).await?;
    match read_record(&mut reader).await? {
        Some(Packet::BallInfo { ball }) => info!(
            "Playing as '{}' at ({}, {}) with {} hp",
            ball.glyph, ball.x, ball.y, ball.health
        ),
        Some(Packet::Reject) => {
            warn!("Server is full");
            return Ok(());
        }
        other => {
            warn!("Unexpected reply to connect: {:?}", other);
            return Ok(());
        }
    }

    let (packet_tx, mut packets) = mpsc::channel(32);
    tokio::spawn(async move {
        while let Ok(Some(packet)) = read_record(&mut reader).await {
            if packet_tx.send(packet).await.is_err() {
                break;
            }
        }
    });

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut ticker = interval(Duration::from_millis(args.interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sent = 0;

    while sent < args.moves {
        tokio::select! {
            _ = ticker.tick() => {
                let direction = *Direction::MOVES.choose(&mut rng).unwrap_or(&Direction::None);
                write_record(&mut writer, &Packet::Move { direction }).await?;
                sent += 1;
            }
            packet = packets.recv() => match packet {
                Some(Packet::FieldStatus { field }) => {
                    info!("Field update:\n{}", stats_panel(&field));
                }
                Some(Packet::HealthZero) => {
                    info!("Out of health, continuing");
                    write_record(&mut writer, &Packet::ContinueGame).await?;
                }
                Some(other) => warn!("Unexpected packet: {:?}", other),
                None => {
                    info!("Server closed the connection");
                    return Ok(());
                }
            },
        }
    }

    write_record(&mut writer, &Packet::Disconnect).await?;
    info!("Sent {} moves, disconnected", sent);
    Ok(())
}
