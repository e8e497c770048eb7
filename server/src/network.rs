//! TCP front end: record framing, the listener and task wiring.

use crate::config::ServerConfig;
use crate::coordinator::{ArenaCommand, Coordinator};
use crate::display::BoardSink;
use crate::error::ServerError;
use crate::populators;
use crate::session::run_session;
use chase_shared::{decode_record, encode_record, Packet, RecordError, RECORD_SIZE};
use log::{error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};

/// Reads one fixed-size record.
///
/// Returns `Ok(None)` when the peer closes the stream on a record boundary.
/// A stream that ends partway through a record is an I/O error.
pub async fn read_record<R>(reader: &mut R) -> Result<Option<Packet>, RecordError>
where
    R: AsyncRead + Unpin,
{
    let mut record = [0u8; RECORD_SIZE];
    let mut filled = 0;

    while filled < RECORD_SIZE {
        let read = reader.read(&mut record[filled..]).await?;
        if read == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(RecordError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream closed after {} of {} bytes", filled, RECORD_SIZE),
            )));
        }
        filled += read;
    }

    decode_record(&record).map(Some)
}

pub async fn write_record<W>(writer: &mut W, packet: &Packet) -> Result<(), RecordError>
where
    W: AsyncWrite + Unpin,
{
    let record = encode_record(packet)?;
    writer.write_all(&record).await?;
    writer.flush().await?;
    Ok(())
}

/// Listening server plus the coordinator it feeds.
pub struct Server {
    listener: TcpListener,
    coordinator: Coordinator,
    config: ServerConfig,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let coordinator = Coordinator::new(&config)?;
        let listener = TcpListener::bind(config.bind_addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            coordinator,
            config,
        })
    }

    pub fn with_board(mut self, board: Box<dyn BoardSink>) -> Self {
        self.coordinator = self.coordinator.with_board(board);
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn command_sender(&self) -> mpsc::UnboundedSender<ArenaCommand> {
        self.coordinator.commands()
    }

    /// Serves until `shutdown` flips or its sender is dropped.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let Server {
            listener,
            coordinator,
            config,
        } = self;
        let commands = coordinator.commands();

        tokio::spawn(accept_loop(listener, commands.clone(), shutdown.clone()));
        tokio::spawn(populators::run_bots(
            commands.clone(),
            config.bot_period,
            shutdown.clone(),
        ));
        tokio::spawn(populators::run_prizes(
            commands,
            coordinator.prize_capacity(),
            config.initial_prizes,
            config.prize_period,
            shutdown.clone(),
        ));

        info!("Server started");
        coordinator.run(shutdown).await;
        info!("Server stopped");
    }
}

async fn accept_loop(
    listener: TcpListener,
    commands: mpsc::UnboundedSender<ArenaCommand>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    info!("Connection from {}", addr);
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!("Failed to disable Nagle for {}: {}", addr, e);
                    }
                    tokio::spawn(run_session(stream, addr, commands.clone(), shutdown.clone()));
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            },
            _ = shutdown.changed() => break,
        }
    }
    info!("Listener closed");
}
