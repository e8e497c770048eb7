//! One task per TCP connection.
//!
//! A session starts out connecting: it ignores everything until the peer
//! sends `Connect`, then asks the coordinator for a ball. Once joined it
//! multiplexes three inputs with `select!`: packets from the peer, field
//! snapshots from the broadcast channel, and notices the coordinator pushes
//! directly (death, eviction). Socket reads happen on a separate reader task
//! so a half-read record is never lost when another branch wins the select.

use crate::client_manager::{SessionEvent, SessionId};
use crate::coordinator::{ArenaCommand, JoinOutcome, Joined, MoveReply};
use crate::network::{read_record, write_record};
use chase_shared::{Packet, RecordError};
use log::{debug, info, warn};
use std::fmt::Display;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

const PACKET_BACKLOG: usize = 32;

/// What the reader task hands to the session.
#[derive(Debug)]
enum Inbound {
    Packet(Packet),
    /// A full record arrived but did not decode. Its content is dropped, its
    /// arrival still counts as activity.
    Malformed,
}

pub async fn run_session(
    stream: TcpStream,
    addr: SocketAddr,
    commands: mpsc::UnboundedSender<ArenaCommand>,
    shutdown: watch::Receiver<bool>,
) {
    let (reader, writer) = stream.into_split();
    serve(reader, writer, addr, commands, shutdown).await;
    debug!("Session for {} finished", addr);
}

/// Drives a session over any byte stream halves.
pub async fn serve<R, W>(
    reader: R,
    mut writer: W,
    addr: SocketAddr,
    commands: mpsc::UnboundedSender<ArenaCommand>,
    mut shutdown: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    let (reader_task, mut packets) = spawn_reader(reader, addr);

    if let Some(joined) = connect(&mut packets, &mut writer, addr, &commands, &mut shutdown).await {
        let session = joined.session;
        play(*joined, &mut packets, &mut writer, &commands, &mut shutdown).await;
        let _ = commands.send(ArenaCommand::Leave { session });
    }

    // The peer only sees EOF once its ball is queued for removal.
    let _ = writer.shutdown().await;
    reader_task.abort();
}

fn spawn_reader<R>(mut reader: R, addr: SocketAddr) -> (JoinHandle<()>, mpsc::Receiver<Inbound>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (inbound_tx, inbound_rx) = mpsc::channel(PACKET_BACKLOG);

    let handle = tokio::spawn(async move {
        loop {
            let inbound = match read_record(&mut reader).await {
                Ok(Some(packet)) => Inbound::Packet(packet),
                Ok(None) => {
                    debug!("{} closed the connection", addr);
                    break;
                }
                Err(RecordError::Decode(e)) => {
                    warn!("Ignoring malformed record from {}: {}", addr, e);
                    Inbound::Malformed
                }
                Err(e) => {
                    debug!("Read from {} failed: {}", addr, e);
                    break;
                }
            };
            if inbound_tx.send(inbound).await.is_err() {
                break;
            }
        }
    });

    (handle, inbound_rx)
}

/// Waits for `Connect` and performs the join.
///
/// Returns None if the peer went away, was rejected, or the server is
/// stopping. A rejected peer has already been sent `Reject`.
async fn connect<W>(
    packets: &mut mpsc::Receiver<Inbound>,
    writer: &mut W,
    addr: SocketAddr,
    commands: &mpsc::UnboundedSender<ArenaCommand>,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<Box<Joined>>
where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            inbound = packets.recv() => match inbound? {
                Inbound::Packet(Packet::Connect) => break,
                Inbound::Packet(Packet::Disconnect) => return None,
                other => debug!("Ignoring {:?} from {} before connect", other, addr),
            },
            _ = shutdown.changed() => return None,
        }
    }

    let (reply_tx, reply_rx) = oneshot::channel();
    commands
        .send(ArenaCommand::Join {
            addr,
            reply: reply_tx,
        })
        .ok()?;

    match reply_rx.await.ok()? {
        JoinOutcome::Accepted(joined) => {
            let greeting = [
                Packet::BallInfo { ball: joined.ball },
                Packet::FieldStatus {
                    field: joined.field.clone(),
                },
            ];
            for packet in &greeting {
                if !send(writer, packet, addr).await {
                    let _ = commands.send(ArenaCommand::Leave {
                        session: joined.session,
                    });
                    return None;
                }
            }
            info!("{} joined as '{}'", addr, joined.ball.glyph);
            Some(joined)
        }
        JoinOutcome::Rejected => {
            info!("Rejected {}", addr);
            send(writer, &Packet::Reject, addr).await;
            None
        }
    }
}

async fn play<W>(
    joined: Joined,
    packets: &mut mpsc::Receiver<Inbound>,
    writer: &mut W,
    commands: &mpsc::UnboundedSender<ArenaCommand>,
    shutdown: &mut watch::Receiver<bool>,
) where
    W: AsyncWrite + Unpin,
{
    let Joined {
        session,
        mut updates,
        mut events,
        ..
    } = joined;

    loop {
        let keep_going = tokio::select! {
            inbound = packets.recv() => match inbound {
                Some(Inbound::Packet(packet)) => {
                    handle_packet(session, packet, writer, commands).await
                }
                Some(Inbound::Malformed) => commands.send(ArenaCommand::Touch { session }).is_ok(),
                None => false,
            },
            update = updates.recv() => match update {
                Ok(field) => {
                    let packet = Packet::FieldStatus { field: field.as_ref().clone() };
                    send(writer, &packet, session).await
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Client {} skipped {} stale snapshots", session, skipped);
                    true
                }
                Err(RecvError::Closed) => false,
            },
            event = events.recv() => match event {
                Some(SessionEvent::Died) => {
                    send(writer, &Packet::HealthZero, session).await
                }
                Some(SessionEvent::Evicted) | None => false,
            },
            _ = shutdown.changed() => false,
        };

        if !keep_going {
            break;
        }
    }
}

/// Returns false once the session should end.
async fn handle_packet<W>(
    session: SessionId,
    packet: Packet,
    writer: &mut W,
    commands: &mpsc::UnboundedSender<ArenaCommand>,
) -> bool
where
    W: AsyncWrite + Unpin,
{
    match packet {
        Packet::Move { direction } => {
            let (reply_tx, reply_rx) = oneshot::channel();
            let request = ArenaCommand::Move {
                session,
                direction,
                reply: reply_tx,
            };
            if commands.send(request).is_err() {
                return false;
            }
            match reply_rx.await {
                Ok(MoveReply::Applied) => true,
                Ok(MoveReply::Dead) => send(writer, &Packet::HealthZero, session).await,
                Ok(MoveReply::Unknown) | Err(_) => false,
            }
        }
        Packet::ContinueGame => commands.send(ArenaCommand::Continue { session }).is_ok(),
        Packet::Disconnect => {
            info!("Client {} disconnected", session);
            false
        }
        other => {
            debug!("Client {} sent unexpected {:?}", session, other);
            commands.send(ArenaCommand::Touch { session }).is_ok()
        }
    }
}

/// Writes one packet. Returns false if the peer is gone.
async fn send<W>(writer: &mut W, packet: &Packet, peer: impl Display) -> bool
where
    W: AsyncWrite + Unpin,
{
    match write_record(writer, packet).await {
        Ok(()) => true,
        Err(e) => {
            debug!("Write to {} failed: {}", peer, e);
            false
        }
    }
}
