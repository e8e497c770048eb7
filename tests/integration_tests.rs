//! Integration tests for the arena server
//!
//! These tests run a real server on a loopback port and talk to it with the
//! same record framing a client uses.

use chase_server::network::{read_record, write_record};
use chase_server::{Server, ServerConfig};
use chase_shared::{BallInfo, Direction, Packet, Position, BOT_GLYPH, MAX_HEALTH, RECORD_SIZE};
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Config for a server whose populators stay quiet for the length of a test.
fn quiet_config(max_players: usize) -> ServerConfig {
    ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        bot_count: 1,
        max_players,
        initial_prizes: 0,
        bot_period: Duration::from_secs(3600),
        prize_period: Duration::from_secs(3600),
        seed: Some(7),
        ..ServerConfig::default()
    }
}

async fn start_server(max_players: usize) -> TestServer {
    start_server_with(quiet_config(max_players)).await
}

async fn start_server_with(config: ServerConfig) -> TestServer {
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let (shutdown, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(server.run(shutdown_rx));

    TestServer {
        addr,
        shutdown,
        handle,
    }
}

struct TestClient {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn open(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, writer) = stream.into_split();
        Self { reader, writer }
    }

    async fn send(&mut self, packet: Packet) {
        write_record(&mut self.writer, &packet).await.unwrap();
    }

    async fn recv(&mut self) -> Option<Packet> {
        timeout(WAIT, read_record(&mut self.reader))
            .await
            .expect("timed out waiting for server")
            .unwrap()
    }

    /// Connects and returns the assigned ball plus the first field.
    async fn join(addr: SocketAddr) -> (Self, BallInfo, Vec<BallInfo>) {
        let mut client = Self::open(addr).await;
        client.send(Packet::Connect).await;

        let ball = match client.recv().await {
            Some(Packet::BallInfo { ball }) => ball,
            other => panic!("Expected BallInfo, got {:?}", other),
        };
        let field = match client.recv().await {
            Some(Packet::FieldStatus { field }) => field,
            other => panic!("Expected FieldStatus, got {:?}", other),
        };
        (client, ball, field)
    }

    /// Skips packets until a field snapshot satisfies `accept`.
    async fn wait_for_field<F>(&mut self, accept: F) -> Vec<BallInfo>
    where
        F: Fn(&[BallInfo]) -> bool,
    {
        loop {
            match self.recv().await {
                Some(Packet::FieldStatus { field }) if accept(&field) => return field,
                Some(_) => continue,
                None => panic!("Connection closed while waiting for field"),
            }
        }
    }
}

fn has_glyph(field: &[BallInfo], glyph: char) -> bool {
    field.iter().any(|ball| ball.glyph == glyph)
}

/// Shortest walk from `start` to a cell next to `target` that avoids
/// `blocked`. Returns the steps and the direction that then faces `target`.
fn route_next_to(
    start: Position,
    target: Position,
    blocked: &[Position],
) -> (Vec<Direction>, Direction) {
    let mut came_from: HashMap<Position, (Position, Direction)> = HashMap::new();
    let mut seen = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);

    while let Some(cell) = queue.pop_front() {
        if let Some(&facing) = Direction::MOVES
            .iter()
            .find(|&&direction| cell.step(direction) == target)
        {
            let mut steps = Vec::new();
            let mut at = cell;
            while let Some(&(from, direction)) = came_from.get(&at) {
                steps.push(direction);
                at = from;
            }
            steps.reverse();
            return (steps, facing);
        }

        for direction in Direction::MOVES {
            let next = cell.step(direction);
            if next.is_interior() && !blocked.contains(&next) && seen.insert(next) {
                came_from.insert(next, (cell, direction));
                queue.push_back(next);
            }
        }
    }
    panic!("No route from {:?} to {:?}", start, target);
}

/// Walks `attacker` next to `victim` and steals until the victim is drained.
/// Returns the attacker's final position.
async fn drain(
    attacker: &mut TestClient,
    attacker_ball: BallInfo,
    victim_ball: BallInfo,
    field: &[BallInfo],
) -> Position {
    let bot = field
        .iter()
        .find(|ball| ball.glyph == BOT_GLYPH)
        .unwrap()
        .position();
    let (steps, facing) = route_next_to(
        attacker_ball.position(),
        victim_ball.position(),
        &[bot, victim_ball.position()],
    );

    let mut at = attacker_ball.position();
    for direction in steps {
        attacker.send(Packet::Move { direction }).await;
        at = at.step(direction);
    }
    for _ in 0..victim_ball.health {
        attacker.send(Packet::Move { direction: facing }).await;
    }
    at
}

/// JOIN AND REJECT TESTS
mod join_tests {
    use super::*;

    /// A fresh player gets a full-health letter inside the walls
    #[tokio::test]
    async fn connect_assigns_ball() {
        let server = start_server(10).await;
        let (_client, ball, field) = TestClient::join(server.addr).await;

        assert!(ball.glyph.is_ascii_uppercase());
        assert_eq!(ball.health, MAX_HEALTH);
        assert!(ball.position().is_interior());
        assert!(field.contains(&ball));
        assert!(field.iter().any(|other| other.glyph == '*'));
    }

    /// Packets before Connect are ignored, not fatal
    #[tokio::test]
    async fn packets_before_connect_are_ignored() {
        let server = start_server(10).await;
        let mut client = TestClient::open(server.addr).await;

        client
            .send(Packet::Move {
                direction: Direction::Up,
            })
            .await;
        client.send(Packet::ContinueGame).await;
        client.send(Packet::Connect).await;

        assert!(matches!(client.recv().await, Some(Packet::BallInfo { .. })));
    }

    /// Joining a full server yields Reject and a closed stream
    #[tokio::test]
    async fn full_server_rejects() {
        let server = start_server(1).await;
        let (mut first, _, _) = TestClient::join(server.addr).await;

        let mut second = TestClient::open(server.addr).await;
        second.send(Packet::Connect).await;
        assert_eq!(second.recv().await, Some(Packet::Reject));
        assert_eq!(second.recv().await, None);

        first.send(Packet::Disconnect).await;
        assert_eq!(first.recv().await, None);

        let (_third, third_ball, _) = TestClient::join(server.addr).await;
        assert_eq!(third_ball.health, MAX_HEALTH);
    }

    /// Each concurrent player gets a distinct letter
    #[tokio::test]
    async fn glyphs_are_unique() {
        let server = start_server(5).await;
        let mut glyphs = Vec::new();
        let mut clients = Vec::new();

        for _ in 0..5 {
            let (client, ball, _) = TestClient::join(server.addr).await;
            assert!(!glyphs.contains(&ball.glyph));
            glyphs.push(ball.glyph);
            clients.push(client);
        }
    }
}

/// BROADCAST TESTS
mod broadcast_tests {
    use super::*;

    /// Existing players see newcomers appear
    #[tokio::test]
    async fn join_is_broadcast() {
        let server = start_server(10).await;
        let (mut first, _, _) = TestClient::join(server.addr).await;
        let (_second, second_ball, _) = TestClient::join(server.addr).await;

        first
            .wait_for_field(|field| field.contains(&second_ball))
            .await;
    }

    /// A disconnect removes the ball and frees the seat
    #[tokio::test]
    async fn disconnect_is_broadcast_and_frees_seat() {
        let server = start_server(2).await;
        let (mut first, _, _) = TestClient::join(server.addr).await;
        let (mut second, second_ball, _) = TestClient::join(server.addr).await;

        second.send(Packet::Disconnect).await;
        first
            .wait_for_field(|field| !has_glyph(field, second_ball.glyph))
            .await;

        let (_third, third_ball, _) = TestClient::join(server.addr).await;
        first
            .wait_for_field(|field| field.contains(&third_ball))
            .await;
    }

    /// Dropping the socket without Disconnect cleans up the same way
    #[tokio::test]
    async fn abrupt_close_is_cleaned_up() {
        let server = start_server(10).await;
        let (mut first, _, _) = TestClient::join(server.addr).await;
        let (second, second_ball, _) = TestClient::join(server.addr).await;

        drop(second);
        first
            .wait_for_field(|field| !has_glyph(field, second_ball.glyph))
            .await;
    }

    /// A moving player's new position reaches everyone
    #[tokio::test]
    async fn moves_are_broadcast() {
        let server = start_server(10).await;
        let (mut watcher, _, _) = TestClient::join(server.addr).await;
        let (mut mover, _, _) = TestClient::join(server.addr).await;

        // Walls block at most two directions and the bot one more, so at
        // least one step moves the ball or steals from the watcher.
        for direction in Direction::MOVES {
            mover.send(Packet::Move { direction }).await;
        }

        let before = watcher.wait_for_field(|field| field.len() == 3).await;
        let after = watcher.wait_for_field(|field| field != before.as_slice()).await;
        assert_eq!(after.len(), 3);
    }
}

/// PROTOCOL ROBUSTNESS TESTS
mod protocol_tests {
    use super::*;

    /// A malformed record is skipped and the session keeps going
    #[tokio::test]
    async fn malformed_record_is_skipped() {
        let server = start_server(10).await;
        let (mut first, _, _) = TestClient::join(server.addr).await;

        first.writer.write_all(&[0xFF; RECORD_SIZE]).await.unwrap();

        let (second, second_ball, _) = TestClient::join(server.addr).await;
        first
            .wait_for_field(|field| field.contains(&second_ball))
            .await;

        drop(second);
        first
            .wait_for_field(|field| !has_glyph(field, second_ball.glyph))
            .await;
    }

    /// Server-to-client packets sent by a client are ignored
    #[tokio::test]
    async fn unexpected_packets_are_ignored() {
        let server = start_server(10).await;
        let (mut first, ball, _) = TestClient::join(server.addr).await;

        first.send(Packet::HealthZero).await;
        first.send(Packet::BallInfo { ball }).await;
        first.send(Packet::Connect).await;

        let (_second, second_ball, _) = TestClient::join(server.addr).await;
        first
            .wait_for_field(|field| field.contains(&second_ball))
            .await;
    }
}

/// LIFECYCLE TESTS
mod lifecycle_tests {
    use super::*;

    /// Shutdown closes every session and stops the server task
    #[tokio::test]
    async fn shutdown_closes_sessions() {
        let server = start_server(10).await;
        let (mut client, _, _) = TestClient::join(server.addr).await;

        server.shutdown.send(true).unwrap();

        loop {
            match client.recv().await {
                Some(_) => continue,
                None => break,
            }
        }
        timeout(WAIT, server.handle).await.unwrap().unwrap();
    }

    /// A player drained by steals is told it died, continues, and plays on
    /// at full health
    #[tokio::test]
    async fn drained_player_continues_at_full_health() {
        let server = start_server(2).await;
        let (mut victim, victim_ball, _) = TestClient::join(server.addr).await;
        let (mut attacker, attacker_ball, field) = TestClient::join(server.addr).await;
        let bot = field
            .iter()
            .find(|ball| ball.glyph == BOT_GLYPH)
            .unwrap()
            .position();

        let attacker_at = drain(&mut attacker, attacker_ball, victim_ball, &field).await;

        loop {
            match victim.recv().await {
                Some(Packet::HealthZero) => break,
                Some(_) => continue,
                None => panic!("Connection closed before HealthZero"),
            }
        }

        victim.send(Packet::ContinueGame).await;
        let field = victim
            .wait_for_field(|field| {
                field
                    .iter()
                    .any(|ball| ball.glyph == victim_ball.glyph && ball.health == MAX_HEALTH)
            })
            .await;
        assert!(field.contains(&BallInfo {
            health: MAX_HEALTH,
            ..victim_ball
        }));

        let direction = Direction::MOVES
            .into_iter()
            .find(|&direction| {
                let next = victim_ball.position().step(direction);
                next.is_interior() && next != bot && next != attacker_at
            })
            .unwrap();
        let target = victim_ball.position().step(direction);
        victim.send(Packet::Move { direction }).await;
        victim
            .wait_for_field(|field| {
                field
                    .iter()
                    .any(|ball| ball.glyph == victim_ball.glyph && ball.position() == target)
            })
            .await;
    }

    /// A dead player that never continues is dropped and its seat reused
    #[tokio::test]
    async fn dead_player_is_dropped_after_grace() {
        let server = start_server_with(ServerConfig {
            respawn_grace: Duration::from_millis(200),
            ..quiet_config(2)
        })
        .await;
        let (mut victim, victim_ball, _) = TestClient::join(server.addr).await;
        let (mut attacker, attacker_ball, field) = TestClient::join(server.addr).await;

        drain(&mut attacker, attacker_ball, victim_ball, &field).await;

        let mut died = false;
        loop {
            match victim.recv().await {
                Some(Packet::HealthZero) => died = true,
                Some(_) => continue,
                None => break,
            }
        }
        assert!(died);

        attacker
            .wait_for_field(|field| !has_glyph(field, victim_ball.glyph))
            .await;
        let (_newcomer, newcomer_ball, _) = TestClient::join(server.addr).await;
        assert_eq!(newcomer_ball.health, MAX_HEALTH);
    }
}
