//! Periodic tasks that keep the arena alive without any players.

use crate::coordinator::ArenaCommand;
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Notify};
use tokio::time::{interval, MissedTickBehavior};

/// Asks the coordinator to step every bot once per `period`.
pub async fn run_bots(
    commands: mpsc::UnboundedSender<ArenaCommand>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if commands.send(ArenaCommand::MoveBots).is_err() {
                    break;
                }
            }
            _ = shutdown.changed() => break,
        }
    }
    info!("Bot populator stopped");
}

/// Seeds `initial` prizes, then tries to add one every `period`.
///
/// When the arena refuses a prize the task parks on `capacity` until the
/// coordinator reports a consumed prize or a released slot.
pub async fn run_prizes(
    commands: mpsc::UnboundedSender<ArenaCommand>,
    capacity: Arc<Notify>,
    initial: usize,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    for _ in 0..initial {
        match request_prize(&commands).await {
            Some(true) => {}
            Some(false) => break,
            None => return,
        }
    }

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        loop {
            match request_prize(&commands).await {
                Some(true) => break,
                Some(false) => {
                    debug!("Arena full of prizes, waiting for room");
                    tokio::select! {
                        _ = capacity.notified() => {}
                        _ = shutdown.changed() => {
                            info!("Prize populator stopped");
                            return;
                        }
                    }
                }
                None => return,
            }
        }
    }
    info!("Prize populator stopped");
}

/// Returns None once the coordinator is gone.
async fn request_prize(commands: &mpsc::UnboundedSender<ArenaCommand>) -> Option<bool> {
    let (reply_tx, reply_rx) = oneshot::channel();
    commands
        .send(ArenaCommand::SpawnPrize { reply: reply_tx })
        .ok()?;
    reply_rx.await.ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bots_tick_until_shutdown() {
        let (commands_tx, mut commands_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_bots(
            commands_tx,
            Duration::from_millis(5),
            shutdown_rx,
        ));

        for _ in 0..3 {
            assert!(matches!(
                commands_rx.recv().await,
                Some(ArenaCommand::MoveBots)
            ));
        }

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_prizes_seed_then_wait_for_capacity() {
        let (commands_tx, mut commands_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let capacity = Arc::new(Notify::new());
        let task = tokio::spawn(run_prizes(
            commands_tx,
            Arc::clone(&capacity),
            2,
            Duration::from_millis(5),
            shutdown_rx,
        ));

        let answer = |accept: bool, command: Option<ArenaCommand>| match command {
            Some(ArenaCommand::SpawnPrize { reply }) => reply.send(accept).unwrap(),
            other => panic!("Expected prize request, got {:?}", other),
        };

        answer(true, commands_rx.recv().await);
        answer(true, commands_rx.recv().await);
        // First periodic request is refused, so the task must park.
        answer(false, commands_rx.recv().await);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(commands_rx.try_recv().is_err());

        capacity.notify_one();
        answer(true, commands_rx.recv().await);

        drop(commands_rx);
        let _ = shutdown_tx.send(true);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_prizes_stop_when_coordinator_gone() {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        drop(commands_rx);

        run_prizes(
            commands_tx,
            Arc::new(Notify::new()),
            3,
            Duration::from_millis(5),
            shutdown_rx,
        )
        .await;
    }
}
