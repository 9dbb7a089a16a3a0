use super::engine::{PlaybackEngine, PlaybackState, RenderedFrame};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Control mutations applied between ticks, never mid-tick, so a rendered
/// frame is never torn.
#[derive(Debug, Clone, Copy)]
pub enum PlayerCommand {
    Play,
    Pause,
    Seek(f64),
    /// Relative seek in milliseconds (negative rewinds).
    SeekBy(f64),
    SetSpeed(f64),
    Restart,
}

/// One emitted frame plus the transport state that produced it.
#[derive(Debug, Clone)]
pub struct PlaybackFrame {
    pub state: PlaybackState,
    pub frame: RenderedFrame,
}

/// Handle to a running playback loop. Dropping the handle does not stop the
/// loop; call [`PlaybackHandle::shutdown`] to tear it down.
pub struct PlaybackHandle {
    commands: mpsc::Sender<PlayerCommand>,
    frames: watch::Receiver<PlaybackFrame>,
    cancel: CancellationToken,
    task: JoinHandle<PlaybackEngine>,
}

impl PlaybackHandle {
    pub async fn send(&self, command: PlayerCommand) {
        if self.commands.send(command).await.is_err() {
            warn!("Playback loop is gone, command dropped");
        }
    }

    /// Watch channel carrying the latest emitted frame.
    pub fn frames(&self) -> watch::Receiver<PlaybackFrame> {
        self.frames.clone()
    }

    /// Halt the scheduling loop immediately. No further frames are emitted
    /// after this returns; the engine is handed back for inspection.
    pub async fn shutdown(self) -> PlaybackEngine {
        self.cancel.cancel();
        self.task.await.expect("playback task panicked")
    }
}

/// Spawn the tick loop that drives a playback engine.
///
/// Each tick advances the virtual clock by `speed × elapsed wall clock` and
/// publishes the sampled frame on a watch channel. Commands are drained
/// before the clock moves, so `seek`/`pause`/`set_speed` always apply on a
/// tick boundary.
pub fn spawn_player(mut engine: PlaybackEngine, tick: Duration) -> PlaybackHandle {
    let (command_tx, mut command_rx) = mpsc::channel::<PlayerCommand>(32);
    let (frame_tx, frame_rx) = watch::channel(PlaybackFrame {
        state: engine.state(),
        frame: engine.current_frame(),
    });
    let cancel = CancellationToken::new();

    let loop_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut last_tick = tokio::time::Instant::now();

        loop {
            tokio::select! {
                _ = loop_cancel.cancelled() => {
                    debug!("Playback loop cancelled");
                    break;
                }

                command = command_rx.recv() => {
                    match command {
                        Some(command) => apply_command(&mut engine, command),
                        None => break,
                    }
                    // Reflect the mutation without waiting for the next tick.
                    let _ = frame_tx.send(PlaybackFrame {
                        state: engine.state(),
                        frame: engine.current_frame(),
                    });
                }

                now = interval.tick() => {
                    let elapsed = now.duration_since(last_tick);
                    last_tick = now;
                    engine.advance(elapsed);
                    let _ = frame_tx.send(PlaybackFrame {
                        state: engine.state(),
                        frame: engine.current_frame(),
                    });
                }
            }
        }

        engine
    });

    PlaybackHandle {
        commands: command_tx,
        frames: frame_rx,
        cancel,
        task,
    }
}

fn apply_command(engine: &mut PlaybackEngine, command: PlayerCommand) {
    match command {
        PlayerCommand::Play => engine.play(),
        PlayerCommand::Pause => engine.pause(),
        PlayerCommand::Seek(t) => engine.seek(t),
        PlayerCommand::SeekBy(delta) => {
            let t = engine.state().current_time + delta;
            engine.seek(t);
        }
        PlayerCommand::SetSpeed(speed) => {
            if let Err(e) = engine.set_speed(speed) {
                warn!(error = %e, "Rejected speed change");
            }
        }
        PlayerCommand::Restart => {
            engine.seek(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{InteractionEvent, MouseMoveData, Session};
    use crate::playback::engine::PlaybackPhase;
    use crate::timeline::SessionTimeline;
    use chrono::Utc;

    fn mouse_move(timestamp: i64, x: f64) -> InteractionEvent {
        InteractionEvent::MouseMove {
            timestamp,
            data: MouseMoveData { x, y: 0.0 },
        }
    }

    fn engine() -> PlaybackEngine {
        let session = Session {
            id: "s1".to_string(),
            website_id: "w1".to_string(),
            started_at: Utc::now(),
        };
        // 10 virtual seconds of motion.
        let timeline = SessionTimeline::from_events(
            session,
            vec![mouse_move(0, 0.0), mouse_move(10_000, 1000.0)],
        );
        PlaybackEngine::new(timeline)
    }

    #[tokio::test]
    async fn test_play_advances_virtual_clock() {
        let handle = spawn_player(engine(), Duration::from_millis(5));
        handle.send(PlayerCommand::Play).await;

        tokio::time::sleep(Duration::from_millis(100)).await;

        let frame = handle.frames().borrow().clone();
        assert!(frame.state.is_playing);
        assert!(frame.state.current_time > 0.0);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_pause_holds_clock() {
        let handle = spawn_player(engine(), Duration::from_millis(5));
        handle.send(PlayerCommand::Play).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.send(PlayerCommand::Pause).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let at_pause = handle.frames().borrow().state.current_time;
        tokio::time::sleep(Duration::from_millis(50)).await;
        let later = handle.frames().borrow().state.current_time;
        assert_eq!(at_pause, later);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_seek_applies_while_paused() {
        let handle = spawn_player(engine(), Duration::from_millis(5));
        handle.send(PlayerCommand::Seek(5_000.0)).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        let frame = handle.frames().borrow().clone();
        assert_eq!(frame.state.current_time, 5_000.0);
        assert!(!frame.state.is_playing);
        // Mouse interpolates halfway through the recorded motion.
        let mouse = frame.frame.mouse.unwrap();
        assert!((mouse.x - 500.0).abs() < 1.0);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_halts_frame_emission() {
        let handle = spawn_player(engine(), Duration::from_millis(5));
        handle.send(PlayerCommand::Play).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        let frames = handle.frames();
        let engine = handle.shutdown().await;
        assert_eq!(engine.phase(), PlaybackPhase::Playing);

        // No further emissions after teardown.
        let last = frames.borrow().state.current_time;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(frames.borrow().state.current_time, last);
    }

    #[tokio::test]
    async fn test_invalid_speed_is_rejected_and_loop_survives() {
        let handle = spawn_player(engine(), Duration::from_millis(5));
        handle.send(PlayerCommand::SetSpeed(0.0)).await;
        handle.send(PlayerCommand::Play).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        let frame = handle.frames().borrow().clone();
        assert_eq!(frame.state.speed, 1.0);
        assert!(frame.state.is_playing);

        handle.shutdown().await;
    }
}
