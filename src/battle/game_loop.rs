//! Battle Game Loop
//!
//! One task per game: countdown, then a loop with two cadences. The fast
//! one expires the live ball, the slow one reports remaining time and ends
//! the game. Every step re-checks the game's stop signal under the room
//! lock, so a cancelled game never touches the room again.

use std::time::Duration;

use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::battle::registry::BattleConfig;
use crate::battle::room::{RoomState, SharedRoom};
use crate::battle::signal::StopSignal;
use crate::network::protocol::ServerMessage;

/// Run a full game in `room`: countdown, play, and result.
///
/// Returns immediately if the room is not ready to start. Spawn this; it
/// runs for the whole game.
pub async fn start_game(room: SharedRoom, config: BattleConfig) {
    let (stop, code) = {
        let mut guard = room.write().await;
        match guard.begin_countdown() {
            Some(stop) => (stop, guard.code.clone()),
            None => return,
        }
    };
    debug!("Room {} countdown started", code);

    for count in (1..=config.countdown_from).rev() {
        {
            let guard = room.read().await;
            if stop.is_stopped() {
                return;
            }
            guard.broadcast(&ServerMessage::Countdown { count });
        }

        tokio::select! {
            _ = stop.stopped() => {
                debug!("Room {} countdown cancelled", code);
                return;
            }
            _ = sleep(config.countdown_interval) => {}
        }
    }

    {
        let mut guard = room.write().await;
        if stop.is_stopped() || guard.state != RoomState::Countdown {
            return;
        }

        let now = Instant::now();
        guard.begin_playing(now);
        guard.broadcast(&ServerMessage::GameStart {
            duration: guard.duration.as_secs_f64(),
        });
        guard.spawn_ball(now, &mut rand::thread_rng());
    }
    info!("Room {} game started", code);

    run_loop(&room, &stop, &config).await;
}

async fn run_loop(room: &SharedRoom, stop: &StopSignal, config: &BattleConfig) {
    let mut poll = interval(config.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut clock = interval(config.time_update_interval);
    clock.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop.stopped() => return,

            _ = clock.tick() => {
                let mut guard = room.write().await;
                if stop.is_stopped() {
                    return;
                }

                let now = Instant::now();
                let time_left = guard.time_left(now);
                if time_left <= 0.0 {
                    guard.finish(now);
                    let scores = guard.scores();
                    info!("Room {} game ended {}:{}", guard.code, scores[0], scores[1]);
                    drop(guard);
                    // Stragglers holding this signal (respawns) become no-ops.
                    stop.stop();
                    return;
                }

                guard.broadcast(&ServerMessage::TimeUpdate { time_left });
            }

            _ = poll.tick() => {
                let expired = {
                    let mut guard = room.write().await;
                    if stop.is_stopped() {
                        return;
                    }
                    guard.expire_ball(Instant::now())
                };

                if expired {
                    schedule_respawn(room.clone(), stop.clone(), config.respawn_delay);
                }
            }
        }
    }
}

/// Spawn the next ball after `delay`, unless the game has been cancelled
/// or a ball is already live by then.
fn schedule_respawn(room: SharedRoom, stop: StopSignal, delay: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = stop.stopped() => return,
            _ = sleep(delay) => {}
        }

        let mut guard = room.write().await;
        if stop.is_stopped() {
            return;
        }
        guard.spawn_ball(Instant::now(), &mut rand::thread_rng());
    });
}

/// Apply a click from seat `index`; the first click on a live ball wins.
pub async fn handle_click(room: &SharedRoom, index: usize, config: &BattleConfig) {
    let stop = {
        let mut guard = room.write().await;
        guard.touch(index, Instant::now());
        if !guard.resolve_click(index) {
            return;
        }
        guard.stop.clone()
    };

    schedule_respawn(room.clone(), stop, config.respawn_delay);
}

/// Register a rematch request from seat `index`, starting a new game when
/// both players are ready.
pub async fn handle_rematch_ready(room: &SharedRoom, index: usize, config: &BattleConfig) {
    let both_ready = {
        let mut guard = room.write().await;
        guard.touch(index, Instant::now());
        guard.mark_ready(index)
    };

    if both_ready {
        tokio::spawn(start_game(room.clone(), config.clone()));
    }
}
