// src/player/run_loop.rs
use super::{command_handler, Player, PlayerCommand, PLAYER_LOG_TARGET};
use std::time::Duration as StdDuration;
use tokio::time::interval;
use tracing::{info, trace, warn};

/// How often the voice-transport socket state is checked while the player
/// is alive.
const LIVENESS_CHECK_INTERVAL: StdDuration = StdDuration::from_secs(5);

/// Runs the player's command processing loop alongside the transport
/// liveness check. Terminates only when the player is killed or every
/// command sender is gone.
pub async fn run_player_loop(player: &mut Player) {
    info!(target: PLAYER_LOG_TARGET, "Player run loop started.");

    let mut liveness_interval = interval(LIVENESS_CHECK_INTERVAL);

    loop {
        tokio::select! {
            biased; // Check commands first

            Some(command) = player.command_rx.recv() => {
                trace!(target: PLAYER_LOG_TARGET, "Received command: {:?}", command);
                match command {
                    PlayerCommand::Play => command_handler::handle_play(player).await,
                    PlayerCommand::Pause => command_handler::handle_pause(player).await,
                    PlayerCommand::Resume => command_handler::handle_resume(player).await,
                    PlayerCommand::Stop => command_handler::handle_stop(player).await,
                    PlayerCommand::Skip => command_handler::handle_skip(player).await,
                    PlayerCommand::SetVolume(volume) => command_handler::handle_set_volume(player, volume).await,
                    PlayerCommand::GetState(responder) => {
                        let _ = responder.send(player.snapshot()); // Ignore error if receiver dropped
                    }
                    PlayerCommand::TrackFinished(entry) => player.handle_track_finished(entry).await,
                    PlayerCommand::Kill => {
                        command_handler::handle_kill(player).await;
                        break;
                    }
                }
            }

            // --- Transport liveness check ---
            _ = liveness_interval.tick(), if !player.is_dead() => {
                if !player.transport.is_open() {
                    warn!(target: PLAYER_LOG_TARGET, "Voice transport socket is down, requesting reconnect.");
                    if let Err(e) = player.transport.reconnect().await {
                        warn!(target: PLAYER_LOG_TARGET, "Reconnect request failed: {}", e);
                    }
                    // The interval provides the wait before re-checking.
                }
            }

            else => {
                info!(target: PLAYER_LOG_TARGET, "Command channel closed. Exiting run loop.");
                break;
            }
        }
    }

    info!(target: PLAYER_LOG_TARGET, "Player run loop finished. Performing final cleanup.");
    if let Some(task) = player.decode_task.take() {
        info!(target: PLAYER_LOG_TARGET, "Stopping active decode task during final cleanup.");
        task.stop().await;
    }
    info!(target: PLAYER_LOG_TARGET, "Player task cleanup complete.");
}
