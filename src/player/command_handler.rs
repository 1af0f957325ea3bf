use super::{Player, PlayerEvent, PLAYER_LOG_TARGET};
use tracing::{info, instrument, warn};

#[instrument(skip(player))]
pub async fn handle_play(player: &mut Player) {
    info!(target: PLAYER_LOG_TARGET, "Handling Play command.");
    if let Err(e) = player.play().await {
        warn!(target: PLAYER_LOG_TARGET, "Play failed: {}", e);
        player.broadcast(PlayerEvent::Error(e.to_string()));
    }
}

#[instrument(skip(player))]
pub async fn handle_pause(player: &mut Player) {
    info!(target: PLAYER_LOG_TARGET, "Handling Pause command.");
    if let Err(e) = player.pause().await {
        warn!(target: PLAYER_LOG_TARGET, "Pause failed: {}", e);
        player.broadcast(PlayerEvent::Error(e.to_string()));
    }
}

#[instrument(skip(player))]
pub async fn handle_resume(player: &mut Player) {
    info!(target: PLAYER_LOG_TARGET, "Handling Resume command.");
    if let Err(e) = player.resume().await {
        warn!(target: PLAYER_LOG_TARGET, "Resume failed: {}", e);
        player.broadcast(PlayerEvent::Error(e.to_string()));
    }
}

#[instrument(skip(player))]
pub async fn handle_stop(player: &mut Player) {
    info!(target: PLAYER_LOG_TARGET, "Handling Stop command.");
    if let Err(e) = player.stop().await {
        warn!(target: PLAYER_LOG_TARGET, "Stop failed: {}", e);
        player.broadcast(PlayerEvent::Error(e.to_string()));
    }
}

#[instrument(skip(player))]
pub async fn handle_skip(player: &mut Player) {
    info!(target: PLAYER_LOG_TARGET, "Handling Skip command.");
    if let Err(e) = player.skip().await {
        warn!(target: PLAYER_LOG_TARGET, "Skip failed: {}", e);
        player.broadcast(PlayerEvent::Error(e.to_string()));
    }
}

#[instrument(skip(player))]
pub async fn handle_set_volume(player: &mut Player, volume: f32) {
    player.set_volume(volume);
}

#[instrument(skip(player))]
pub async fn handle_kill(player: &mut Player) {
    info!(target: PLAYER_LOG_TARGET, "Handling Kill command.");
    player.kill().await;
}
