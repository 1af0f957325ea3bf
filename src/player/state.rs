use crate::resolver::Entry;
use tokio::sync::oneshot;

/// Playback state of one player.
///
/// `Dead` is terminal: it is only reached via `kill()` and cannot be left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Stopped,
    Playing,
    Paused,
    /// Pulling/preparing the next queue entry.
    Waiting,
    Dead,
}

/// Commands that can be sent to the Player task.
#[derive(Debug)]
pub enum PlayerCommand {
    Play,
    Pause,
    Resume,
    Stop,
    Skip,
    Kill,
    SetVolume(f32),
    GetState(oneshot::Sender<PlayerSnapshot>),
    /// Internal: the decode pump drained the stream to EOF.
    TrackFinished(Entry),
}

/// Lifecycle events broadcast by the Player task.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Playing(Entry),
    Paused,
    Resumed,
    Stopped,
    FinishedPlaying(Entry),
    Dead,
    Error(String),
}

/// Snapshot of the player for state queries.
#[derive(Debug, Clone)]
pub struct PlayerSnapshot {
    pub state: PlayerState,
    pub current_entry: Option<Entry>,
    /// Approximate elapsed seconds; see `Player::progress_seconds`.
    pub progress_seconds: f64,
    pub volume: f32,
}
