use crate::audio::AudioError;
use crate::backends::TransportError;
use std::error::Error;
use std::fmt;

/// Error types for player operations.
#[derive(Debug)]
pub enum PlayerError {
    InvalidState(String),
    Transport(TransportError),
    Queue(String),
    /// Entry reached the player without a downloaded file.
    MissingFile(String),
    Audio(AudioError),
}

impl fmt::Display for PlayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerError::InvalidState(s) => write!(f, "Invalid state: {}", s),
            PlayerError::Transport(e) => write!(f, "Transport error: {}", e),
            PlayerError::Queue(s) => write!(f, "Queue error: {}", s),
            PlayerError::MissingFile(s) => write!(f, "Entry has no local file: {}", s),
            PlayerError::Audio(e) => write!(f, "Audio error: {}", e),
        }
    }
}

impl Error for PlayerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PlayerError::Transport(e) => Some(e),
            PlayerError::Audio(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for PlayerError {
    fn from(e: TransportError) -> Self {
        PlayerError::Transport(e)
    }
}

impl From<AudioError> for PlayerError {
    fn from(e: AudioError) -> Self {
        PlayerError::Audio(e)
    }
}
