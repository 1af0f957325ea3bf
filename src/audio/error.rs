use std::error::Error;
use std::io;

/// Error types specific to the audio relay path.
#[derive(Debug)]
pub enum AudioError {
    StreamError(String),
    IoError(io::Error),
    InvalidState(String),
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioError::StreamError(e) => write!(f, "Streaming error: {}", e),
            AudioError::IoError(e) => write!(f, "I/O error: {}", e),
            AudioError::InvalidState(s) => write!(f, "Invalid state: {}", s),
        }
    }
}

impl Error for AudioError {}

impl From<io::Error> for AudioError {
    fn from(e: io::Error) -> Self {
        AudioError::IoError(e)
    }
}
