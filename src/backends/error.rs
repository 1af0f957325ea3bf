use std::error::Error;
use std::fmt;
use std::io;

/// Error types surfaced by the backend contracts.
#[derive(Debug)]
pub enum BackendError {
    Network(reqwest::Error),
    Extraction(String),
    NotFound(String),
    InvalidResponse(String),
    Io(io::Error),
    Other(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Network(e) => write!(f, "Network error: {}", e),
            BackendError::Extraction(msg) => write!(f, "Extraction error: {}", msg),
            BackendError::NotFound(msg) => write!(f, "Not found: {}", msg),
            BackendError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            BackendError::Io(e) => write!(f, "I/O error: {}", e),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl Error for BackendError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BackendError::Network(e) => Some(e),
            BackendError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Network(err)
    }
}

impl From<io::Error> for BackendError {
    fn from(err: io::Error) -> Self {
        BackendError::Io(err)
    }
}

/// Error types for voice-transport operations.
#[derive(Debug)]
pub enum TransportError {
    ConnectionClosed,
    SpawnFailed(String),
    Io(io::Error),
    Other(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::ConnectionClosed => write!(f, "Voice connection closed"),
            TransportError::SpawnFailed(msg) => write!(f, "Failed to spawn decoder: {}", msg),
            TransportError::Io(e) => write!(f, "I/O error: {}", e),
            TransportError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl Error for TransportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TransportError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        TransportError::Io(err)
    }
}
