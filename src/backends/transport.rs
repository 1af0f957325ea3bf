//! Voice-transport contract: decode-subprocess lifecycle plus the session
//! liveness/reconnect primitives the player's health loop relies on.

use async_trait::async_trait;
use std::io::Read;
use std::path::Path;

use super::TransportError;

/// Handle over one external decode subprocess. The subprocess turns a media
/// file into raw signed 16-bit PCM readable from [`DecodeProcess::take_output`].
pub trait DecodeProcess: Send {
    fn start(&mut self) -> Result<(), TransportError>;
    fn pause(&mut self) -> Result<(), TransportError>;
    fn resume(&mut self) -> Result<(), TransportError>;
    /// Hard-kill the subprocess. Safe to call more than once.
    fn stop(&mut self) -> Result<(), TransportError>;
    /// Whether the subprocess is still decoding.
    fn is_running(&self) -> bool;
    /// Take ownership of the decoded-PCM stream. Returns `None` after the
    /// first call or before `start()`.
    fn take_output(&mut self) -> Option<Box<dyn Read + Send>>;
}

/// Contract for the voice-transport/session library.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    /// Spawn a decode subprocess for `filename` with decoder arguments
    /// split into pre-input and post-input option groups.
    fn create_decode_process(
        &self,
        filename: &Path,
        before_options: &[String],
        options: &[String],
    ) -> Result<Box<dyn DecodeProcess>, TransportError>;

    /// Push one PCM frame into the voice session. Called from the decode
    /// pump, which runs on a blocking thread.
    fn send_frame(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// Non-blocking socket-state check used by the liveness loop.
    fn is_open(&self) -> bool;

    /// Wait until the session socket is usable.
    async fn ensure_open(&self) -> Result<(), TransportError>;

    /// Ask the owning bot to re-establish the voice session.
    async fn reconnect(&self) -> Result<(), TransportError>;
}
