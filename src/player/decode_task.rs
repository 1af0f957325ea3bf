// src/player/decode_task.rs

use crate::audio::{AudioError, AudioRelay, SharedVolume};
use crate::backends::{DecodeProcess, VoiceTransport};
use crate::player::{PlayerCommand, FRAME_SIZE_BYTES, PLAYER_LOG_TARGET};
use crate::resolver::Entry;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration as StdDuration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

/// How long the pump may sleep while paused before re-checking flags.
const PAUSE_POLL: StdDuration = StdDuration::from_millis(20);

type SharedProcess = Arc<StdMutex<Box<dyn DecodeProcess>>>;

fn lock_process(process: &SharedProcess) -> std::sync::MutexGuard<'_, Box<dyn DecodeProcess>> {
    process.lock().unwrap_or_else(|e| e.into_inner())
}

/// Manages a single running decode subprocess and its frame pump.
pub struct DecodeTaskManager {
    task_handle: JoinHandle<()>,
    process: SharedProcess,
    shutdown: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
    title: String,
}

impl DecodeTaskManager {
    /// Frames pushed to the transport so far.
    pub fn frames_sent(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Pauses the subprocess and parks the pump.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        if let Err(e) = lock_process(&self.process).pause() {
            warn!(target: PLAYER_LOG_TARGET, title = %self.title, "Failed to pause decoder: {}", e);
        }
    }

    /// Resumes the subprocess and unparks the pump.
    pub fn resume(&self) {
        if let Err(e) = lock_process(&self.process).resume() {
            warn!(target: PLAYER_LOG_TARGET, title = %self.title, "Failed to resume decoder: {}", e);
        }
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Stops the subprocess, signals the pump, and awaits task completion
    /// with a timeout. Consumes the manager instance.
    #[instrument(skip(self), fields(title = %self.title))]
    pub async fn stop(mut self) {
        info!(target: PLAYER_LOG_TARGET, "Stopping decode task...");
        self.shutdown.store(true, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        if let Err(e) = lock_process(&self.process).stop() {
            warn!(target: PLAYER_LOG_TARGET, title = %self.title, "Failed to stop decoder: {}", e);
        }

        let timeout_duration = StdDuration::from_secs(5);
        tokio::select! {
            biased;
            result = &mut self.task_handle => {
                match result {
                    Ok(()) => {
                        info!(target: PLAYER_LOG_TARGET, title = %self.title, "Decode task finished gracefully.");
                    }
                    Err(e) if e.is_panic() => {
                        error!(target: PLAYER_LOG_TARGET, title = %self.title, "Decode task panicked: {:?}", e);
                    }
                    Err(e) => {
                        error!(target: PLAYER_LOG_TARGET, title = %self.title, "Decode task join error: {:?}", e);
                    }
                }
            }
            _ = tokio::time::sleep(timeout_duration) => {
                error!(target: PLAYER_LOG_TARGET, title = %self.title, "Timeout waiting for decode task after {:?}. Aborting.", timeout_duration);
                self.task_handle.abort();
            }
        }
    }
}

/// Blocking frame pump: relay frames from the decoder to the transport
/// until EOF, shutdown, or a stream error. Returns whether the stream
/// finished naturally.
fn pump_frames(
    process: SharedProcess,
    transport: Arc<dyn VoiceTransport>,
    volume: SharedVolume,
    meter_period: Option<u32>,
    shutdown: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
) -> Result<bool, AudioError> {
    let output = lock_process(&process)
        .take_output()
        .ok_or_else(|| AudioError::InvalidState("decoder produced no output stream".to_string()))?;

    let mut relay = AudioRelay::new(output, volume);
    if let Some(period) = meter_period {
        relay = relay.with_meter(period);
    }

    loop {
        if shutdown.load(Ordering::SeqCst) {
            return Ok(false);
        }
        if paused.load(Ordering::SeqCst) {
            std::thread::sleep(PAUSE_POLL);
            continue;
        }
        let frame = relay.read_frame(FRAME_SIZE_BYTES)?;
        if frame.is_empty() {
            trace!(target: PLAYER_LOG_TARGET, "Decoder stream drained after {} frames.", relay.frames_read());
            return Ok(true);
        }
        transport
            .send_frame(&frame)
            .map_err(|e| AudioError::StreamError(e.to_string()))?;
        frames.store(relay.frames_read(), Ordering::Relaxed);
    }
}

/// Starts the decode subprocess and spawns the pump task for one entry.
#[instrument(skip(process, transport, volume, internal_cmd_tx, entry), fields(title = %entry.title))]
pub fn spawn_decode_task(
    mut process: Box<dyn DecodeProcess>,
    transport: Arc<dyn VoiceTransport>,
    volume: SharedVolume,
    meter_period: Option<u32>,
    entry: Entry,
    internal_cmd_tx: mpsc::Sender<PlayerCommand>,
) -> Result<DecodeTaskManager, crate::player::PlayerError> {
    process.start()?;

    let process: SharedProcess = Arc::new(StdMutex::new(process));
    let shutdown = Arc::new(AtomicBool::new(false));
    let paused = Arc::new(AtomicBool::new(false));
    let frames = Arc::new(AtomicU64::new(0));
    let title = entry.title.clone();

    info!(target: PLAYER_LOG_TARGET, "Spawning decode pump for entry '{}'.", title);
    let task_handle = {
        let process = process.clone();
        let shutdown = shutdown.clone();
        let paused = paused.clone();
        let frames = frames.clone();
        let task_title = title.clone();
        tokio::spawn(async move {
            let pump_shutdown = shutdown.clone();
            let pump = tokio::task::spawn_blocking(move || {
                pump_frames(process, transport, volume, meter_period, pump_shutdown, paused, frames)
            });

            let completed = match pump.await {
                Ok(Ok(completed)) => completed,
                Ok(Err(e)) => {
                    error!(target: PLAYER_LOG_TARGET, title = %task_title, "Decode pump failed: {}", e);
                    false
                }
                Err(e) => {
                    error!(target: PLAYER_LOG_TARGET, title = %task_title, "Decode pump join error: {:?}", e);
                    false
                }
            };

            if completed && !shutdown.load(Ordering::SeqCst) {
                debug!(target: PLAYER_LOG_TARGET, title = %task_title, "Track finished naturally, sending TrackFinished.");
                if let Err(e) = internal_cmd_tx.try_send(PlayerCommand::TrackFinished(entry)) {
                    error!(target: PLAYER_LOG_TARGET, title = %task_title, "Failed to send TrackFinished command: {}", e);
                }
            }
        })
    };

    Ok(DecodeTaskManager {
        task_handle,
        process,
        shutdown,
        paused,
        frames,
        title,
    })
}
