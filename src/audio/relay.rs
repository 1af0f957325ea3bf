//! Volume/metering relay over the raw decoded-PCM stream.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

use crossterm::terminal::{Clear, ClearType};
use tracing::trace;

const LOG_TARGET: &str = "melobot::audio::relay";

/// Effective ceiling for the volume multiplier. 16-bit signed PCM has no
/// headroom beyond this without severe clipping.
pub const MAX_VOLUME: f32 = 2.0;

/// Number of RMS samples retained for meter scaling.
const METER_WINDOW: usize = 90;

/// Fallback width when the terminal size cannot be queried.
const FALLBACK_METER_WIDTH: u16 = 80;

/// Volume handle shared between the player (writer) and the relay (reader).
/// A plain std mutex: the relay reads it from a blocking pump thread.
#[derive(Debug, Clone)]
pub struct SharedVolume(Arc<Mutex<f32>>);

impl SharedVolume {
    pub fn new(volume: f32) -> Self {
        SharedVolume(Arc::new(Mutex::new(volume)))
    }

    pub fn get(&self) -> f32 {
        *self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set(&self, volume: f32) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = volume;
    }
}

/// Rolling-RMS terminal meter. Strictly best-effort: every draw failure is
/// swallowed so the read path can never block or error on diagnostics.
struct LevelMeter {
    period: u32,
    window: VecDeque<f64>,
}

impl LevelMeter {
    fn new(period: u32) -> Self {
        LevelMeter {
            period: period.max(1),
            window: VecDeque::with_capacity(METER_WINDOW),
        }
    }

    fn record_and_draw(&mut self, frame: &[u8]) {
        let rms = frame_rms(frame);
        if self.window.len() == METER_WINDOW {
            self.window.pop_front();
        }
        self.window.push_back(rms);

        let max = self
            .window
            .iter()
            .cloned()
            .fold(f64::EPSILON, f64::max);
        let width = crossterm::terminal::size()
            .map(|(cols, _)| cols)
            .unwrap_or(FALLBACK_METER_WIDTH)
            .saturating_sub(1) as usize;
        let filled = ((rms / max) * width as f64) as usize;
        let filled = filled.min(width);

        let mut out = io::stdout();
        let _ = write!(out, "\r{}{}", "o".repeat(filled), " ".repeat(width - filled));
        let _ = out.flush();
    }

    fn clear_line(&self) {
        let mut out = io::stdout();
        let _ = crossterm::execute!(out, Clear(ClearType::CurrentLine));
        let _ = write!(out, "\r");
        let _ = out.flush();
    }
}

/// Root-mean-square loudness of one frame of 16-bit little-endian PCM.
fn frame_rms(frame: &[u8]) -> f64 {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for pair in frame.chunks_exact(2) {
        let sample = i16::from_le_bytes([pair[0], pair[1]]) as f64;
        sum += sample * sample;
        count += 1;
    }
    if count == 0 {
        return 0.0;
    }
    (sum / count as f64).sqrt()
}

/// Wraps the decoded-audio stream, applying the shared volume multiplier to
/// each frame and optionally rendering a live terminal meter.
pub struct AudioRelay<R: Read> {
    inner: R,
    volume: SharedVolume,
    meter: Option<LevelMeter>,
    frames_read: u64,
}

impl<R: Read> AudioRelay<R> {
    pub fn new(inner: R, volume: SharedVolume) -> Self {
        AudioRelay {
            inner,
            volume,
            meter: None,
            frames_read: 0,
        }
    }

    /// Enables the terminal level meter, redrawn every `period` frames.
    pub fn with_meter(mut self, period: u32) -> Self {
        self.meter = Some(LevelMeter::new(period));
        self
    }

    /// Number of frames handed out so far; the player derives its
    /// progress estimate from this.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Reads the next frame of at most `frame_size` bytes, volume-scaled
    /// when the multiplier differs from unity. Returns an empty buffer at
    /// end of stream.
    pub fn read_frame(&mut self, frame_size: usize) -> io::Result<Vec<u8>> {
        let mut frame = vec![0u8; frame_size];
        let mut filled = 0;
        while filled < frame_size {
            match self.inner.read(&mut frame[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        frame.truncate(filled);
        if frame.is_empty() {
            trace!(target: LOG_TARGET, "Underlying stream reached EOF after {} frames.", self.frames_read);
            return Ok(frame);
        }
        self.frames_read += 1;

        let volume = self.volume.get();
        if volume != 1.0 {
            // Effective multiplier is bounded on both sides; a negative
            // request silences rather than amplifying phase-inverted.
            scale_frame(&mut frame, volume.clamp(0.0, MAX_VOLUME));
        }

        if let Some(meter) = self.meter.as_mut() {
            if self.frames_read % meter.period as u64 == 0 {
                meter.record_and_draw(&frame);
            }
        }

        Ok(frame)
    }
}

impl<R: Read> Drop for AudioRelay<R> {
    fn drop(&mut self) {
        if let Some(meter) = self.meter.as_ref() {
            meter.clear_line();
        }
    }
}

/// Scales 16-bit little-endian samples in place, saturating at the i16 range.
fn scale_frame(frame: &mut [u8], multiplier: f32) {
    for pair in frame.chunks_exact_mut(2) {
        let sample = i16::from_le_bytes([pair[0], pair[1]]);
        let scaled = (sample as f32 * multiplier)
            .round()
            .clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        pair.copy_from_slice(&scaled.to_le_bytes());
    }
}
