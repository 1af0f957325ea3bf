//! Playback state machine: owns one active entry, drives the decode
//! subprocess lifecycle, and emits lifecycle events.

use crate::audio::SharedVolume;
use crate::backends::VoiceTransport;
use crate::cache::AudioFileCache;
use crate::config::Settings;
use crate::resolver::Entry;
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration as StdDuration;
use tokio::sync::{broadcast, mpsc, Mutex as TokioMutex};
use tracing::{debug, info, instrument, warn};

mod command_handler;
mod decode_task;
mod error;
mod run_loop;
mod state;

pub use error::PlayerError;
pub use state::{PlayerCommand, PlayerEvent, PlayerSnapshot, PlayerState};

pub(crate) const PLAYER_LOG_TARGET: &str = "melobot::player";

/// Bytes per PCM frame pushed to the transport: 20ms of 48kHz stereo s16.
pub const FRAME_SIZE_BYTES: usize = 3840;

/// Nominal duration of one frame. Progress derived from this is an
/// approximation only; true elapsed-byte accounting would replace it.
pub const FRAME_DURATION_SECS: f64 = 0.02;

/// Delay before the single retry of a failed queue pull or decode start.
const ADVANCE_RETRY_DELAY: StdDuration = StdDuration::from_millis(300);

/// Attempt budget for deleting a temp file the decoder may still hold open.
const FILE_DELETE_ATTEMPTS: u32 = 30;
const FILE_DELETE_BACKOFF: StdDuration = StdDuration::from_millis(100);

const EVENT_CHANNEL_CAPACITY: usize = 32;
const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// The external queue/playlist the player pulls entries from.
#[async_trait]
pub trait EntrySource: Send + Sync {
    /// Pull the next entry; `Ok(None)` when the queue is empty.
    async fn next_entry(&self) -> Result<Option<Entry>, PlayerError>;
    /// Drop all queued entries.
    async fn clear(&self);
}

/// Manages playback state, decode-subprocess lifecycle, and interaction
/// with the voice transport.
pub struct Player {
    // --- Collaborators ---
    transport: Arc<dyn VoiceTransport>,
    queue: Arc<dyn EntrySource>,
    cache: Arc<TokioMutex<AudioFileCache>>,
    /// Current auto-playlist URLs, shared with the owning bot.
    autoplaylist: Arc<RwLock<Vec<String>>>,

    // --- State ---
    state: PlayerState,
    current_entry: Option<Entry>,
    decode_task: Option<decode_task::DecodeTaskManager>,
    volume: SharedVolume,

    // --- Configuration ---
    save_media: bool,
    meter_period: Option<u32>,

    // --- Concurrency ---
    /// Serializes playback-advance operations: stop current, fetch next,
    /// start next must never interleave between two triggers.
    advance_lock: Arc<TokioMutex<()>>,

    // --- Communication ---
    command_rx: mpsc::Receiver<PlayerCommand>,
    internal_command_tx: mpsc::Sender<PlayerCommand>,
    event_tx: broadcast::Sender<PlayerEvent>,
}

impl Player {
    /// Creates a new Player instance and the command channel sender. The
    /// Player itself should be run in a separate task using `Player::run`.
    pub fn new(
        transport: Arc<dyn VoiceTransport>,
        queue: Arc<dyn EntrySource>,
        cache: Arc<TokioMutex<AudioFileCache>>,
        autoplaylist: Arc<RwLock<Vec<String>>>,
        settings: &Settings,
    ) -> (Self, mpsc::Sender<PlayerCommand>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let player = Player {
            transport,
            queue,
            cache,
            autoplaylist,
            state: PlayerState::Stopped,
            current_entry: None,
            decode_task: None,
            volume: SharedVolume::new(settings.default_volume),
            save_media: settings.save_media,
            meter_period: settings.meter_enabled.then_some(settings.meter_period),
            advance_lock: Arc::new(TokioMutex::new(())),
            command_rx,
            internal_command_tx: command_tx.clone(),
            event_tx,
        };

        (player, command_tx)
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn current_entry(&self) -> Option<&Entry> {
        self.current_entry.as_ref()
    }

    pub fn is_dead(&self) -> bool {
        self.state == PlayerState::Dead
    }

    /// Subscribes to player lifecycle events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.event_tx.subscribe()
    }

    /// Number of live event subscribers.
    pub fn event_subscriber_count(&self) -> usize {
        self.event_tx.receiver_count()
    }

    /// Last set volume; reads back even with no active relay.
    pub fn volume(&self) -> f32 {
        self.volume.get()
    }

    /// Setting the volume immediately propagates to the active relay,
    /// which shares the same handle. Requests outside the usable range
    /// are clamped.
    pub fn set_volume(&self, volume: f32) {
        let volume = volume.clamp(0.0, crate::audio::MAX_VOLUME);
        debug!(target: PLAYER_LOG_TARGET, "Setting volume to {}.", volume);
        self.volume.set(volume);
    }

    /// Approximate elapsed playback time: frames sent times a fixed
    /// per-frame duration. Not exact.
    pub fn progress_seconds(&self) -> f64 {
        self.decode_task
            .as_ref()
            .map(|t| t.frames_sent() as f64 * FRAME_DURATION_SECS)
            .unwrap_or(0.0)
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            state: self.state,
            current_entry: self.current_entry.clone(),
            progress_seconds: self.progress_seconds(),
            volume: self.volume(),
        }
    }

    /// Sends a lifecycle event, logging when nobody is listening.
    fn broadcast(&self, event: PlayerEvent) {
        if self.event_tx.send(event.clone()).is_err() {
            debug!(target: PLAYER_LOG_TARGET, "No active listeners for event: {:?}", event);
        }
    }

    // --- Transport controls ---

    /// Starts playback. Idempotent while already playing.
    #[instrument(skip(self))]
    pub async fn play(&mut self) -> Result<(), PlayerError> {
        match self.state {
            PlayerState::Dead => Err(PlayerError::InvalidState(
                "cannot play: player is dead".to_string(),
            )),
            PlayerState::Playing => {
                debug!(target: PLAYER_LOG_TARGET, "play() while already playing, ignoring.");
                Ok(())
            }
            // The paused entry must survive a play request; only
            // stop/skip/kill may discard it.
            PlayerState::Paused => self.resume().await,
            _ => self.advance().await,
        }
    }

    /// Pauses the active entry.
    #[instrument(skip(self))]
    pub async fn pause(&mut self) -> Result<(), PlayerError> {
        if self.state != PlayerState::Playing {
            return Err(PlayerError::InvalidState(format!(
                "cannot pause from {:?}",
                self.state
            )));
        }
        if let Some(task) = self.decode_task.as_ref() {
            task.pause();
        }
        self.state = PlayerState::Paused;
        self.broadcast(PlayerEvent::Paused);
        Ok(())
    }

    /// Resumes a paused entry. With no live subprocess (e.g. the decoder
    /// died while paused) the playback pipeline is re-triggered instead.
    #[instrument(skip(self))]
    pub async fn resume(&mut self) -> Result<(), PlayerError> {
        if self.state != PlayerState::Paused {
            return Err(PlayerError::InvalidState(format!(
                "cannot resume from {:?}",
                self.state
            )));
        }
        match self.decode_task.as_ref() {
            Some(task) => {
                task.resume();
                self.state = PlayerState::Playing;
                self.broadcast(PlayerEvent::Resumed);
                Ok(())
            }
            None => {
                warn!(target: PLAYER_LOG_TARGET, "Resume with no decode subprocess, re-triggering playback.");
                self.advance().await
            }
        }
    }

    /// Stops playback and discards the active entry.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<(), PlayerError> {
        if self.state == PlayerState::Dead {
            return Err(PlayerError::InvalidState(
                "cannot stop: player is dead".to_string(),
            ));
        }
        let lock = self.advance_lock.clone();
        let _guard = lock.lock().await;
        if let Some(task) = self.decode_task.take() {
            task.stop().await;
        }
        self.current_entry = None;
        self.state = PlayerState::Stopped;
        self.broadcast(PlayerEvent::Stopped);
        Ok(())
    }

    /// Kills the active entry and advances to the next one.
    #[instrument(skip(self))]
    pub async fn skip(&mut self) -> Result<(), PlayerError> {
        if self.state == PlayerState::Dead {
            return Err(PlayerError::InvalidState(
                "cannot skip: player is dead".to_string(),
            ));
        }
        self.advance().await
    }

    /// Hard-cancels everything: subprocess, queue, event subscribers.
    /// Safe to call from any state; the player is unusable afterwards.
    #[instrument(skip(self))]
    pub async fn kill(&mut self) {
        info!(target: PLAYER_LOG_TARGET, "Killing player.");
        if let Some(task) = self.decode_task.take() {
            task.stop().await;
        }
        self.current_entry = None;
        self.state = PlayerState::Dead;
        self.queue.clear().await;
        self.broadcast(PlayerEvent::Dead);
        // Dropping the sender is the only way to detach broadcast
        // subscribers; the replacement starts with zero receivers.
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        self.event_tx = event_tx;
    }

    // --- Advance pipeline ---

    /// Stops the current entry, pulls the next one, and starts it. All of
    /// that happens under the advance lock so concurrent skip/finish
    /// triggers cannot start two subprocesses.
    async fn advance(&mut self) -> Result<(), PlayerError> {
        let lock = self.advance_lock.clone();
        let _guard = lock.lock().await;

        if let Some(task) = self.decode_task.take() {
            task.stop().await;
        }
        self.current_entry = None;
        self.state = PlayerState::Waiting;

        let entry = match self.pull_next_entry().await {
            Some(entry) => entry,
            None => {
                info!(target: PLAYER_LOG_TARGET, "Queue is empty, stopping.");
                self.state = PlayerState::Stopped;
                self.broadcast(PlayerEvent::Stopped);
                return Ok(());
            }
        };

        self.start_entry(entry).await
    }

    /// Pulls the next queue entry, retrying once after a short delay on
    /// failure. A persistent failure is logged and treated as an empty
    /// queue, leaving the player stopped.
    async fn pull_next_entry(&mut self) -> Option<Entry> {
        match self.queue.next_entry().await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(target: PLAYER_LOG_TARGET, "Queue pull failed, retrying once: {}", e);
                tokio::time::sleep(ADVANCE_RETRY_DELAY).await;
                match self.queue.next_entry().await {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(target: PLAYER_LOG_TARGET, "Queue pull failed again, giving up: {}", e);
                        None
                    }
                }
            }
        }
    }

    /// Starts the decode subprocess for `entry`, retrying the spawn once.
    async fn start_entry(&mut self, entry: Entry) -> Result<(), PlayerError> {
        let filename = match entry.filename.clone() {
            Some(filename) => filename,
            None => {
                self.state = PlayerState::Stopped;
                self.broadcast(PlayerEvent::Error(format!(
                    "Entry '{}' has no local file to play.",
                    entry.title
                )));
                self.broadcast(PlayerEvent::Stopped);
                return Err(PlayerError::MissingFile(entry.url));
            }
        };

        let manager = match self.spawn_decode(&filename, &entry) {
            Ok(manager) => manager,
            Err(e) => {
                warn!(target: PLAYER_LOG_TARGET, "Decode start failed, retrying once: {}", e);
                tokio::time::sleep(ADVANCE_RETRY_DELAY).await;
                match self.spawn_decode(&filename, &entry) {
                    Ok(manager) => manager,
                    Err(e) => {
                        warn!(target: PLAYER_LOG_TARGET, "Decode start failed again: {}", e);
                        self.state = PlayerState::Stopped;
                        self.broadcast(PlayerEvent::Error(format!(
                            "Could not play '{}': {}",
                            entry.title, e
                        )));
                        self.broadcast(PlayerEvent::Stopped);
                        return Ok(());
                    }
                }
            }
        };

        self.decode_task = Some(manager);
        self.current_entry = Some(entry.clone());
        self.state = PlayerState::Playing;
        self.broadcast(PlayerEvent::Playing(entry));
        Ok(())
    }

    fn spawn_decode(
        &self,
        filename: &Path,
        entry: &Entry,
    ) -> Result<decode_task::DecodeTaskManager, PlayerError> {
        let process = self.transport.create_decode_process(filename, &[], &[])?;
        decode_task::spawn_decode_task(
            process,
            self.transport.clone(),
            self.volume.clone(),
            self.meter_period,
            entry.clone(),
            self.internal_command_tx.clone(),
        )
    }

    // --- Completion handling ---

    /// Handles natural end-of-track: reap the pump, dispose or account the
    /// temp file, emit `FinishedPlaying`, and advance. A notification for
    /// an entry that is no longer current (a skip or stop won the race)
    /// only disposes the file and must not touch the active playback.
    async fn handle_track_finished(&mut self, entry: Entry) {
        if self.current_entry.as_ref() != Some(&entry) {
            debug!(target: PLAYER_LOG_TARGET, title = %entry.title, "Stale track-finished notification, disposing file only.");
            if let Some(filename) = entry.filename.clone() {
                self.dispose_media_file(&entry, &filename).await;
            }
            return;
        }

        info!(target: PLAYER_LOG_TARGET, title = %entry.title, "Track finished.");
        if let Some(task) = self.decode_task.take() {
            task.stop().await;
        }
        self.current_entry = None;
        self.state = PlayerState::Stopped;

        if let Some(filename) = entry.filename.clone() {
            self.dispose_media_file(&entry, &filename).await;
        }
        self.broadcast(PlayerEvent::FinishedPlaying(entry));

        if let Err(e) = self.advance().await {
            warn!(target: PLAYER_LOG_TARGET, "Advance after track finish failed: {}", e);
        }
    }

    /// Either hands the finished file to the cache (which may evict) or
    /// deletes it with bounded retries. Cache-busted partial downloads are
    /// always deleted; auto-playlist downloads that are kept get recorded
    /// in the retention map.
    async fn dispose_media_file(&self, entry: &Entry, filename: &Path) {
        let autoplaylist = self
            .autoplaylist
            .read()
            .map(|list| list.clone())
            .unwrap_or_default();

        let mut cache = self.cache.lock().await;
        let keep = !entry.cache_busted
            && (self.save_media || cache.is_retained(filename, &autoplaylist));
        if keep {
            if entry.from_auto_playlist {
                if let Err(e) = cache.remember_autoplay_file(filename, &entry.url).await {
                    warn!(target: PLAYER_LOG_TARGET, "Retention-map update for {} failed: {}", filename.display(), e);
                }
            }
            if let Err(e) = cache.handle_new_file(filename, &autoplaylist).await {
                warn!(target: PLAYER_LOG_TARGET, "Cache accounting for {} failed: {}", filename.display(), e);
            }
            return;
        }
        drop(cache);

        delete_file_with_retries(filename).await;
    }

    /// Runs the player's command processing loop. This should be spawned
    /// as a Tokio task.
    #[instrument(skip(self))]
    pub async fn run(&mut self) {
        run_loop::run_player_loop(self).await;
    }
}

/// Best-effort temp-file deletion: the decoder or OS may briefly hold the
/// file open, so failures are retried with backoff and exhaustion is only
/// logged, never raised.
async fn delete_file_with_retries(path: &Path) {
    for attempt in 1..=FILE_DELETE_ATTEMPTS {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!(target: PLAYER_LOG_TARGET, "Deleted temp file {} (attempt {}).", path.display(), attempt);
                return;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                debug!(target: PLAYER_LOG_TARGET, "Delete attempt {} for {} failed: {}", attempt, path.display(), e);
                tokio::time::sleep(FILE_DELETE_BACKOFF).await;
            }
        }
    }
    warn!(
        target: PLAYER_LOG_TARGET,
        "Could not delete temp file {} after {} attempts, leaving it in place.",
        path.display(),
        FILE_DELETE_ATTEMPTS
    );
}
