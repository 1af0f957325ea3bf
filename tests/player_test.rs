//! Player state-machine integration tests with a mock voice transport and
//! queue.

use async_trait::async_trait;
use melobot::backends::{DecodeProcess, TransportError, VoiceTransport};
use melobot::cache::AudioFileCache;
use melobot::config::Settings;
use melobot::player::{EntrySource, Player, PlayerCommand, PlayerError, PlayerEvent, PlayerState};
use melobot::resolver::Entry;
use std::collections::VecDeque;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex as TokioMutex};
use tokio::time::timeout;

const EVENT_WAIT: Duration = Duration::from_secs(5);

/// PCM source that trickles out zeros so playback stays active long enough
/// for transport-control tests.
struct SlowPcm {
    remaining: usize,
}

impl Read for SlowPcm {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        std::thread::sleep(Duration::from_millis(2));
        let n = buf.len().min(self.remaining).min(3840);
        for b in &mut buf[..n] {
            *b = 0;
        }
        self.remaining -= n;
        Ok(n)
    }
}

struct MockDecodeProcess {
    bytes: usize,
    started: bool,
    running: bool,
    output_taken: bool,
}

impl DecodeProcess for MockDecodeProcess {
    fn start(&mut self) -> Result<(), TransportError> {
        self.started = true;
        self.running = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn resume(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TransportError> {
        self.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn take_output(&mut self) -> Option<Box<dyn Read + Send>> {
        if !self.started || self.output_taken {
            return None;
        }
        self.output_taken = true;
        Some(Box::new(SlowPcm {
            remaining: self.bytes,
        }))
    }
}

struct MockTransport {
    /// Decoded bytes each spawned process will produce.
    process_bytes: usize,
    spawn_count: AtomicUsize,
    open: AtomicBool,
    reconnects: AtomicUsize,
}

impl MockTransport {
    fn new(process_bytes: usize) -> Self {
        MockTransport {
            process_bytes,
            spawn_count: AtomicUsize::new(0),
            open: AtomicBool::new(true),
            reconnects: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VoiceTransport for MockTransport {
    fn create_decode_process(
        &self,
        _filename: &Path,
        _before_options: &[String],
        _options: &[String],
    ) -> Result<Box<dyn DecodeProcess>, TransportError> {
        self.spawn_count.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDecodeProcess {
            bytes: self.process_bytes,
            started: false,
            running: false,
            output_taken: false,
        }))
    }

    fn send_frame(&self, _frame: &[u8]) -> Result<(), TransportError> {
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn ensure_open(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn reconnect(&self) -> Result<(), TransportError> {
        self.reconnects.fetch_add(1, Ordering::SeqCst);
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct MockQueue {
    entries: Mutex<VecDeque<Entry>>,
    fail_next: AtomicBool,
    cleared: AtomicBool,
}

impl MockQueue {
    fn new(entries: Vec<Entry>) -> Self {
        MockQueue {
            entries: Mutex::new(entries.into()),
            fail_next: AtomicBool::new(false),
            cleared: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl EntrySource for MockQueue {
    async fn next_entry(&self) -> Result<Option<Entry>, PlayerError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(PlayerError::Queue("transient queue failure".to_string()));
        }
        Ok(self.entries.lock().unwrap().pop_front())
    }

    async fn clear(&self) {
        self.entries.lock().unwrap().clear();
        self.cleared.store(true, Ordering::SeqCst);
    }
}

struct Harness {
    command_tx: mpsc::Sender<PlayerCommand>,
    events: broadcast::Receiver<PlayerEvent>,
    transport: Arc<MockTransport>,
    queue: Arc<MockQueue>,
    cache: Arc<TokioMutex<AudioFileCache>>,
    _tempdir: tempfile::TempDir,
}

impl Harness {
    async fn next_event(&mut self) -> PlayerEvent {
        timeout(EVENT_WAIT, self.events.recv())
            .await
            .expect("timed out waiting for player event")
            .expect("event channel closed")
    }

    async fn snapshot(&self) -> melobot::player::PlayerSnapshot {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(PlayerCommand::GetState(tx))
            .await
            .unwrap();
        timeout(EVENT_WAIT, rx).await.unwrap().unwrap()
    }
}

/// Spawns a player over mocks with `titles` queued, each backed by a real
/// temp file, producing `process_bytes` of PCM per entry. With `autoplay`
/// set, retention is fully enabled and the entries are marked as coming
/// from the auto-playlist.
fn spawn_player(titles: &[&str], process_bytes: usize, save_media: bool, autoplay: bool) -> Harness {
    let tempdir = tempfile::tempdir().unwrap();
    let entries: Vec<Entry> = titles
        .iter()
        .map(|title| {
            let path = tempdir.path().join(format!("{}.webm", title));
            std::fs::write(&path, b"media").unwrap();
            let mut entry = Entry::new(*title, format!("https://e.com/{}", title));
            entry.filename = Some(path);
            entry.from_auto_playlist = autoplay;
            entry
        })
        .collect();

    let mut settings = Settings::default();
    settings.cache_dir = tempdir.path().to_path_buf();
    settings.save_media = save_media;
    settings.retain_autoplay = autoplay;
    settings.auto_playlist = autoplay;

    let transport = Arc::new(MockTransport::new(process_bytes));
    let queue = Arc::new(MockQueue::new(entries));
    let cache = Arc::new(TokioMutex::new(AudioFileCache::new(&settings)));
    let autoplaylist = Arc::new(RwLock::new(Vec::new()));

    let (mut player, command_tx) = Player::new(
        transport.clone(),
        queue.clone(),
        cache.clone(),
        autoplaylist,
        &settings,
    );
    let events = player.subscribe_events();
    tokio::spawn(async move { player.run().await });

    Harness {
        command_tx,
        events,
        transport,
        queue,
        cache,
        _tempdir: tempdir,
    }
}

fn entry_file(tempdir: &tempfile::TempDir, title: &str) -> PathBuf {
    tempdir.path().join(format!("{}.webm", title))
}

#[tokio::test]
async fn test_play_pause_resume_flow() {
    // Long stream so the track does not finish mid-test.
    let mut h = spawn_player(&["song"], 3840 * 2000, false, false);

    h.command_tx.send(PlayerCommand::Play).await.unwrap();
    match h.next_event().await {
        PlayerEvent::Playing(entry) => assert_eq!(entry.title, "song"),
        other => panic!("expected Playing, got {:?}", other),
    }

    let snap = h.snapshot().await;
    assert_eq!(snap.state, PlayerState::Playing);
    assert!(snap.current_entry.is_some());

    h.command_tx.send(PlayerCommand::Pause).await.unwrap();
    assert_eq!(h.next_event().await, PlayerEvent::Paused);
    assert_eq!(h.snapshot().await.state, PlayerState::Paused);

    h.command_tx.send(PlayerCommand::Resume).await.unwrap();
    assert_eq!(h.next_event().await, PlayerEvent::Resumed);
    assert_eq!(h.snapshot().await.state, PlayerState::Playing);

    // Pause/resume must reuse the existing subprocess.
    assert_eq!(h.transport.spawn_count.load(Ordering::SeqCst), 1);

    h.command_tx.send(PlayerCommand::Kill).await.unwrap();
}

#[tokio::test]
async fn test_play_is_idempotent_while_playing() {
    let mut h = spawn_player(&["song"], 3840 * 2000, false, false);

    h.command_tx.send(PlayerCommand::Play).await.unwrap();
    assert!(matches!(h.next_event().await, PlayerEvent::Playing(_)));

    h.command_tx.send(PlayerCommand::Play).await.unwrap();
    let snap = h.snapshot().await;
    assert_eq!(snap.state, PlayerState::Playing);
    assert_eq!(h.transport.spawn_count.load(Ordering::SeqCst), 1);

    h.command_tx.send(PlayerCommand::Kill).await.unwrap();
}

#[tokio::test]
async fn test_resume_while_stopped_is_invalid_state() {
    let mut h = spawn_player(&["song"], 3840 * 2000, false, false);

    h.command_tx.send(PlayerCommand::Resume).await.unwrap();
    match h.next_event().await {
        PlayerEvent::Error(msg) => assert!(msg.contains("Invalid state"), "got: {}", msg),
        other => panic!("expected Error event, got {:?}", other),
    }
    assert_eq!(h.snapshot().await.state, PlayerState::Stopped);
    assert_eq!(h.transport.spawn_count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_finished_track_deletes_file_and_stops() {
    // Tiny stream: finishes almost immediately.
    let mut h = spawn_player(&["short"], 3840 * 2, false, false);
    let file = entry_file(&h._tempdir, "short");

    h.command_tx.send(PlayerCommand::Play).await.unwrap();
    assert!(matches!(h.next_event().await, PlayerEvent::Playing(_)));
    match h.next_event().await {
        PlayerEvent::FinishedPlaying(entry) => assert_eq!(entry.title, "short"),
        other => panic!("expected FinishedPlaying, got {:?}", other),
    }
    // Queue is now empty; the advance lands in Stopped.
    assert_eq!(h.next_event().await, PlayerEvent::Stopped);

    let snap = h.snapshot().await;
    assert_eq!(snap.state, PlayerState::Stopped);
    assert!(snap.current_entry.is_none());
    assert!(!file.exists(), "temp file should be deleted after playback");
}

#[tokio::test]
async fn test_save_media_keeps_file() {
    let mut h = spawn_player(&["keeper"], 3840 * 2, true, false);
    let file = entry_file(&h._tempdir, "keeper");

    h.command_tx.send(PlayerCommand::Play).await.unwrap();
    assert!(matches!(h.next_event().await, PlayerEvent::Playing(_)));
    assert!(matches!(h.next_event().await, PlayerEvent::FinishedPlaying(_)));
    assert_eq!(h.next_event().await, PlayerEvent::Stopped);

    assert!(file.exists(), "saved media must survive playback");
}

#[tokio::test]
async fn test_skip_advances_to_next_entry() {
    let mut h = spawn_player(&["first", "second"], 3840 * 2000, false, false);

    h.command_tx.send(PlayerCommand::Play).await.unwrap();
    match h.next_event().await {
        PlayerEvent::Playing(entry) => assert_eq!(entry.title, "first"),
        other => panic!("expected Playing, got {:?}", other),
    }

    h.command_tx.send(PlayerCommand::Skip).await.unwrap();
    match h.next_event().await {
        PlayerEvent::Playing(entry) => assert_eq!(entry.title, "second"),
        other => panic!("expected Playing(second), got {:?}", other),
    }
    assert_eq!(h.transport.spawn_count.load(Ordering::SeqCst), 2);

    h.command_tx.send(PlayerCommand::Kill).await.unwrap();
}

#[tokio::test]
async fn test_queue_pull_failure_is_retried_once() {
    let mut h = spawn_player(&["song"], 3840 * 2000, false, false);
    h.queue.fail_next.store(true, Ordering::SeqCst);

    h.command_tx.send(PlayerCommand::Play).await.unwrap();
    // The transient failure is invisible beyond added latency.
    match h.next_event().await {
        PlayerEvent::Playing(entry) => assert_eq!(entry.title, "song"),
        other => panic!("expected Playing after retry, got {:?}", other),
    }

    h.command_tx.send(PlayerCommand::Kill).await.unwrap();
}

#[tokio::test]
async fn test_kill_reaches_dead_and_detaches_subscribers() {
    let mut h = spawn_player(&["song", "later"], 3840 * 2000, false, false);

    h.command_tx.send(PlayerCommand::Play).await.unwrap();
    assert!(matches!(h.next_event().await, PlayerEvent::Playing(_)));

    h.command_tx.send(PlayerCommand::Kill).await.unwrap();
    assert_eq!(h.next_event().await, PlayerEvent::Dead);

    // The old event channel is dropped on kill; subscribers see Closed.
    let closed = timeout(EVENT_WAIT, h.events.recv()).await.unwrap();
    assert!(matches!(closed, Err(broadcast::error::RecvError::Closed)));

    assert!(h.queue.cleared.load(Ordering::SeqCst), "kill must clear the queue");
}

#[tokio::test]
async fn test_play_while_paused_resumes_same_track() {
    let mut h = spawn_player(&["song"], 3840 * 2000, false, false);

    h.command_tx.send(PlayerCommand::Play).await.unwrap();
    assert!(matches!(h.next_event().await, PlayerEvent::Playing(_)));
    h.command_tx.send(PlayerCommand::Pause).await.unwrap();
    assert_eq!(h.next_event().await, PlayerEvent::Paused);

    // Play from Paused must continue the paused entry, not advance past it.
    h.command_tx.send(PlayerCommand::Play).await.unwrap();
    assert_eq!(h.next_event().await, PlayerEvent::Resumed);

    let snap = h.snapshot().await;
    assert_eq!(snap.state, PlayerState::Playing);
    assert_eq!(snap.current_entry.unwrap().title, "song");
    assert_eq!(h.transport.spawn_count.load(Ordering::SeqCst), 1);

    h.command_tx.send(PlayerCommand::Kill).await.unwrap();
}

#[tokio::test]
async fn test_stale_track_finished_leaves_current_track_alone() {
    let mut h = spawn_player(&["song"], 3840 * 2000, false, false);

    h.command_tx.send(PlayerCommand::Play).await.unwrap();
    assert!(matches!(h.next_event().await, PlayerEvent::Playing(_)));

    // A finish notification for an entry that lost a race with skip/stop:
    // its file is cleaned up but the active track keeps playing.
    let ghost_file = h._tempdir.path().join("ghost.webm");
    std::fs::write(&ghost_file, b"media").unwrap();
    let mut ghost = Entry::new("ghost", "https://e.com/ghost");
    ghost.filename = Some(ghost_file.clone());
    h.command_tx
        .send(PlayerCommand::TrackFinished(ghost))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    let snap = h.snapshot().await;
    assert_eq!(snap.state, PlayerState::Playing);
    assert_eq!(snap.current_entry.unwrap().title, "song");
    assert_eq!(h.transport.spawn_count.load(Ordering::SeqCst), 1);
    assert!(!ghost_file.exists(), "stale entry's file should be disposed");

    h.command_tx.send(PlayerCommand::Kill).await.unwrap();
}

#[tokio::test]
async fn test_autoplay_track_recorded_in_retention_map() {
    let mut h = spawn_player(&["pinned"], 3840 * 2, true, true);
    let file = entry_file(&h._tempdir, "pinned");

    h.command_tx.send(PlayerCommand::Play).await.unwrap();
    assert!(matches!(h.next_event().await, PlayerEvent::Playing(_)));
    assert!(matches!(h.next_event().await, PlayerEvent::FinishedPlaying(_)));
    assert_eq!(h.next_event().await, PlayerEvent::Stopped);

    assert!(file.exists());
    let cache = h.cache.lock().await;
    assert_eq!(
        cache.retention_map().get("pinned"),
        Some(&"https://e.com/pinned".to_string())
    );
}

#[tokio::test]
async fn test_kill_from_stopped_state() {
    let mut h = spawn_player(&[], 3840, false, false);

    h.command_tx.send(PlayerCommand::Kill).await.unwrap();
    assert_eq!(h.next_event().await, PlayerEvent::Dead);

    let closed = timeout(EVENT_WAIT, h.events.recv()).await.unwrap();
    assert!(matches!(closed, Err(broadcast::error::RecvError::Closed)));
}
