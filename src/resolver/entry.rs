use futures::future::BoxFuture;
use std::fmt;
use std::path::PathBuf;

/// One playable unit of media.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub title: String,
    /// Originating URL or query.
    pub url: String,
    /// Local filename once downloaded.
    pub filename: Option<PathBuf>,
    /// Duration in seconds, if known.
    pub duration: Option<f64>,
    /// Set when the download completed only partially and the file must
    /// not be reused from cache.
    pub cache_busted: bool,
    /// Set by the owning bot when this entry came from the auto-playlist;
    /// its file is then recorded in the cache retention map after playback.
    pub from_auto_playlist: bool,
}

impl Entry {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Entry {
            title: title.into(),
            url: url.into(),
            filename: None,
            duration: None,
            cache_busted: false,
            from_auto_playlist: false,
        }
    }
}

/// Lazy entry-construction task. A failed task yields `None` rather than
/// aborting its siblings.
pub type EntryTask = BoxFuture<'static, Option<Entry>>;

/// What a resolver hands back: how many entries to expect, plus the lazy
/// tasks that materialize them.
pub struct Resolution {
    pub expected_count: usize,
    pub tasks: Vec<EntryTask>,
}

impl Resolution {
    pub fn single(entry: Entry) -> Self {
        Resolution {
            expected_count: 1,
            tasks: vec![Box::pin(futures::future::ready(Some(entry)))],
        }
    }
}

// The boxed task futures are opaque; show only their count.
impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field("expected_count", &self.expected_count)
            .field("tasks", &self.tasks.len())
            .finish()
    }
}
