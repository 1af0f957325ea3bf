//! Local-file resolver: serves queries that name a file under one of the
//! configured search roots. First in the chain so plain paths never hit
//! the network.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, instrument, warn};

use super::{Entry, EntryResolver, Resolution, ResolveContext, ResolveError};

const LOG_TARGET: &str = "melobot::resolver::local";

pub struct LocalFileResolver {
    search_roots: Vec<PathBuf>,
}

impl LocalFileResolver {
    pub fn new(search_roots: Vec<PathBuf>) -> Self {
        LocalFileResolver { search_roots }
    }

    /// Normalizes Windows-style paths into canonical forward-slash,
    /// driveless form: `C:\Music\a.mp3` becomes `Music/a.mp3`.
    pub fn normalize(query: &str) -> String {
        let mut s = query.replace('\\', "/");
        let bytes = s.as_bytes();
        if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
            s = s[2..].trim_start_matches('/').to_string();
        }
        s
    }

    /// Rejects any path that tries to climb out of the search roots.
    fn has_parent_component(path: &str) -> bool {
        Path::new(path)
            .components()
            .any(|c| matches!(c, Component::ParentDir))
    }

    fn find_in_roots(&self, relative: &str) -> Option<PathBuf> {
        let rel = Path::new(relative.trim_start_matches('/'));
        for root in &self.search_roots {
            let candidate = root.join(rel);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }
}

#[async_trait]
impl EntryResolver for LocalFileResolver {
    fn name(&self) -> &'static str {
        "local"
    }

    fn suitable(&self, _ctx: &ResolveContext, query: &str) -> bool {
        if query.contains("://") {
            return false;
        }
        let normalized = Self::normalize(query);
        if Self::has_parent_component(&normalized) {
            debug!(target: LOG_TARGET, "Refusing path with parent-directory component: {}", query);
            return false;
        }
        self.find_in_roots(&normalized).is_some()
    }

    #[instrument(skip(self, _ctx), fields(query = %query))]
    async fn get_entry(
        &self,
        _ctx: &ResolveContext,
        query: &str,
        _process: bool,
    ) -> Result<Option<Resolution>, ResolveError> {
        let normalized = Self::normalize(query);
        let path = match self.find_in_roots(&normalized) {
            Some(path) => path,
            None => {
                // suitable() said yes but the file vanished in between.
                warn!(target: LOG_TARGET, "Local file disappeared before resolution: {}", normalized);
                return Ok(None);
            }
        };

        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| normalized.clone());

        let mut entry = Entry::new(title, query);
        entry.filename = Some(path);
        Ok(Some(Resolution::single(entry)))
    }
}
