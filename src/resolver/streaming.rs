//! Streaming-service resolver. The service catalogue exposes no direct
//! stream URLs, so every track is re-resolved through the generic
//! extraction path with a synthesized "artist title" search string.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::backends::{ServiceTrack, StreamingServiceBackend};

use super::{
    EntryResolver, EntryTask, GenericResolver, Resolution, ResolveContext, ResolveError,
};

const LOG_TARGET: &str = "melobot::resolver::streaming";

/// Service identifier in the normalized `service:type:id` form.
const SERVICE: &str = "spotify";
/// Canonical web host for the link form of service URIs.
const LINK_HOST: &str = "open.spotify.com";

/// Kind of catalogue object a service URI points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceUriKind {
    Track,
    Album,
    Playlist,
}

impl ServiceUriKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "track" => Some(ServiceUriKind::Track),
            "album" => Some(ServiceUriKind::Album),
            "playlist" => Some(ServiceUriKind::Playlist),
            _ => None,
        }
    }
}

pub struct StreamingResolver {
    service: Arc<dyn StreamingServiceBackend>,
    generic: Arc<GenericResolver>,
}

impl StreamingResolver {
    pub fn new(service: Arc<dyn StreamingServiceBackend>, generic: Arc<GenericResolver>) -> Self {
        StreamingResolver { service, generic }
    }

    /// Normalizes the canonical URI form (`spotify:track:id`) and the link
    /// form (`https://open.spotify.com/track/id?...`) into `(kind, id)`.
    pub fn parse_uri(query: &str) -> Option<(ServiceUriKind, String)> {
        if let Some(rest) = query.strip_prefix(&format!("{}:", SERVICE)) {
            let mut parts = rest.splitn(2, ':');
            let kind = ServiceUriKind::parse(parts.next()?)?;
            let id = parts.next()?.trim();
            if id.is_empty() {
                return None;
            }
            return Some((kind, id.to_string()));
        }

        let parsed = url::Url::parse(query).ok()?;
        if parsed.host_str()? != LINK_HOST {
            return None;
        }
        let mut segments = parsed.path_segments()?.filter(|s| !s.is_empty());
        let kind = ServiceUriKind::parse(segments.next()?)?;
        let id = segments.next()?.to_string();
        if id.is_empty() {
            None
        } else {
            Some((kind, id))
        }
    }

    /// One lazy task delegating a catalogue track to the generic resolver.
    /// Any failure along the way yields a `None` placeholder.
    fn delegate_track(&self, ctx: &ResolveContext, track: &ServiceTrack) -> EntryTask {
        let generic = self.generic.clone();
        let ctx = ctx.clone();
        let search = track.search_query();
        let duration = track.duration;
        Box::pin(async move {
            match generic.get_entry(&ctx, &search, true).await {
                Ok(Some(mut resolution)) => {
                    let task = resolution.tasks.drain(..).next()?;
                    let mut entry = task.await?;
                    // The catalogue duration is more trustworthy than the
                    // search hit's.
                    if duration.is_some() {
                        entry.duration = duration;
                    }
                    Some(entry)
                }
                Ok(None) => None,
                Err(e) => {
                    warn!(target: LOG_TARGET, "Delegated search '{}' failed: {}", search, e);
                    None
                }
            }
        })
    }

    /// Collects all tracks of a paginated listing, following `next` cursors.
    async fn collect_pages(
        &self,
        mut page: crate::backends::ServicePage,
    ) -> Result<Vec<ServiceTrack>, ResolveError> {
        let mut tracks = page.tracks;
        while let Some(cursor) = page.next.take() {
            page = self.service.get_next_page(&cursor).await?;
            tracks.extend(page.tracks.drain(..));
        }
        Ok(tracks)
    }
}

#[async_trait]
impl EntryResolver for StreamingResolver {
    fn name(&self) -> &'static str {
        "streaming"
    }

    fn suitable(&self, _ctx: &ResolveContext, query: &str) -> bool {
        Self::parse_uri(query).is_some()
    }

    #[instrument(skip(self, ctx), fields(query = %query))]
    async fn get_entry(
        &self,
        ctx: &ResolveContext,
        query: &str,
        _process: bool,
    ) -> Result<Option<Resolution>, ResolveError> {
        let (kind, id) = match Self::parse_uri(query) {
            Some(parsed) => parsed,
            None => return Ok(None),
        };
        debug!(target: LOG_TARGET, "Normalized query to {}:{:?}:{}", SERVICE, kind, id);

        let tracks = match kind {
            ServiceUriKind::Track => vec![self.service.get_track(&id).await?],
            ServiceUriKind::Album => {
                let page = self.service.get_album(&id).await?;
                self.collect_pages(page).await?
            }
            ServiceUriKind::Playlist => {
                let page = self.service.get_playlist_tracks(&id).await?;
                self.collect_pages(page).await?
            }
        };

        let tasks: Vec<EntryTask> = tracks
            .iter()
            .map(|track| self.delegate_track(ctx, track))
            .collect();

        Ok(Some(Resolution {
            expected_count: tracks.len(),
            tasks,
        }))
    }
}
