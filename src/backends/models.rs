//! Model types crossing the backend boundaries.

use serde::Deserialize;

/// Structured info returned by the extraction backend for one probe.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub title: Option<String>,
    /// Resolved URL; carries the search sentinel scheme for search probes.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    /// Duration in seconds, if the extractor knows it.
    #[serde(default)]
    pub duration: Option<f64>,
    /// Local filename once a download completed.
    #[serde(default)]
    pub filename: Option<String>,
    /// Present when the target is a collection; members may be `None` when
    /// the extractor failed on an individual item.
    #[serde(default)]
    pub entries: Option<Vec<Option<MediaInfo>>>,
    /// Name of the extractor that handled the probe.
    #[serde(default)]
    pub extractor: Option<String>,
}

impl MediaInfo {
    /// Whether this info describes a collection rather than a single item.
    pub fn is_collection(&self) -> bool {
        self.entries.is_some()
    }

    /// Whether this info is a search-result sentinel.
    pub fn is_search_sentinel(&self) -> bool {
        self.url
            .as_deref()
            .map(|u| u.starts_with(super::SEARCH_SCHEME_PREFIX))
            .unwrap_or(false)
    }
}

/// One track as described by the streaming-service catalogue.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceTrack {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub duration: Option<f64>,
}

impl ServiceTrack {
    /// Search string handed to the generic resolver, since the service
    /// exposes no direct stream URLs.
    pub fn search_query(&self) -> String {
        match self.artists.first() {
            Some(artist) => format!("{} {}", artist, self.title),
            None => self.title.clone(),
        }
    }
}

/// One page of a paginated catalogue listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServicePage {
    pub tracks: Vec<ServiceTrack>,
    /// Cursor for the next page, if any.
    #[serde(default)]
    pub next: Option<String>,
}
