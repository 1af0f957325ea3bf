//! Capability contracts for the external collaborators: the metadata
//! extraction backend, the streaming-service catalogue, and the voice
//! transport. The core only depends on these traits; any implementation
//! satisfying the contracts is interchangeable.

mod error;
mod models;
mod transport;

pub use error::*;
pub use models::*;
pub use transport::*;

use async_trait::async_trait;

/// Scheme prefix the extraction backend uses to mark search-result
/// sentinels in `MediaInfo::url`.
pub const SEARCH_SCHEME_PREFIX: &str = "mbsearch";

/// Contract for the metadata/extraction backend (resolves a URL or search
/// string into raw stream descriptors).
#[async_trait]
pub trait MetadataBackend: Send + Sync {
    /// Probe (and optionally download) the target of `query`.
    ///
    /// The result may describe a single item, a collection (`entries`
    /// present), or a search sentinel (`url` starting with
    /// [`SEARCH_SCHEME_PREFIX`]).
    async fn extract_info(
        &self,
        query: &str,
        download: bool,
        process: bool,
    ) -> Result<MediaInfo, BackendError>;
}

/// Contract for the streaming-service catalogue backend. The service does
/// not expose direct stream URLs, so callers only get track metadata and
/// must re-resolve each item through the generic extraction path.
#[async_trait]
pub trait StreamingServiceBackend: Send + Sync {
    async fn get_track(&self, id: &str) -> Result<ServiceTrack, BackendError>;
    async fn get_album(&self, id: &str) -> Result<ServicePage, BackendError>;
    async fn get_playlist_tracks(&self, id: &str) -> Result<ServicePage, BackendError>;
    /// Follow a pagination cursor returned in a previous [`ServicePage`].
    async fn get_next_page(&self, cursor: &str) -> Result<ServicePage, BackendError>;
}
