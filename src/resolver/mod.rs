//! Query-to-entry resolution: an ordered chain of resolvers turning a raw
//! user query into a count plus a lazy sequence of entry-construction tasks.

mod entry;
mod generic;
mod local;
mod streaming;

pub use entry::*;
pub use generic::GenericResolver;
pub use local::LocalFileResolver;
pub use streaming::{ServiceUriKind, StreamingResolver};

use crate::backends::BackendError;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

const LOG_TARGET: &str = "melobot::resolver";

/// Per-request context handed through the chain.
#[derive(Debug, Clone, Default)]
pub struct ResolveContext {
    /// Display name of the user that issued the query.
    pub requester: Option<String>,
    /// Channel the query originated from, for permission scoping.
    pub channel_id: Option<u64>,
}

/// Error types for query resolution.
#[derive(Debug)]
pub enum ResolveError {
    /// No resolver in the chain accepted the query.
    NoResolver(String),
    /// A suitable resolver produced zero entries.
    NoEntries(String),
    Backend(BackendError),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::NoResolver(q) => write!(f, "No resolver accepted query: {}", q),
            ResolveError::NoEntries(q) => write!(f, "Query produced no playable entries: {}", q),
            ResolveError::Backend(e) => write!(f, "Backend error: {}", e),
        }
    }
}

impl Error for ResolveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ResolveError::Backend(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BackendError> for ResolveError {
    fn from(err: BackendError) -> Self {
        ResolveError::Backend(err)
    }
}

/// One class of query handler (local path, streaming-service URI, generic
/// extraction).
#[async_trait]
pub trait EntryResolver: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this resolver wants to handle `query` at all.
    fn suitable(&self, ctx: &ResolveContext, query: &str) -> bool;

    /// Resolve `query` into `(expected_count, entry_tasks)`. `Ok(None)`
    /// passes the query on to the next resolver in the chain.
    async fn get_entry(
        &self,
        ctx: &ResolveContext,
        query: &str,
        process: bool,
    ) -> Result<Option<Resolution>, ResolveError>;
}

/// Ordered resolver chain. Results are not cached; every call re-resolves.
pub struct ResolverChain {
    resolvers: Vec<Arc<dyn EntryResolver>>,
}

impl ResolverChain {
    pub fn new(resolvers: Vec<Arc<dyn EntryResolver>>) -> Self {
        ResolverChain { resolvers }
    }

    /// Builds the standard chain order from settings: local files first,
    /// then the streaming service, then generic extraction. With
    /// `local_only` set the remote resolvers are left out entirely.
    pub fn from_settings(
        settings: &crate::config::Settings,
        streaming: Arc<StreamingResolver>,
        generic: Arc<GenericResolver>,
    ) -> Self {
        let local = Arc::new(LocalFileResolver::new(settings.local_search_roots.clone()));
        let resolvers: Vec<Arc<dyn EntryResolver>> = if settings.local_only {
            info!(target: LOG_TARGET, "local_only is set, remote resolvers disabled.");
            vec![local]
        } else {
            vec![local, streaming, generic]
        };
        ResolverChain { resolvers }
    }

    /// Runs the chain in priority order and returns the first non-null
    /// resolution. A suitable resolver that yields zero entries is a
    /// resolution failure, not a fall-through.
    #[instrument(skip(self, ctx), fields(query = %query))]
    pub async fn resolve(
        &self,
        ctx: &ResolveContext,
        query: &str,
    ) -> Result<Resolution, ResolveError> {
        for resolver in &self.resolvers {
            if !resolver.suitable(ctx, query) {
                continue;
            }
            debug!(target: LOG_TARGET, "Resolver '{}' declared suitable for query.", resolver.name());
            match resolver.get_entry(ctx, query, true).await? {
                Some(resolution) => {
                    if resolution.expected_count == 0 || resolution.tasks.is_empty() {
                        return Err(ResolveError::NoEntries(query.to_string()));
                    }
                    info!(
                        target: LOG_TARGET,
                        "Resolver '{}' produced {} entry task(s).",
                        resolver.name(),
                        resolution.tasks.len()
                    );
                    return Ok(resolution);
                }
                None => {
                    debug!(target: LOG_TARGET, "Resolver '{}' declined, trying next.", resolver.name());
                }
            }
        }
        Err(ResolveError::NoResolver(query.to_string()))
    }
}
