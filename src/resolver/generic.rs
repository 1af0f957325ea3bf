//! Generic extraction resolver: the catch-all at the end of the chain.
//! Hands the query to the metadata backend, fixing up the common ways a
//! pasted query can be malformed before probing.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::backends::{MediaInfo, MetadataBackend};

use super::{Entry, EntryResolver, EntryTask, Resolution, ResolveContext, ResolveError};

const LOG_TARGET: &str = "melobot::resolver::generic";

pub struct GenericResolver {
    backend: Arc<dyn MetadataBackend>,
}

impl GenericResolver {
    pub fn new(backend: Arc<dyn MetadataBackend>) -> Self {
        GenericResolver { backend }
    }

    /// Fixes up a raw query before probing:
    /// - a slash-containing non-URL is percent-encoded so the backend
    ///   treats it as a search string, not a path,
    /// - a watch URL that also carries a `list` parameter is rewritten to
    ///   the collection URL the user almost certainly meant.
    pub fn preprocess(query: &str) -> String {
        match Url::parse(query) {
            Ok(parsed) => {
                if parsed.path().ends_with("/watch") {
                    let list_id = parsed
                        .query_pairs()
                        .find(|(k, _)| k == "list")
                        .map(|(_, v)| v.into_owned());
                    if let Some(list_id) = list_id {
                        let mut rewritten = parsed.clone();
                        rewritten.set_path("/playlist");
                        rewritten.set_query(Some(&format!("list={}", list_id)));
                        debug!(target: LOG_TARGET, "Rewrote watch+list URL to collection form: {}", rewritten);
                        return rewritten.to_string();
                    }
                }
                query.to_string()
            }
            Err(_) => {
                if query.contains('/') {
                    debug!(target: LOG_TARGET, "Percent-encoding ambiguous slashed query.");
                    urlencoding::encode(query).into_owned()
                } else {
                    query.to_string()
                }
            }
        }
    }

    fn entry_from_info(info: &MediaInfo, fallback_url: &str) -> Option<Entry> {
        let url = info
            .webpage_url
            .clone()
            .or_else(|| info.url.clone())
            .unwrap_or_else(|| fallback_url.to_string());
        let title = info.title.clone()?;
        let mut entry = Entry::new(title, url);
        entry.duration = info.duration;
        entry.filename = info.filename.clone().map(Into::into);
        Some(entry)
    }

    /// Builds one lazy task per collection member. A member that fails to
    /// re-probe yields a `None` placeholder instead of poisoning its
    /// siblings.
    fn member_tasks(&self, members: &[Option<MediaInfo>]) -> Vec<EntryTask> {
        members
            .iter()
            .map(|member| -> EntryTask {
                match member {
                    None => Box::pin(futures::future::ready(None)),
                    Some(info) => {
                        let backend = self.backend.clone();
                        let info = info.clone();
                        Box::pin(async move {
                            let probe_url = info.webpage_url.clone().or_else(|| info.url.clone())?;
                            match backend.extract_info(&probe_url, false, true).await {
                                Ok(resolved) => Self::entry_from_info(&resolved, &probe_url),
                                Err(e) => {
                                    warn!(target: LOG_TARGET, "Collection member failed to resolve ({}): {}", probe_url, e);
                                    None
                                }
                            }
                        })
                    }
                }
            })
            .collect()
    }
}

#[async_trait]
impl EntryResolver for GenericResolver {
    fn name(&self) -> &'static str {
        "generic"
    }

    /// Catch-all: always last in the chain, always suitable.
    fn suitable(&self, _ctx: &ResolveContext, _query: &str) -> bool {
        true
    }

    #[instrument(skip(self, _ctx), fields(query = %query))]
    async fn get_entry(
        &self,
        _ctx: &ResolveContext,
        query: &str,
        process: bool,
    ) -> Result<Option<Resolution>, ResolveError> {
        let prepared = Self::preprocess(query);
        let mut info = self.backend.extract_info(&prepared, false, process).await?;

        // The probe disagreed with us about what the target is: it handed
        // back a search sentinel instead of concrete metadata. Re-probe
        // once with the corrected URL, then give up.
        if info.is_search_sentinel() {
            let corrected = match info.url.clone() {
                Some(url) => url,
                None => return Err(ResolveError::NoEntries(query.to_string())),
            };
            debug!(target: LOG_TARGET, "Probe returned search sentinel, re-probing once: {}", corrected);
            info = self.backend.extract_info(&corrected, false, true).await?;
            if info.is_search_sentinel() {
                return Err(ResolveError::NoEntries(query.to_string()));
            }
        }

        if let Some(members) = info.entries.as_deref() {
            let tasks = self.member_tasks(members);
            return Ok(Some(Resolution {
                expected_count: members.len(),
                tasks,
            }));
        }

        match Self::entry_from_info(&info, &prepared) {
            Some(entry) => Ok(Some(Resolution::single(entry))),
            None => Err(ResolveError::NoEntries(query.to_string())),
        }
    }
}
