use std::sync::Arc;

use chrono::{Local, NaiveDate};

use crate::cache::FileCache;
use crate::fetcher::{Digest, FetchResult, Fetcher};
use crate::kind::ContentKind;

/// Cache-first access to a day's digest.
pub struct NewsResolver {
    cache: Arc<FileCache>,
    fetcher: Fetcher,
}

impl NewsResolver {
    pub fn new(cache: Arc<FileCache>, fetcher: Fetcher) -> Self {
        Self { cache, fetcher }
    }

    pub async fn resolve_today(&self, kind: ContentKind) -> FetchResult {
        self.resolve(kind, today()).await
    }

    /// Return the cached entry when present, otherwise fetch it. Cached files
    /// are trusted as-is.
    pub async fn resolve(&self, kind: ContentKind, date: NaiveDate) -> FetchResult {
        let path = self.cache.path_for(date, kind);
        if self.cache.exists(&path) {
            match kind {
                ContentKind::Image => return FetchResult::ok(Digest::Image(path)),
                ContentKind::Text => match std::fs::read(&path) {
                    Ok(bytes) => {
                        let text = String::from_utf8_lossy(&bytes).into_owned();
                        return FetchResult::ok(Digest::Text(text));
                    }
                    Err(e) => {
                        tracing::warn!("Cached news {} unreadable, refetching: {e}", path.display());
                    }
                },
            }
        }
        self.fetcher.fetch(kind, date).await
    }

    pub async fn refresh_today(&self, kind: ContentKind) -> FetchResult {
        self.refresh(kind, today()).await
    }

    /// Fetch unconditionally, replacing any cached entry on success.
    pub async fn refresh(&self, kind: ContentKind, date: NaiveDate) -> FetchResult {
        self.fetcher.fetch(kind, date).await
    }

    /// Refresh text then image for today.
    pub async fn refresh_all_today(&self) -> Vec<(ContentKind, FetchResult)> {
        tracing::info!("Force-updating today's news files");
        let mut results = Vec::with_capacity(ContentKind::ALL.len());
        for kind in ContentKind::ALL {
            results.push((kind, self.refresh_today(kind).await));
        }
        results
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
