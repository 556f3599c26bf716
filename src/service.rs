use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::cache::FileCache;
use crate::channels::ChannelManager;
use crate::config::NewsConfig;
use crate::distributor::{Distributor, TargetOutcome};
use crate::error::CacheError;
use crate::fetcher::{FetchResult, Fetcher, RetryPolicy};
use crate::kind::ContentKind;
use crate::resolver::{NewsResolver, today};

const PUSH_THROTTLE: Duration = Duration::from_secs(2);

/// Everything the scheduled cycle and the command surface share.
pub struct NewsService {
    config: NewsConfig,
    cache: Arc<FileCache>,
    resolver: Arc<NewsResolver>,
    distributor: Distributor,
}

/// What one refresh-expire-distribute cycle did.
#[derive(Debug)]
pub struct CycleReport {
    pub refreshed: Vec<(ContentKind, bool)>,
    pub swept: usize,
    pub outcomes: Vec<TargetOutcome>,
}

impl NewsService {
    pub fn new(config: NewsConfig, cache_dir: PathBuf, channels: ChannelManager) -> Result<Self> {
        let cache = Arc::new(FileCache::new(cache_dir)?);
        Ok(Self::with_parts(
            config,
            cache,
            RetryPolicy::default(),
            Arc::new(channels),
            PUSH_THROTTLE,
        ))
    }

    pub fn with_parts(
        config: NewsConfig,
        cache: Arc<FileCache>,
        policy: RetryPolicy,
        channels: Arc<ChannelManager>,
        throttle: Duration,
    ) -> Self {
        let fetcher = Fetcher::new(config.api_base(), cache.clone(), policy);
        let resolver = Arc::new(NewsResolver::new(cache.clone(), fetcher));
        let distributor = Distributor::new(resolver.clone(), channels, throttle);
        Self {
            config,
            cache,
            resolver,
            distributor,
        }
    }

    pub fn config(&self) -> &NewsConfig {
        &self.config
    }

    pub async fn resolve_today(&self, kind: ContentKind) -> FetchResult {
        self.resolver.resolve_today(kind).await
    }

    pub async fn update_news(&self) -> Vec<(ContentKind, FetchResult)> {
        self.resolver.refresh_all_today().await
    }

    pub fn clean(&self) -> Result<usize, CacheError> {
        self.cache.sweep_expired(today(), self.config.save_days)
    }

    pub async fn push(&self) -> Vec<TargetOutcome> {
        self.distributor
            .push_to_all(&self.config.groups, self.config.news_type)
            .await
    }

    /// Refresh both kinds, expire old files, push to every target. A failed
    /// refresh is logged and the push still runs (it retries on its own); a
    /// sweep error aborts the cycle.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let mut refreshed = Vec::new();
        for (kind, result) in self.update_news().await {
            if let Some(e) = &result.error {
                tracing::warn!("Scheduled refresh of {kind} news failed: {e}");
            }
            refreshed.push((kind, result.success()));
        }

        let swept = self.clean()?;
        let outcomes = self.push().await;

        Ok(CycleReport {
            refreshed,
            swept,
            outcomes,
        })
    }
}
