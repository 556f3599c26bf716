use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::{Client, StatusCode};

use crate::cache::FileCache;
use crate::error::FetchError;
use crate::kind::ContentKind;

/// Fetched or cached digest content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Digest {
    Text(String),
    Image(PathBuf),
}

impl Digest {
    /// Short human-readable preview used in logs and replies.
    pub fn preview(&self, max_chars: usize) -> String {
        match self {
            Digest::Text(text) => text.chars().take(max_chars).collect(),
            Digest::Image(path) => path.display().to_string(),
        }
    }
}

/// Outcome of one fetch or resolution. On failure `content` holds a
/// displayable error text and `error` the typed cause.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub content: Digest,
    pub error: Option<FetchError>,
}

impl FetchResult {
    pub fn ok(content: Digest) -> Self {
        Self {
            content,
            error: None,
        }
    }

    pub fn failed(error: FetchError) -> Self {
        Self {
            content: Digest::Text(format!(
                "News API error, please contact the administrator: {error}"
            )),
            error: Some(error),
        }
    }

    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub timeout: Duration,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            timeout: Duration::from_secs(5),
            delay: Duration::from_secs(1),
        }
    }
}

pub struct Fetcher {
    client: Client,
    base_url: String,
    cache: Arc<FileCache>,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(base_url: &str, cache: Arc<FileCache>, policy: RetryPolicy) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            cache,
            policy,
        }
    }

    pub fn url_for(&self, kind: ContentKind, date: NaiveDate) -> String {
        format!(
            "{}?date={}&encoding={}",
            self.base_url,
            date.format("%Y-%m-%d"),
            kind.encoding()
        )
    }

    /// Download the digest for `date`, retrying with a fixed delay. Never
    /// returns an error: exhaustion becomes a failed [`FetchResult`].
    pub async fn fetch(&self, kind: ContentKind, date: NaiveDate) -> FetchResult {
        let url = self.url_for(kind, date);
        let attempts = self.policy.attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            tracing::info!("Downloading {kind} news: {url}");
            match self.fetch_once(&url, kind, date).await {
                Ok(content) => return FetchResult::ok(content),
                Err(e) => {
                    tracing::warn!("News request failed (attempt {attempt}/{attempts}): {e}");
                    last_error = Some(e);
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.policy.delay).await;
            }
        }

        let error = last_error.unwrap_or_else(|| FetchError::Transport("no attempt made".into()));
        tracing::error!("News API unavailable after {attempts} attempts: {error}");
        FetchResult::failed(error)
    }

    async fn fetch_once(
        &self,
        url: &str,
        kind: ContentKind,
        date: NaiveDate,
    ) -> Result<Digest, FetchError> {
        let resp = self
            .client
            .get(url)
            .timeout(self.policy.timeout)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if resp.status() != StatusCode::OK {
            return Err(FetchError::BadStatus(resp.status().as_u16()));
        }

        let body = resp.bytes().await.map_err(|e| self.classify(e))?;
        let path = self
            .cache
            .write(date, kind, &body)
            .map_err(|e| FetchError::Storage(format!("{e:#}")))?;

        Ok(match kind {
            ContentKind::Text => Digest::Text(String::from_utf8_lossy(&body).into_owned()),
            ContentKind::Image => Digest::Image(path),
        })
    }

    fn classify(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.policy.timeout)
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}
