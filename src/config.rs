use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::path::PathBuf;

use crate::kind::ContentKind;

pub const DEFAULT_NEWS_API: &str = "https://60s-api.viki.moe/v2/60s";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub news: NewsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewsConfig {
    #[serde(default)]
    pub news_type: ContentKind,
    /// Push targets, delivered in this order.
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default = "default_push_time", deserialize_with = "de_push_time")]
    pub push_time: NaiveTime,
    /// Kept signed so a bad value surfaces as an error at sweep time instead of a parse failure.
    #[serde(default = "default_save_days")]
    pub save_days: i64,
    /// Base URL override. Empty means the built-in API.
    pub news_api: Option<String>,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            news_type: ContentKind::default(),
            groups: Vec::new(),
            push_time: default_push_time(),
            save_days: default_save_days(),
            news_api: None,
        }
    }
}

impl NewsConfig {
    pub fn api_base(&self) -> &str {
        match self.news_api.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url,
            _ => DEFAULT_NEWS_API,
        }
    }
}

fn default_push_time() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default()
}

fn default_save_days() -> i64 {
    3
}

pub fn parse_push_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .with_context(|| format!("Invalid push_time '{s}', expected HH:MM"))
}

fn de_push_time<'de, D>(deserializer: D) -> std::result::Result<NaiveTime, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_push_time(&raw).map_err(|e| serde::de::Error::custom(format!("{e:#}")))
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

fn default_base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".daily60s")
}

fn default_cache_dir() -> PathBuf {
    default_base_dir().join("news")
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_api_bind")]
    pub bind: String,
    /// Bearer token required for admin commands.
    pub api_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: default_api_bind(),
            api_key: None,
        }
    }
}

fn default_api_bind() -> String {
    "127.0.0.1:3060".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelsConfig {
    pub webhook: Option<WebhookConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    pub enabled: bool,
    pub url: String,
    pub token: Option<String>,
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
}

fn default_webhook_timeout() -> u64 {
    10
}

pub fn load(path: &str) -> Result<Config> {
    let path = expand_tilde(path);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let config = parse(&content)?;
    if config.news.save_days <= 0 {
        tracing::warn!(
            "save_days = {} is not positive; cache cleanup will fail until it is fixed",
            config.news.save_days
        );
    }
    Ok(config)
}

pub fn parse(content: &str) -> Result<Config> {
    let mut config: Config =
        toml::from_str(content).with_context(|| "Failed to parse config.toml")?;
    config.cache.dir = expand_tilde(&config.cache.dir.to_string_lossy());
    // Blank keys count as unset.
    config.api.api_key = config.api.api_key.take().filter(|k| !k.trim().is_empty());
    Ok(config)
}

pub async fn init_config_dir() -> Result<PathBuf> {
    let base = default_base_dir();
    tokio::fs::create_dir_all(default_cache_dir()).await?;

    let config_path = base.join("config.toml");
    if !config_path.exists() {
        tokio::fs::write(
            &config_path,
            r#"[news]
# "text" or "image"
news_type = "text"
# Push targets in delivery order. Prefix with a channel name ("webhook:ops")
# to route through that channel; bare names go to the log channel.
groups = []
push_time = "08:00"
save_days = 3
# news_api = "https://60s-api.viki.moe/v2/60s"  # optional, uses the built-in API

[cache]
# dir = "~/.daily60s/news"

[api]
enabled = false
bind = "127.0.0.1:3060"
# api_key = "YOUR_ADMIN_TOKEN"  # required for admin commands and non-local binds

# [channels.webhook]
# enabled = true
# url = "https://bot.example.com/send"
# token = "YOUR_WEBHOOK_TOKEN"
"#,
        )
        .await?;
    }

    Ok(config_path)
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_tables_missing() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.news.news_type, ContentKind::Text);
        assert!(cfg.news.groups.is_empty());
        assert_eq!(cfg.news.push_time, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(cfg.news.save_days, 3);
        assert_eq!(cfg.news.api_base(), DEFAULT_NEWS_API);
        assert!(!cfg.api.enabled);
        assert!(cfg.channels.webhook.is_none());
    }

    #[test]
    fn test_full_news_table() {
        let cfg = parse(
            r#"
[news]
news_type = "image"
groups = ["webhook:a", "b"]
push_time = "09:30"
save_days = 7
news_api = "http://localhost:9000/60s"
"#,
        )
        .unwrap();
        assert_eq!(cfg.news.news_type, ContentKind::Image);
        assert_eq!(cfg.news.groups, vec!["webhook:a", "b"]);
        assert_eq!(cfg.news.push_time, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(cfg.news.save_days, 7);
        assert_eq!(cfg.news.api_base(), "http://localhost:9000/60s");
    }

    #[test]
    fn test_empty_news_api_falls_back_to_default() {
        let cfg = parse("[news]\nnews_api = \"  \"\n").unwrap();
        assert_eq!(cfg.news.api_base(), DEFAULT_NEWS_API);
    }

    #[test]
    fn test_invalid_push_time_rejected() {
        assert!(parse("[news]\npush_time = \"25:00\"\n").is_err());
        assert!(parse("[news]\npush_time = \"nine\"\n").is_err());
    }

    #[test]
    fn test_non_positive_save_days_is_accepted_at_load() {
        let cfg = parse("[news]\nsave_days = 0\n").unwrap();
        assert_eq!(cfg.news.save_days, 0);
    }

    #[test]
    fn test_blank_api_key_is_unset() {
        let cfg = parse("[api]\nenabled = true\nbind = \"0.0.0.0:3060\"\napi_key = \"  \"\n").unwrap();
        assert!(cfg.api.api_key.is_none());

        let cfg = parse("[api]\napi_key = \"secret\"\n").unwrap();
        assert_eq!(cfg.api.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_unknown_news_type_rejected() {
        assert!(parse("[news]\nnews_type = \"video\"\n").is_err());
    }
}
