use std::path::PathBuf;
use std::str::FromStr;

use chrono::{Local, NaiveDateTime};

use crate::config::NewsConfig;
use crate::error::CommandError;
use crate::fetcher::Digest;
use crate::kind::ContentKind;
use crate::scheduler::delay_until_next;
use crate::service::NewsService;

const PREVIEW_CHARS: usize = 50;

/// The `news` command group a host binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Today's digest in the configured kind.
    News,
    Text,
    Image,
    Status,
    Clean,
    Push,
    UpdateNews,
}

impl Command {
    pub fn requires_admin(self) -> bool {
        matches!(
            self,
            Command::Status | Command::Clean | Command::Push | Command::UpdateNews
        )
    }
}

impl FromStr for Command {
    type Err = CommandError;

    /// Accepts `news text`, `text`, `/news text` and so on.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let mut first = words.next().map(|w| w.trim_start_matches('/'));
        if first == Some("news") {
            first = words.next();
        }
        let cmd = match first {
            None => Command::News,
            Some("text") => Command::Text,
            Some("image") => Command::Image,
            Some("status") => Command::Status,
            Some("clean") => Command::Clean,
            Some("push") => Command::Push,
            Some("update_news" | "update") => Command::UpdateNews,
            Some(other) => return Err(CommandError::Unknown(other.to_string())),
        };
        if let Some(extra) = words.next() {
            return Err(CommandError::Unknown(format!("{} {extra}", s.trim())));
        }
        Ok(cmd)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Image(PathBuf),
}

impl From<Digest> for Reply {
    fn from(d: Digest) -> Self {
        match d {
            Digest::Text(t) => Reply::Text(t),
            Digest::Image(p) => Reply::Image(p),
        }
    }
}

/// Run `cmd` on behalf of `sender`. Always yields a reply; failures become
/// reply text. Permission checks are the host's job.
pub async fn execute(service: &NewsService, cmd: Command, sender: &str) -> Reply {
    match cmd {
        Command::News => fetch(service, service.config().news_type).await,
        Command::Text => fetch(service, ContentKind::Text).await,
        Command::Image => fetch(service, ContentKind::Image).await,
        Command::Status => Reply::Text(status_report(service.config(), Local::now().naive_local())),
        Command::Clean => match service.clean() {
            Ok(removed) => {
                tracing::info!("{sender} cleaned {removed} expired news files");
                Reply::Text(format!(
                    "{sender}: expired news files (older than {} days) cleaned.",
                    service.config().save_days
                ))
            }
            Err(e) => {
                tracing::error!("News cleanup failed: {e}");
                Reply::Text(format!("{sender}: cleanup failed: {e}"))
            }
        },
        Command::Push => {
            let outcomes = service.push().await;
            let failed: Vec<&str> = outcomes
                .iter()
                .filter(|o| !o.delivered())
                .map(|o| o.target.as_str())
                .collect();
            let mut reply = format!(
                "{sender}: news pushed to {} targets ({} failed",
                outcomes.len(),
                failed.len()
            );
            if !failed.is_empty() {
                reply.push_str(&format!(": {}", failed.join(", ")));
            }
            reply.push_str(").");
            Reply::Text(reply)
        }
        Command::UpdateNews => {
            let mut text_preview = String::new();
            for (kind, result) in service.update_news().await {
                if kind == ContentKind::Text {
                    text_preview = result.content.preview(PREVIEW_CHARS);
                }
            }
            Reply::Text(format!(
                "{sender}: today's news files updated, text preview:\n{text_preview}..."
            ))
        }
    }
}

async fn fetch(service: &NewsService, kind: ContentKind) -> Reply {
    let result = service.resolve_today(kind).await;
    // A failed fetch carries its error text as the content.
    result.content.into()
}

pub fn status_report(config: &NewsConfig, now: NaiveDateTime) -> String {
    let secs = delay_until_next(now, config.push_time).as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    format!(
        "Daily 60s news is running\nPush time: {}\nDefault format: {}\nNext push in: {hours}h {minutes}m",
        config.push_time.format("%H:%M"),
        config.news_type,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FileCache;
    use crate::resolver::today;
    use crate::channels::testing::RecordingChannel;
    use crate::service::tests::{harness, harness_with, mock_api};
    use chrono::{NaiveDate, NaiveTime};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_commands() {
        assert_eq!("news".parse::<Command>(), Ok(Command::News));
        assert_eq!("".parse::<Command>(), Ok(Command::News));
        assert_eq!("news text".parse::<Command>(), Ok(Command::Text));
        assert_eq!("/news image".parse::<Command>(), Ok(Command::Image));
        assert_eq!("status".parse::<Command>(), Ok(Command::Status));
        assert_eq!("news update_news".parse::<Command>(), Ok(Command::UpdateNews));
        assert_eq!(
            "news weather".parse::<Command>(),
            Err(CommandError::Unknown("weather".into()))
        );
        assert!("news text now".parse::<Command>().is_err());
    }

    #[test]
    fn test_admin_commands() {
        assert!(!Command::News.requires_admin());
        assert!(!Command::Text.requires_admin());
        assert!(!Command::Image.requires_admin());
        assert!(Command::Status.requires_admin());
        assert!(Command::Clean.requires_admin());
        assert!(Command::Push.requires_admin());
        assert!(Command::UpdateNews.requires_admin());
    }

    #[test]
    fn test_status_report() {
        let config = NewsConfig {
            push_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            news_type: ContentKind::Image,
            ..NewsConfig::default()
        };
        let now = NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(6, 45, 10)
            .unwrap();
        let report = status_report(&config, now);
        assert!(report.contains("Push time: 09:00"));
        assert!(report.contains("Default format: image"));
        assert!(report.contains("Next push in: 2h 14m"));
    }

    #[tokio::test]
    async fn test_text_command_on_empty_cache_fetches_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("1. headline"))
            .expect(1)
            .mount(&server)
            .await;
        let h = harness(&server.uri(), |c| c.news_type = ContentKind::Text);

        let reply = execute(&h.service, "news text".parse().unwrap(), "alice").await;

        assert_eq!(reply, Reply::Text("1. headline".into()));
        let files: Vec<_> = std::fs::read_dir(h.dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        let again = execute(&h.service, Command::News, "alice").await;
        assert_eq!(again, reply);
    }

    #[tokio::test]
    async fn test_news_uses_configured_kind() {
        let server = mock_api().await;
        let h = harness(&server.uri(), |c| c.news_type = ContentKind::Image);

        let reply = execute(&h.service, Command::News, "bob").await;

        let cache = FileCache::new(h.dir.path()).unwrap();
        assert_eq!(reply, Reply::Image(cache.path_for(today(), ContentKind::Image)));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_a_reply() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let h = harness(&server.uri(), |_| {});

        match execute(&h.service, Command::Image, "bob").await {
            Reply::Text(msg) => assert!(msg.contains("500")),
            other => panic!("expected error text, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_clean_reports_config_error() {
        let h = harness("http://127.0.0.1:1", |c| c.save_days = -2);
        match execute(&h.service, Command::Clean, "admin").await {
            Reply::Text(msg) => {
                assert!(msg.starts_with("admin:"));
                assert!(msg.contains("save_days must be greater than 0"));
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_clean_reports_retention() {
        let h = harness("http://127.0.0.1:1", |c| c.save_days = 4);
        let reply = execute(&h.service, Command::Clean, "admin").await;
        assert_eq!(
            reply,
            Reply::Text("admin: expired news files (older than 4 days) cleaned.".into())
        );
    }

    #[tokio::test]
    async fn test_push_lists_failed_targets() {
        let server = mock_api().await;
        let mut channel = RecordingChannel::new("mock");
        channel.failing = vec!["g2".into()];
        let h = harness_with(&server.uri(), channel, |c| {
            c.groups = vec!["g1".into(), "g2".into(), "g3".into()];
        });

        let reply = execute(&h.service, Command::Push, "admin").await;

        assert_eq!(
            reply,
            Reply::Text("admin: news pushed to 3 targets (1 failed: g2).".into())
        );
        assert_eq!(h.channel.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_push_and_update_replies() {
        let server = mock_api().await;
        let h = harness(&server.uri(), |_| {});

        let update = execute(&h.service, Command::UpdateNews, "admin").await;
        assert_eq!(
            update,
            Reply::Text("admin: today's news files updated, text preview:\ntoday's digest...".into())
        );

        let push = execute(&h.service, Command::Push, "admin").await;
        assert_eq!(
            push,
            Reply::Text("admin: news pushed to 2 targets (0 failed).".into())
        );
        assert_eq!(h.channel.sent().len(), 2);
    }
}
