mod api;
mod cache;
mod channels;
mod commands;
mod config;
mod distributor;
mod error;
mod fetcher;
mod kind;
mod resolver;
mod scheduler;
mod service;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::signal;

use channels::ChannelManager;
use commands::{Command, Reply};
use kind::ContentKind;
use service::NewsService;

#[derive(Parser)]
#[command(
    name = "daily60s",
    version,
    about = "Fetches the daily 60-second news digest and pushes it on schedule"
)]
struct Cli {
    #[arg(short, long, env = "DAILY60S_CONFIG", default_value = "~/.daily60s/config.toml")]
    config: String,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler (and the command API if enabled)
    Run,
    /// Create ~/.daily60s with a default config
    Init,
    /// Print today's news
    News {
        /// text or image (defaults to news_type)
        kind: Option<ContentKind>,
    },
    /// Show push time and time until the next push
    Status,
    /// Delete expired news files
    Clean,
    /// Push today's news to every configured target now
    Push,
    /// Re-download today's text and image news
    Update,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let command = match cli.command.unwrap_or(Commands::Run) {
        Commands::Init => {
            let path = config::init_config_dir().await?;
            tracing::info!("Initialized {}", path.display());
            return Ok(());
        }
        Commands::Run => return run(&cli.config).await,
        Commands::News { kind: None } => Command::News,
        Commands::News {
            kind: Some(ContentKind::Text),
        } => Command::Text,
        Commands::News {
            kind: Some(ContentKind::Image),
        } => Command::Image,
        Commands::Status => Command::Status,
        Commands::Clean => Command::Clean,
        Commands::Push => Command::Push,
        Commands::Update => Command::UpdateNews,
    };

    // The local operator is trusted with admin commands.
    let service = build_service(&config::load(&cli.config)?)?;
    match commands::execute(&service, command, "cli").await {
        Reply::Text(text) => println!("{text}"),
        Reply::Image(path) => println!("{}", path.display()),
    }
    Ok(())
}

fn build_service(cfg: &config::Config) -> Result<NewsService> {
    let channels = ChannelManager::from_config(&cfg.channels)?;
    NewsService::new(cfg.news.clone(), cfg.cache.dir.clone(), channels)
}

async fn run(config_path: &str) -> Result<()> {
    let cfg = config::load(config_path)?;
    let service = Arc::new(build_service(&cfg)?);
    tracing::info!(
        "Daily news: {} at {} to {} targets, cache {}",
        cfg.news.news_type,
        cfg.news.push_time.format("%H:%M"),
        cfg.news.groups.len(),
        cfg.cache.dir.display()
    );

    let scheduler = scheduler::Scheduler::new(service.clone(), cfg.news.push_time).spawn();

    if cfg.api.enabled {
        if cfg.api.api_key.is_none() {
            if is_localhost(&cfg.api.bind) {
                tracing::warn!("API authentication disabled (localhost-only)");
            } else {
                scheduler.shutdown().await;
                anyhow::bail!(
                    "API authentication required for non-localhost binding '{}'. Set [api] api_key.",
                    cfg.api.bind
                );
            }
        }

        let state = api::AppState {
            service: service.clone(),
            api_key: cfg.api.api_key.clone(),
        };
        let listener = tokio::net::TcpListener::bind(&cfg.api.bind).await?;
        tracing::info!("Command API listening on {}", cfg.api.bind);

        let served = axum::serve(listener, api::router(state))
            .with_graceful_shutdown(async {
                signal::ctrl_c().await.ok();
            })
            .await;
        scheduler.shutdown().await;
        served?;
    } else {
        signal::ctrl_c().await?;
        scheduler.shutdown().await;
    }

    tracing::info!("Daily news stopped");
    Ok(())
}

fn is_localhost(bind: &str) -> bool {
    use std::net::IpAddr;

    let host = if let Some(inner) = bind.strip_prefix('[')
        && let Some(bracket_end) = inner.find(']')
    {
        &inner[..bracket_end]
    } else if let Some(colon) = bind.rfind(':') {
        &bind[..colon]
    } else {
        bind
    };

    if host == "localhost" {
        return true;
    }
    host.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_localhost_loopback() {
        assert!(is_localhost("127.0.0.1:3060"));
        assert!(is_localhost("127.0.1.1:8080"));
        assert!(is_localhost("127.255.255.255:3060"));
        assert!(is_localhost("localhost:3060"));
        assert!(is_localhost("[::1]:3060"));
    }

    #[test]
    fn test_is_localhost_rejects_non_local() {
        assert!(!is_localhost("0.0.0.0:3060"));
        assert!(!is_localhost("192.168.1.1:3060"));
        assert!(!is_localhost("example.com:3060"));
        assert!(!is_localhost("localhost.evil.com:3060"));
        assert!(!is_localhost("127.evil.com:3060"));
        assert!(!is_localhost("127.0.0.evil:3060"));
        assert!(!is_localhost("127.0.0.1.1:3060"));
    }

    #[test]
    fn test_is_localhost_malformed_no_panic() {
        assert!(!is_localhost("]"));
        assert!(!is_localhost("[]"));
        assert!(!is_localhost("["));
        assert!(!is_localhost(""));
        assert!(!is_localhost(":"));
        assert!(!is_localhost("[]:3060"));
    }

    #[test]
    fn test_cli_parses_news_kind() {
        let cli = Cli::try_parse_from(["daily60s", "news", "image"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::News {
                kind: Some(ContentKind::Image)
            })
        ));
        assert!(Cli::try_parse_from(["daily60s", "news", "video"]).is_err());
    }
}
