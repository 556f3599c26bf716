use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime, NaiveTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::service::NewsService;

/// Pauses after a cycle before the next fire time is computed.
#[derive(Debug, Clone)]
pub struct Timings {
    /// After a successful cycle; keeps a fast cycle from firing twice in the same minute.
    pub settle: Duration,
    /// After a failed cycle.
    pub recovery: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(60),
            recovery: Duration::from_secs(300),
        }
    }
}

/// Next occurrence of `at` strictly after `now`.
pub fn next_fire(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let candidate = now.date().and_time(at);
    if candidate <= now {
        candidate + chrono::Duration::days(1)
    } else {
        candidate
    }
}

pub fn delay_until_next(now: NaiveDateTime, at: NaiveTime) -> Duration {
    (next_fire(now, at) - now).to_std().unwrap_or_default()
}

/// Daily push loop: sleep until the push time, run one cycle, repeat.
pub struct Scheduler {
    service: Arc<NewsService>,
    push_time: NaiveTime,
    timings: Timings,
}

/// Owns the running scheduler task.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the loop. A sleeping loop exits at once; a running cycle is
    /// allowed to finish first.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::error!("News scheduler task ended abnormally: {e}");
        }
    }
}

impl Scheduler {
    pub fn new(service: Arc<NewsService>, push_time: NaiveTime) -> Self {
        Self::with_timings(service, push_time, Timings::default())
    }

    pub fn with_timings(service: Arc<NewsService>, push_time: NaiveTime, timings: Timings) -> Self {
        Self {
            service,
            push_time,
            timings,
        }
    }

    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        SchedulerHandle { shutdown_tx, task }
    }

    /// Runs until `shutdown` becomes `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "News scheduler started, daily push at {}",
            self.push_time.format("%H:%M")
        );

        loop {
            // Recomputed every iteration so clock changes and slow cycles cannot drift.
            let delay = delay_until_next(Local::now().naive_local(), self.push_time);
            tracing::info!(
                "Next news push in {:.2} hours",
                delay.as_secs_f64() / 3600.0
            );
            if !sleep_or_shutdown(delay, &mut shutdown).await {
                break;
            }

            let pause = match self.service.run_cycle().await {
                Ok(report) => {
                    let failed = report.outcomes.iter().filter(|o| !o.delivered()).count();
                    let refreshed: Vec<String> = report
                        .refreshed
                        .iter()
                        .map(|(kind, ok)| format!("{kind}={}", if *ok { "ok" } else { "failed" }))
                        .collect();
                    tracing::info!(
                        "Scheduled news cycle done: refreshed [{}], {} swept, {} targets, {failed} failed",
                        refreshed.join(", "),
                        report.swept,
                        report.outcomes.len()
                    );
                    self.timings.settle
                }
                Err(e) => {
                    tracing::error!("Scheduled news cycle failed: {e:#}");
                    self.timings.recovery
                }
            };
            if !sleep_or_shutdown(pause, &mut shutdown).await {
                break;
            }
        }

        tracing::info!("News scheduler stopped");
    }
}

/// Returns `false` when shutdown was requested before `delay` elapsed.
async fn sleep_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return false;
    }
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return false;
                }
            }
        }
    }
}
