//! Coalesced progress publishing.
//!
//! Each job gets exactly one writer task fed through a watch channel. Bursts
//! of updates (twelve modules finishing close together) collapse into at most
//! one persistence write per second; the final value is always flushed before
//! the publisher resolves, so the job's terminal-state write stays last.

use sqlx::SqlitePool;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::repository::JobRepository;

/// Phase boundaries of the fixed progress mapping.
pub mod phase {
    pub const ACCEPTED: i64 = 2;
    pub const CRAWLING: i64 = 5;
    pub const CRAWLED: i64 = 10;
    pub const CHECKS_DONE: i64 = 20;
    pub const MODULES_DONE: i64 = 85;
    pub const REDUCING: i64 = 88;
    pub const PERSISTING: i64 = 95;

    /// Module band: 20..=85, each of the twelve modules adds its share.
    pub fn modules(done: usize, total: usize) -> i64 {
        if total == 0 {
            return MODULES_DONE;
        }
        CHECKS_DONE + ((MODULES_DONE - CHECKS_DONE) * done as i64) / total as i64
    }
}

#[derive(Debug, Clone, Default)]
struct ProgressState {
    percent: i64,
    message: Option<String>,
}

/// Single writer for one job's progress updates.
pub struct ProgressPublisher {
    tx: watch::Sender<ProgressState>,
    worker: JoinHandle<()>,
}

impl ProgressPublisher {
    const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

    pub fn spawn(pool: SqlitePool, job_id: String) -> Self {
        let (tx, mut rx) = watch::channel(ProgressState::default());
        let repo = JobRepository::new(pool);

        let worker = tokio::spawn(async move {
            let mut last_written = -1;
            loop {
                let closed = rx.changed().await.is_err();

                let state = rx.borrow_and_update().clone();
                if state.percent > last_written {
                    last_written = state.percent;
                    if let Err(e) = repo
                        .mark_progress(&job_id, state.percent, state.message.as_deref())
                        .await
                    {
                        log::debug!("progress write skipped for {}: {}", job_id, e);
                    }
                }

                if closed {
                    break;
                }
                tokio::time::sleep(Self::FLUSH_INTERVAL).await;
            }
        });

        Self { tx, worker }
    }

    /// Record a progress value. Never blocks; regressions are ignored so the
    /// published percent is monotonic even if callers race.
    pub fn publish(&self, percent: i64, message: Option<&str>) {
        self.tx.send_modify(|state| {
            if percent > state.percent {
                state.percent = percent;
                state.message = message.map(str::to_string);
            }
        });
    }

    /// Flush the final value and stop the writer. Must be awaited before the
    /// terminal status write.
    pub async fn finish(self) {
        drop(self.tx);
        let _ = self.worker.await;
    }
}
