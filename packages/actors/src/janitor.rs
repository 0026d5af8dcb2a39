//! Periodic stuck-job release and retention purge.

use std::time::Duration;

use chrono::Utc;
use db::repositories::JobQueue;
use dispatch_core::JobEvent;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::sync::broadcast;

use crate::messages::{JanitorMessage, MIN_TICK, SweepReport, bounded};

/// Janitor schedule and thresholds.
#[derive(Debug, Clone)]
pub struct JanitorConfig {
    /// Time between sweeps.
    pub interval: Duration,
    /// Claims older than this are released back to pending.
    pub stuck_after: Duration,
    /// Completed and failed jobs older than this are deleted.
    pub retention: Duration,
    /// Upper bound for each sweep step.
    pub sweep_timeout: Duration,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            stuck_after: Duration::from_secs(30 * 60),
            retention: Duration::from_secs(7 * 24 * 60 * 60),
            sweep_timeout: Duration::from_secs(30),
        }
    }
}

impl JanitorConfig {
    /// Intervals below one millisecond are raised to it.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_TICK);
        self
    }

    pub fn with_stuck_after(mut self, stuck_after: Duration) -> Self {
        self.stuck_after = stuck_after;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_sweep_timeout(mut self, timeout: Duration) -> Self {
        self.sweep_timeout = timeout;
        self
    }
}

pub struct JanitorState {
    config: JanitorConfig,
    queue: JobQueue,
    event_tx: Option<broadcast::Sender<JobEvent>>,
}

impl JanitorState {
    /// Release stuck claims, then purge old jobs. A failing step is logged
    /// and does not prevent the other.
    async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let limit = self.config.sweep_timeout;

        match bounded(
            limit,
            "release stuck jobs",
            self.queue.release_stuck(self.config.stuck_after),
        )
        .await
        {
            Ok(count) => {
                report.released = count;
                if count > 0 {
                    self.emit(JobEvent::StuckReleased {
                        count,
                        timestamp: Utc::now(),
                    });
                }
            }
            Err(e) => {
                tracing::warn!("Stuck job release failed: {}", e);
                report.errors.push(e.to_string());
            }
        }

        match bounded(limit, "purge old jobs", self.queue.purge(self.config.retention)).await {
            Ok(count) => {
                report.purged = count;
                if count > 0 {
                    self.emit(JobEvent::Purged {
                        count,
                        timestamp: Utc::now(),
                    });
                }
            }
            Err(e) => {
                tracing::warn!("Job purge failed: {}", e);
                report.errors.push(e.to_string());
            }
        }

        tracing::debug!(
            released = report.released,
            purged = report.purged,
            "Janitor sweep finished"
        );
        report
    }

    fn emit(&self, event: JobEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }
}

pub struct JanitorArgs {
    pub config: JanitorConfig,
    pub event_tx: Option<broadcast::Sender<JobEvent>>,
}

/// Actor that keeps the job table healthy.
pub struct Janitor;

impl Actor for Janitor {
    type Msg = JanitorMessage;
    type State = JanitorState;
    type Arguments = JanitorArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            "Starting janitor (every {:?}, stuck after {:?}, retention {:?})",
            args.config.interval,
            args.config.stuck_after,
            args.config.retention
        );

        let interval = args.config.interval.max(MIN_TICK);
        let myself_clone = myself.clone();
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if myself_clone.send_message(JanitorMessage::Sweep).is_err() {
                    break;
                }
            }
        });

        Ok(JanitorState {
            config: args.config,
            queue: JobQueue::new(),
            event_tx: args.event_tx,
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            JanitorMessage::Sweep => {
                state.sweep().await;
            }

            JanitorMessage::SweepNow { reply } => {
                let _ = reply.send(state.sweep().await);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[test]
    fn zero_sweep_interval_is_raised() {
        let config = JanitorConfig::default().with_interval(Duration::ZERO);
        assert_eq!(config.interval, MIN_TICK);
        assert_eq!(
            JanitorConfig::default().with_interval(Duration::from_secs(5)).interval,
            Duration::from_secs(5)
        );
    }
}
