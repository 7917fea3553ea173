//! Background eviction of expired artifacts.
//!
//! One task per process. It wakes every `interval`, lists the store, and
//! deletes every entry older than `ttl`. Per-entry failures are logged and
//! left for the next cycle; nothing short of `shutdown()` stops the loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::artifacts::store::{ArtifactId, ArtifactStore, StoreError};

/// How long artifacts live and how often the sweeper looks for expired ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPolicy {
    pub ttl: Duration,
    pub interval: Duration,
}

impl SweepPolicy {
    pub fn new(ttl: Duration, interval: Duration) -> Result<Self> {
        if ttl.is_zero() || interval.is_zero() {
            bail!("artifact TTL and sweep interval must be non-zero");
        }
        if interval >= ttl {
            bail!(
                "sweep interval ({}s) must be shorter than artifact TTL ({}s)",
                interval.as_secs(),
                ttl.as_secs()
            );
        }
        Ok(Self { ttl, interval })
    }

    /// Sweeps three times per TTL window.
    pub fn from_ttl(ttl: Duration) -> Result<Self> {
        Self::new(ttl, ttl / 3)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepPhase {
    Idle,
    Sweeping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepStatus {
    pub phase: SweepPhase,
    pub cycles_completed: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub expired: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Handle to the running sweeper task.
pub struct Sweeper {
    shutdown_tx: watch::Sender<bool>,
    status_rx: watch::Receiver<SweepStatus>,
    join: JoinHandle<()>,
}

impl Sweeper {
    /// Starts the sweep loop. The first cycle runs immediately.
    pub fn spawn(store: Arc<ArtifactStore>, policy: SweepPolicy) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(SweepStatus {
            phase: SweepPhase::Idle,
            cycles_completed: 0,
        });

        let join = tokio::spawn(sweep_loop(store, policy, shutdown_rx, status_tx));

        info!(
            "Artifact sweeper started (ttl={}s, interval={}s)",
            policy.ttl.as_secs(),
            policy.interval.as_secs()
        );

        Self {
            shutdown_tx,
            status_rx,
            join,
        }
    }

    pub fn status(&self) -> SweepStatus {
        *self.status_rx.borrow()
    }

    #[cfg(test)]
    pub fn subscribe(&self) -> watch::Receiver<SweepStatus> {
        self.status_rx.clone()
    }

    /// Stops the loop after any in-progress cycle and waits for the task to exit.
    pub async fn shutdown(self) {
        // receiver may already be gone if the task panicked
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            warn!("Artifact sweeper task ended abnormally: {e}");
        }
        info!(
            "Artifact sweeper stopped after {} cycles",
            self.status_rx.borrow().cycles_completed
        );
    }
}

async fn sweep_loop(
    store: Arc<ArtifactStore>,
    policy: SweepPolicy,
    mut shutdown_rx: watch::Receiver<bool>,
    status_tx: watch::Sender<SweepStatus>,
) {
    let mut ticker = tokio::time::interval(policy.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        status_tx.send_modify(|s| s.phase = SweepPhase::Sweeping);
        let report = run_cycle(&store, policy.ttl, Utc::now()).await;
        status_tx.send_modify(|s| {
            s.phase = SweepPhase::Idle;
            s.cycles_completed += 1;
        });

        if report.deleted > 0 || report.failed > 0 {
            info!(
                "Sweep cycle: scanned={} expired={} deleted={} failed={}",
                report.scanned, report.expired, report.deleted, report.failed
            );
        } else {
            debug!("Sweep cycle: scanned={} nothing expired", report.scanned);
        }
    }
}

/// Runs one sweep over the store, treating `now` as the current time.
pub async fn run_cycle(store: &ArtifactStore, ttl: Duration, now: DateTime<Utc>) -> SweepReport {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);

    let listing = {
        let store = store.clone();
        tokio::task::spawn_blocking(move || scan_expired(&store, ttl, now)).await
    };

    let (mut report, expired) = match listing {
        Ok(Ok(listing)) => listing,
        Ok(Err(e)) => {
            warn!("Sweep could not list artifact store: {e}");
            return SweepReport {
                failed: 1,
                ..SweepReport::default()
            };
        }
        Err(e) => {
            warn!("Sweep listing task failed: {e}");
            return SweepReport {
                failed: 1,
                ..SweepReport::default()
            };
        }
    };

    for id in expired {
        match store.delete(id).await {
            Ok(()) => report.deleted += 1,
            Err(e) => {
                warn!("Failed to evict artifact {id}: {e}");
                report.failed += 1;
            }
        }
    }

    report
}

fn scan_expired(
    store: &ArtifactStore,
    ttl: chrono::Duration,
    now: DateTime<Utc>,
) -> Result<(SweepReport, Vec<ArtifactId>), StoreError> {
    let mut report = SweepReport::default();
    let mut expired = Vec::new();

    for entry in store.list_all()? {
        match entry {
            Ok(entry) => {
                report.scanned += 1;
                if entry.age(now) > ttl {
                    report.expired += 1;
                    expired.push(entry.id);
                }
            }
            Err(e) => {
                warn!("Skipping unreadable store entry: {e}");
                report.failed += 1;
            }
        }
    }

    Ok((report, expired))
}
