//! Periodic alert sweep.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::services::SupplyDesk;

#[derive(Debug, Clone)]
pub struct SweepJobConfig {
    pub interval: Duration,
    /// Also run the low-stock check (admins and GSO staff) on each tick.
    pub check_low_stock: bool,
}

impl Default for SweepJobConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            check_low_stock: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepStats {
    pub runs: u64,
    pub failures: u64,
    pub notifications_delivered: u64,
}

/// Handle to a running sweep task.
#[derive(Debug)]
pub struct SweepJobHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
    stats: Arc<Mutex<SweepStats>>,
}

impl SweepJobHandle {
    /// Stop after the current run and wait for the task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }

    pub fn stats(&self) -> SweepStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

pub struct SweepJob;

impl SweepJob {
    /// Spawn the sweep loop. The first run happens immediately.
    pub fn spawn(desk: Arc<SupplyDesk>, config: SweepJobConfig) -> SweepJobHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let stats = Arc::new(Mutex::new(SweepStats::default()));
        let task_stats = stats.clone();

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(interval_secs = config.interval.as_secs(), "alert sweep started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let outcome = run_once(&desk, config.check_low_stock).await;
                        let mut s = task_stats.lock().unwrap_or_else(|e| e.into_inner());
                        s.runs += 1;
                        match outcome {
                            Ok(delivered) => s.notifications_delivered += delivered as u64,
                            Err(()) => s.failures += 1,
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("alert sweep stopped");
        });

        SweepJobHandle {
            shutdown: shutdown_tx,
            join,
            stats,
        }
    }
}

/// One sweep pass. Failures are logged, not propagated.
async fn run_once(desk: &SupplyDesk, check_low_stock: bool) -> Result<usize, ()> {
    let today = Utc::now().date_naive();
    let mut delivered = match desk.sweep_overdue(today).await {
        Ok(report) => report.delivered,
        Err(e) => {
            error!(error = %e, "overdue sweep failed");
            return Err(());
        }
    };
    if check_low_stock {
        match desk.check_low_stock(true, true).await {
            Ok(report) => delivered += report.delivered,
            Err(e) => {
                error!(error = %e, "low stock check failed");
                return Err(());
            }
        }
    }
    Ok(delivered)
}
