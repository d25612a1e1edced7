use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::store::SweepStore;
use crate::sweep;

/// Sweeps on a fixed cadence until `shutdown` resolves. The first sweep runs
/// immediately; a sweep always finishes before the next tick is awaited.
pub async fn run_every<S, F>(store: &S, period: Duration, shutdown: F)
where
    S: SweepStore + ?Sized,
    F: Future<Output = ()>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    info!(interval_secs = period.as_secs(), "SLA sweep scheduler started");

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => sweep::run_sla_sweep(store, Utc::now()).await,
        }
    }

    info!("SLA sweep scheduler stopped");
}
