use std::time::Duration;

use log::*;
use tokio::time::MissedTickBehavior;

use crate::{
    sync_api::{FulfillmentSyncApi, PollSummary},
    traits::{FulfillmentProvider, SyncBackend},
};

/// Polls Infortisa for every pending order on the API's configured interval. This future never completes, so run it
/// on its own task (or with `select!` against a shutdown signal).
pub async fn run_poll_worker<P, B>(api: &FulfillmentSyncApi<P, B>)
where
    P: FulfillmentProvider,
    B: SyncBackend,
{
    run_poll_worker_every(api, api.config().poll_interval).await
}

pub async fn run_poll_worker_every<P, B>(api: &FulfillmentSyncApi<P, B>, period: Duration)
where
    P: FulfillmentProvider,
    B: SyncBackend,
{
    let mut timer = tokio::time::interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("🕰️ Infortisa poll worker started. Polling every {}s", period.as_secs());
    loop {
        timer.tick().await;
        run_poll_cycle(api).await;
    }
}

/// Runs a single polling pass. Errors are logged, never returned.
pub async fn run_poll_cycle<P, B>(api: &FulfillmentSyncApi<P, B>) -> Option<PollSummary>
where
    P: FulfillmentProvider,
    B: SyncBackend,
{
    info!("🕰️ Running Infortisa status poll");
    match api.poll_all().await {
        Ok(summary) => {
            info!("🕰️ {} orders polled. {} failed", summary.total(), summary.failures.len());
            debug!("🕰️ Failed orders: {}", failure_list(&summary));
            Some(summary)
        },
        Err(e) => {
            error!("🕰️ Error running the Infortisa status poll: {e}");
            None
        },
    }
}

fn failure_list(summary: &PollSummary) -> String {
    summary.failures.iter().map(|(id, e)| format!("[{id}] {e}")).collect::<Vec<String>>().join(", ")
}
