//! Background expiry sweep

use std::sync::Arc;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::relay::Relay;

/// Sweep expired signals every `sweep_interval` until `shutdown` is cancelled.
///
/// Returns immediately when expiry is disabled. Each sweep is one bulk delete
/// on a blocking thread, so request handling only waits for that statement.
pub async fn run_sweeper(relay: Arc<Relay>, shutdown: CancellationToken) {
    let Some(expiry) = relay.policy().expiry else {
        log::debug!("expiry disabled, sweeper not started");
        return;
    };
    if expiry.sweep_interval.is_zero() {
        log::warn!("sweep interval is zero, sweeper not started");
        return;
    }

    log::info!(
        "sweeping signals older than {:?} every {:?}",
        expiry.ttl,
        expiry.sweep_interval
    );
    let mut ticker = tokio::time::interval(expiry.sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick fires immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let relay = Arc::clone(&relay);
        match tokio::task::spawn_blocking(move || relay.sweep_at(Utc::now())).await {
            Ok(Ok(0)) => log::debug!("sweep: nothing expired"),
            Ok(Ok(n)) => log::info!("sweep: removed {n} expired signal(s)"),
            Ok(Err(e)) => log::error!("sweep failed: {e}"),
            Err(e) => log::error!("sweep task panicked: {e}"),
        }
    }
    log::debug!("sweeper stopped");
}
