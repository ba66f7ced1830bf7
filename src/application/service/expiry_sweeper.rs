use super::GroupService;
use crate::domain::repository::WorldRepository;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

/// Periodically commits and clears expired banks until `shutdown_rx`
/// flips to `true` or its sender is dropped.
///
/// The first sweep runs immediately.
pub async fn run_expiry_sweeper<R>(
    service: Arc<GroupService<R>>,
    every: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    R: WorldRepository + 'static,
{
    tracing::info!("Bank expiry sweeper started (interval {:?})", every);
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let service = Arc::clone(&service);
                match tokio::task::spawn_blocking(move || service.sweep_expired_banks()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => tracing::warn!("Bank expiry sweep failed: {}", e),
                    Err(e) => tracing::error!("Bank expiry sweep panicked: {}", e),
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Bank expiry sweeper shutting down");
                    return;
                }
            }
        }
    }
}
