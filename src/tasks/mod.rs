//! Background tasks: the order lifecycle tick and the mirror's realtime sync.
//! Call `spawn_all` once during startup.

use crate::services::{OrderService, SyncService};

/// Spawn all background tasks. Detaches them via `tokio::spawn`; does not block.
pub fn spawn_all(order_service: OrderService, sync_service: SyncService) {
    // lifecycle tick; one sweep at a time, the next starts after the sleep
    {
        let svc = order_service.clone();
        let interval = svc.engine().tick_interval();
        tokio::spawn(async move {
            loop {
                let sweep = svc.check_order_transitions().await;
                if sweep.changed_anything() {
                    log::info!(
                        "Order sweep: checked={} advanced={} stopped={} progress_saved={} failed={}",
                        sweep.checked,
                        sweep.advanced,
                        sweep.stopped,
                        sweep.progress_persisted,
                        sweep.failed
                    );
                }
                tokio::time::sleep(interval).await;
            }
        });
    }

    // store change feed into the mirror
    {
        let svc = sync_service.clone();
        tokio::spawn(async move {
            svc.run_realtime().await;
        });
    }
}
