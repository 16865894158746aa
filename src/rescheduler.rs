// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! The re-scheduler (§4.5) — a single long-lived task that, every 5
//! seconds, re-publishes every order whose `repeat_at` has elapsed.
//!
//! Both this task and order intake may enqueue the same order; `SetStatus`
//! idempotence absorbs the duplicate, so no in-queue deduplication is
//! attempted here (§9).

use crate::error::StorageError;
use crate::queue::{CheckTask, TaskQueue};
use crate::storage::Storage;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const TICK: Duration = Duration::from_secs(5);

pub async fn run(
    storage: Arc<dyn Storage>,
    queue: Arc<dyn TaskQueue>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(TICK);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("re-scheduler cancelled, exiting cleanly");
                return Ok(());
            }
            _ = ticker.tick() => {
                let due = match storage.orders_for_check(&cancel).await {
                    Ok(orders) => orders,
                    Err(StorageError::Cancelled) => return Ok(()),
                    Err(err) => return Err(err.into()),
                };
                for order in due {
                    let code = order.code.clone();
                    if let Err(err) = queue.publish(CheckTask::from(order)).await {
                        warn!(code, error = %err, "failed to re-enqueue order; it will be retried next tick");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewOrder;
    use crate::queue::InProcessQueue;
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn republishes_orders_whose_repeat_at_has_elapsed() {
        let storage = Arc::new(MemoryStorage::new());
        let queue: Arc<InProcessQueue> = Arc::new(InProcessQueue::new());
        let cancel = CancellationToken::new();

        // A freshly-put order's repeat_at is `now()`; a moment later it
        // reads as elapsed, exactly the condition OrdersForCheck selects on.
        storage
            .put_order(
                NewOrder {
                    code: "12345674".into(),
                    user_id: 1,
                },
                &cancel,
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let due = storage.orders_for_check(&cancel).await.unwrap();
        assert_eq!(due.len(), 1);
        for order in due {
            queue.publish(CheckTask::from(order)).await.unwrap();
        }

        let task = queue.consume().await.unwrap();
        assert_eq!(task.order.code, "12345674");
    }
}
