// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! The worker pool (§4.4) — `W = number of CPUs` workers draining the
//! task queue, executing the check routine, and obeying a global pause
//! directive broadcast by any worker that observes `RateLimited`.

mod check;
mod pause;

pub use check::{run_check, CheckEffect};
pub use pause::{PauseBroadcaster, PauseSubscriber};

use crate::loyalty::LoyaltyClient;
use crate::queue::TaskQueue;
use crate::storage::Storage;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct WorkerPool {
    count: usize,
}

impl WorkerPool {
    pub fn new(count: usize) -> Self {
        Self { count: count.max(1) }
    }

    /// Runs until cancellation or until a worker's check routine returns an
    /// error — at which point every other worker is cancelled too and the
    /// error propagates to the caller (§4.4 "on any error returned, the
    /// worker exits and its error propagates, collapsing the whole pool").
    pub async fn run(
        &self,
        queue: Arc<dyn TaskQueue>,
        storage: Arc<dyn Storage>,
        loyalty: Arc<LoyaltyClient>,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        let (broadcaster, _primary) = PauseBroadcaster::new();
        let mut set = JoinSet::new();

        for id in 0..self.count {
            let queue = queue.clone();
            let storage = storage.clone();
            let loyalty = loyalty.clone();
            let worker_cancel = cancel.clone();
            let pause = broadcaster.subscribe();
            let broadcaster = broadcaster.clone();
            set.spawn(async move {
                run_worker(id, queue, storage, loyalty, pause, broadcaster, worker_cancel).await
            });
        }

        let mut outcome = Ok(());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(error = %err, "worker pool collapsing: a worker returned an error");
                    outcome = Err(err);
                    cancel.cancel();
                }
                Err(join_err) => {
                    error!(error = %join_err, "worker task panicked");
                    outcome = Err(join_err.into());
                    cancel.cancel();
                }
            }
        }
        outcome
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_worker(
    id: usize,
    queue: Arc<dyn TaskQueue>,
    storage: Arc<dyn Storage>,
    loyalty: Arc<LoyaltyClient>,
    mut pause: PauseSubscriber,
    broadcaster: PauseBroadcaster,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(worker = id, "worker cancelled, exiting cleanly");
                return Ok(());
            }
            sec = pause.next_pause() => {
                warn!(worker = id, seconds = sec, "pausing on rate-limit back-pressure");
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(sec)) => {}
                    _ = cancel.cancelled() => return Ok(()),
                }
            }
            task = queue.consume() => {
                let task = task?;
                let outcome = loyalty.check(&task.order.code).await;
                match run_check(storage.as_ref(), &task.order, outcome, &cancel).await {
                    Ok(CheckEffect::BroadcastPause(sec)) => broadcaster.broadcast(sec),
                    Ok(CheckEffect::None) => {}
                    Err(err) => return Err(err.into()),
                }
            }
        }
    }
}
