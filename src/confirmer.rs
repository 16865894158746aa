// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! The withdrawal confirmer (§4.6) — a single long-lived task that, every
//! second, drains PENDING withdrawals and settles them. In production this
//! would call a payment provider; here the storage call itself stands in
//! for that confirmation (spec.md §4.6).
//!
//! `AddWithdraw` already debited the balance when the withdrawal was
//! created, so a settlement failure never needs to roll anything back —
//! settlement only flips the status flag.

use crate::error::StorageError;
use crate::storage::Storage;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const TICK: Duration = Duration::from_secs(1);

pub async fn run(storage: Arc<dyn Storage>, cancel: CancellationToken) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(TICK);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("withdrawal confirmer cancelled, exiting cleanly");
                return Ok(());
            }
            _ = ticker.tick() => {
                let pending = match storage.active_withdrawals(&cancel).await {
                    Ok(withdrawals) => withdrawals,
                    Err(StorageError::Cancelled) => return Ok(()),
                    Err(err) => return Err(err.into()),
                };
                for withdrawal in pending {
                    match storage
                        .withdraw(withdrawal.user_id, &withdrawal.order_code, &cancel)
                        .await
                    {
                        Ok(()) => {}
                        Err(StorageError::Cancelled) => return Ok(()),
                        Err(StorageError::NotFound) => {
                            // Already settled by a concurrent tick; harmless.
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
            }
        }
    }
}
