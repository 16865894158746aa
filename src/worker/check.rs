// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! The check routine (§4.4.1) — the heart of the pipeline. Maps a single
//! loyalty outcome to a `SetStatus`/`AddPoints` call and an optional
//! pause broadcast.

use crate::domain::{CheckStatus, Order};
use crate::loyalty::Outcome;
use crate::storage::{Storage, StorageResult};
use tokio_util::sync::CancellationToken;

/// An order is terminated as INVALID once this many bad responses have
/// already landed (§4.4.1 bad-response policy, §9 "attempts=0 eligible
/// for the 60s back-off branch"). The first 5 bad responses instead get
/// linear 60s multiples of back-off (60, 120, 180, 240, 300s).
const MAX_BAD_RESPONSE_ATTEMPTS: i32 = 5;
const BAD_RESPONSE_BACKOFF_UNIT_SEC: i64 = 60;

/// What the check routine asks the caller to do after it's updated
/// storage — only a rate limit needs to reach the worker pool, since
/// that's the one outcome with a cross-worker side effect.
pub enum CheckEffect {
    None,
    BroadcastPause(u64),
}

pub async fn run_check(
    storage: &dyn Storage,
    order: &Order,
    outcome: Outcome,
    cancel: &CancellationToken,
) -> StorageResult<CheckEffect> {
    use rust_decimal::Decimal;

    match outcome {
        Outcome::RateLimited { retry_after_sec } => {
            storage
                .set_status(
                    &order.code,
                    CheckStatus::Processing,
                    retry_after_sec as i64,
                    Decimal::ZERO,
                    cancel,
                )
                .await?;
            Ok(CheckEffect::BroadcastPause(retry_after_sec))
        }
        Outcome::Registered => {
            // SPEC_FULL.md §4.5 Open Question resolution: REGISTERED is
            // re-checked after 1s, the same as PROCESSING.
            storage
                .set_status(&order.code, CheckStatus::New, 1, Decimal::ZERO, cancel)
                .await?;
            Ok(CheckEffect::None)
        }
        Outcome::Processing => {
            storage
                .set_status(&order.code, CheckStatus::Processing, 1, Decimal::ZERO, cancel)
                .await?;
            Ok(CheckEffect::None)
        }
        Outcome::Invalid => {
            storage
                .set_status(&order.code, CheckStatus::Invalid, 0, Decimal::ZERO, cancel)
                .await?;
            Ok(CheckEffect::None)
        }
        Outcome::Processed { accrual } => {
            storage
                .add_points(order.user_id, accrual, &order.code, cancel)
                .await?;
            Ok(CheckEffect::None)
        }
        Outcome::Malformed | Outcome::TransportError => {
            bad_response(storage, order, cancel).await?;
            Ok(CheckEffect::None)
        }
    }
}

/// §4.4.1 bad-response policy: protects against a flapping loyalty
/// engine by backing off linearly over the first 5 bad responses (60,
/// 120, 180, 240, 300s, keyed off the attempt this response is about to
/// become) and terminating as INVALID on the 6th.
///
/// `order.check_attempts` is the count *before* this response (SetStatus
/// increments it), so the attempt this call is handling is
/// `check_attempts + 1`. Once 5 bad responses have already landed
/// (`check_attempts == 5`), the next one terminates instead of backing
/// off again.
async fn bad_response(
    storage: &dyn Storage,
    order: &Order,
    cancel: &CancellationToken,
) -> StorageResult<()> {
    use rust_decimal::Decimal;

    if order.check_attempts >= MAX_BAD_RESPONSE_ATTEMPTS {
        storage
            .set_status(&order.code, CheckStatus::Invalid, 0, Decimal::ZERO, cancel)
            .await
    } else {
        let retry_after_sec =
            ((order.check_attempts + 1) as i64) * BAD_RESPONSE_BACKOFF_UNIT_SEC;
        storage
            .set_status(
                &order.code,
                CheckStatus::Processing,
                retry_after_sec,
                Decimal::ZERO,
                cancel,
            )
            .await
    }
}
