// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! The accrual-relevant storage surface (SPEC_FULL.md §4.1).
//!
//! `Storage` is the single seam every other component depends on; it has
//! two implementations behind it — `PgStorage` for production and
//! `MemoryStorage` for tests — exactly the way the task queue (`queue`
//! module) has two interchangeable backends behind one trait.

mod memory;
mod postgres;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

use crate::domain::{CheckStatus, NewOrder, NewUser, Order, User, Withdrawal};
use crate::error::StorageError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

pub type StorageResult<T> = Result<T, StorageError>;

/// Cancels an in-flight storage call by racing it against the token and
/// mapping a fired token to `StorageError::Cancelled` (§4.1 "all operations
/// accept a cancellation token").
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl std::future::Future<Output = StorageResult<T>>,
) -> StorageResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StorageError::Cancelled),
        res = fut => res,
    }
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn put_order(&self, order: NewOrder, cancel: &CancellationToken) -> StorageResult<()>;

    async fn order_by_code(&self, code: &str, cancel: &CancellationToken)
        -> StorageResult<Order>;

    /// §4.1 `SetStatus` semantics: terminal statuses are write-once and
    /// idempotent; non-terminal statuses bump `check_attempts` and push
    /// `repeat_at` forward by `max(1, retry_after_sec)`.
    async fn set_status(
        &self,
        code: &str,
        status: CheckStatus,
        retry_after_sec: i64,
        accrual: Decimal,
        cancel: &CancellationToken,
    ) -> StorageResult<()>;

    /// Atomic: marks the order terminal-PROCESSED and credits the owner.
    async fn add_points(
        &self,
        user_id: i64,
        accrual: Decimal,
        code: &str,
        cancel: &CancellationToken,
    ) -> StorageResult<()>;

    /// Up to 1000 orders due for re-check (§4.1, §4.5).
    async fn orders_for_check(&self, cancel: &CancellationToken) -> StorageResult<Vec<Order>>;

    async fn orders(&self, user_id: i64, cancel: &CancellationToken) -> StorageResult<Vec<Order>>;

    /// Atomic: debits the user, records a PENDING withdrawal, reduces the
    /// order's `avail_for_withdraw`.
    async fn add_withdraw(
        &self,
        user_id: i64,
        order_code: &str,
        sum: Decimal,
        cancel: &CancellationToken,
    ) -> StorageResult<()>;

    /// Up to 1000 PENDING withdrawals, oldest-first (§4.1, §4.6).
    async fn active_withdrawals(&self, cancel: &CancellationToken)
        -> StorageResult<Vec<Withdrawal>>;

    async fn withdraw(
        &self,
        user_id: i64,
        order_code: &str,
        cancel: &CancellationToken,
    ) -> StorageResult<()>;

    async fn withdraws_by_user_id(
        &self,
        user_id: i64,
        cancel: &CancellationToken,
    ) -> StorageResult<Vec<Withdrawal>>;

    async fn user_by_token(&self, token: &str, cancel: &CancellationToken) -> StorageResult<User>;

    // --- ambient: HTTP-surface operations (SPEC_FULL.md §4.1) ---

    async fn create_user(&self, user: NewUser, cancel: &CancellationToken) -> StorageResult<User>;

    /// Looks a user up by login so the caller can verify the password hash
    /// itself — argon2 hashes are salted, so equality can't be pushed into
    /// SQL the way `SetStatus`'s comparisons can.
    async fn user_by_login(&self, login: &str, cancel: &CancellationToken) -> StorageResult<User>;

    async fn set_auth_token(
        &self,
        user_id: i64,
        token: &str,
        cancel: &CancellationToken,
    ) -> StorageResult<()>;
}
