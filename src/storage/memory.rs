// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! In-memory `Storage` implementation used by tests (SPEC_FULL.md §4.1,
//! §8) — no database required to exercise the invariant and scenario
//! tests. Mirrors the teacher's `MockMarketplace` pattern of a trait with
//! a real backend and a plain in-memory stand-in behind the same seam.

use super::{cancellable, Storage, StorageResult};
use crate::domain::{CheckStatus, NewOrder, NewUser, Order, User, Withdrawal, WithdrawalStatus};
use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    orders: Vec<Order>,
    withdrawals: Vec<Withdrawal>,
}

pub struct MemoryStorage {
    inner: Arc<RwLock<Inner>>,
    next_user_id: Arc<AtomicI64>,
    next_order_id: Arc<AtomicI64>,
    next_withdrawal_id: Arc<AtomicI64>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            next_user_id: Arc::new(AtomicI64::new(1)),
            next_order_id: Arc::new(AtomicI64::new(1)),
            next_withdrawal_id: Arc::new(AtomicI64::new(1)),
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put_order(&self, order: NewOrder, cancel: &CancellationToken) -> StorageResult<()> {
        cancellable(cancel, async {
            let mut inner = self.inner.write().await;
            if inner.orders.iter().any(|o| o.code == order.code) {
                return Err(StorageError::Duplicate);
            }
            let now = Utc::now();
            inner.orders.push(Order {
                id: self.next_order_id.fetch_add(1, Ordering::SeqCst),
                code: order.code,
                user_id: order.user_id,
                check_status: CheckStatus::New,
                accrual: Decimal::ZERO,
                avail_for_withdraw: Decimal::ZERO,
                check_attempts: 0,
                is_check_done: false,
                repeat_at: now,
                created_at: now,
            });
            Ok(())
        })
        .await
    }

    async fn order_by_code(&self, code: &str, cancel: &CancellationToken) -> StorageResult<Order> {
        cancellable(cancel, async {
            let inner = self.inner.read().await;
            inner
                .orders
                .iter()
                .find(|o| o.code == code)
                .cloned()
                .ok_or(StorageError::NotFound)
        })
        .await
    }

    async fn set_status(
        &self,
        code: &str,
        status: CheckStatus,
        retry_after_sec: i64,
        accrual: Decimal,
        cancel: &CancellationToken,
    ) -> StorageResult<()> {
        cancellable(cancel, async {
            let mut inner = self.inner.write().await;
            let order = inner
                .orders
                .iter_mut()
                .find(|o| o.code == code)
                .ok_or(StorageError::NotFound)?;
            if order.is_check_done {
                return Ok(());
            }
            if status.is_terminal() {
                order.check_status = status;
                order.accrual = accrual;
                order.avail_for_withdraw = accrual;
                order.is_check_done = true;
            } else {
                let retry_after_sec = retry_after_sec.max(1);
                order.repeat_at = Utc::now() + Duration::seconds(retry_after_sec);
                order.check_attempts += 1;
                order.check_status = status;
            }
            Ok(())
        })
        .await
    }

    async fn add_points(
        &self,
        user_id: i64,
        accrual: Decimal,
        code: &str,
        cancel: &CancellationToken,
    ) -> StorageResult<()> {
        cancellable(cancel, async {
            let mut inner = self.inner.write().await;
            {
                let order = inner
                    .orders
                    .iter_mut()
                    .find(|o| o.code == code)
                    .ok_or(StorageError::NotFound)?;
                if order.is_check_done {
                    return Ok(());
                }
                order.check_status = CheckStatus::Processed;
                order.accrual = accrual;
                order.avail_for_withdraw = accrual;
                order.is_check_done = true;
            }
            let user = inner
                .users
                .iter_mut()
                .find(|u| u.user_id == user_id)
                .ok_or(StorageError::NotFound)?;
            user.points += accrual;
            Ok(())
        })
        .await
    }

    async fn orders_for_check(&self, cancel: &CancellationToken) -> StorageResult<Vec<Order>> {
        cancellable(cancel, async {
            let inner = self.inner.read().await;
            let now = Utc::now();
            let mut due: Vec<Order> = inner
                .orders
                .iter()
                .filter(|o| !o.is_check_done && o.repeat_at < now)
                .cloned()
                .collect();
            due.sort_by_key(|o| o.repeat_at);
            due.truncate(1000);
            Ok(due)
        })
        .await
    }

    async fn orders(&self, user_id: i64, cancel: &CancellationToken) -> StorageResult<Vec<Order>> {
        cancellable(cancel, async {
            let inner = self.inner.read().await;
            let mut orders: Vec<Order> = inner
                .orders
                .iter()
                .filter(|o| o.user_id == user_id)
                .cloned()
                .collect();
            orders.sort_by_key(|o| std::cmp::Reverse(o.created_at));
            Ok(orders)
        })
        .await
    }

    async fn add_withdraw(
        &self,
        user_id: i64,
        order_code: &str,
        sum: Decimal,
        cancel: &CancellationToken,
    ) -> StorageResult<()> {
        cancellable(cancel, async {
            let mut inner = self.inner.write().await;
            {
                let user = inner
                    .users
                    .iter()
                    .find(|u| u.user_id == user_id)
                    .ok_or(StorageError::NotFound)?;
                if user.points < sum {
                    return Err(StorageError::InsufficientFunds);
                }
            }
            let now = Utc::now();
            inner.withdrawals.push(Withdrawal {
                id: self.next_withdrawal_id.fetch_add(1, Ordering::SeqCst),
                user_id,
                order_code: order_code.to_string(),
                points: sum,
                status: WithdrawalStatus::Pending,
                processed_at: None,
                created_at: now,
            });
            if let Some(user) = inner.users.iter_mut().find(|u| u.user_id == user_id) {
                user.points -= sum;
                user.withdrawn += sum;
            }
            if let Some(order) = inner.orders.iter_mut().find(|o| o.code == order_code) {
                order.avail_for_withdraw -= sum;
            }
            Ok(())
        })
        .await
    }

    async fn active_withdrawals(
        &self,
        cancel: &CancellationToken,
    ) -> StorageResult<Vec<Withdrawal>> {
        cancellable(cancel, async {
            let inner = self.inner.read().await;
            let mut pending: Vec<Withdrawal> = inner
                .withdrawals
                .iter()
                .filter(|w| w.status == WithdrawalStatus::Pending)
                .cloned()
                .collect();
            pending.sort_by_key(|w| w.created_at);
            pending.truncate(1000);
            Ok(pending)
        })
        .await
    }

    async fn withdraw(
        &self,
        user_id: i64,
        order_code: &str,
        cancel: &CancellationToken,
    ) -> StorageResult<()> {
        cancellable(cancel, async {
            let mut inner = self.inner.write().await;
            let withdrawal = inner
                .withdrawals
                .iter_mut()
                .find(|w| {
                    w.user_id == user_id
                        && w.order_code == order_code
                        && w.status == WithdrawalStatus::Pending
                })
                .ok_or(StorageError::NotFound)?;
            withdrawal.status = WithdrawalStatus::Settled;
            withdrawal.processed_at = Some(Utc::now());
            Ok(())
        })
        .await
    }

    async fn withdraws_by_user_id(
        &self,
        user_id: i64,
        cancel: &CancellationToken,
    ) -> StorageResult<Vec<Withdrawal>> {
        cancellable(cancel, async {
            let inner = self.inner.read().await;
            let mut withdrawals: Vec<Withdrawal> = inner
                .withdrawals
                .iter()
                .filter(|w| w.user_id == user_id)
                .cloned()
                .collect();
            withdrawals.sort_by_key(|w| std::cmp::Reverse(w.created_at));
            Ok(withdrawals)
        })
        .await
    }

    async fn user_by_token(&self, token: &str, cancel: &CancellationToken) -> StorageResult<User> {
        cancellable(cancel, async {
            let inner = self.inner.read().await;
            inner
                .users
                .iter()
                .find(|u| u.auth_token.as_deref() == Some(token))
                .cloned()
                .ok_or(StorageError::NotFound)
        })
        .await
    }

    async fn create_user(&self, user: NewUser, cancel: &CancellationToken) -> StorageResult<User> {
        cancellable(cancel, async {
            let mut inner = self.inner.write().await;
            if inner.users.iter().any(|u| u.login == user.login) {
                return Err(StorageError::Duplicate);
            }
            let created = User {
                user_id: self.next_user_id.fetch_add(1, Ordering::SeqCst),
                login: user.login,
                password_hash: user.password_hash,
                auth_token: None,
                points: Decimal::ZERO,
                withdrawn: Decimal::ZERO,
                created_at: Utc::now(),
            };
            inner.users.push(created.clone());
            Ok(created)
        })
        .await
    }

    async fn user_by_login(&self, login: &str, cancel: &CancellationToken) -> StorageResult<User> {
        cancellable(cancel, async {
            let inner = self.inner.read().await;
            inner
                .users
                .iter()
                .find(|u| u.login == login)
                .cloned()
                .ok_or(StorageError::NotFound)
        })
        .await
    }

    async fn set_auth_token(
        &self,
        user_id: i64,
        token: &str,
        cancel: &CancellationToken,
    ) -> StorageResult<()> {
        cancellable(cancel, async {
            let mut inner = self.inner.write().await;
            let user = inner
                .users
                .iter_mut()
                .find(|u| u.user_id == user_id)
                .ok_or(StorageError::NotFound)?;
            user.auth_token = Some(token.to_string());
            Ok(())
        })
        .await
    }
}
