// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use super::{cancellable, Storage, StorageResult};
use crate::domain::{CheckStatus, NewOrder, NewUser, Order, User, Withdrawal, WithdrawalStatus};
use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

/// Postgres-backed implementation of the accrual storage surface
/// (SPEC_FULL.md §4.1). Every multi-statement operation is an explicit
/// `sqlx::Transaction` that rolls back on any intermediate error (§9).
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub async fn connect(database_uri: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_uri)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn put_order(&self, order: NewOrder, cancel: &CancellationToken) -> StorageResult<()> {
        cancellable(cancel, async {
            sqlx::query(
                "INSERT INTO orders (code, user_id, check_status, accrual, \
                 avail_for_withdraw, check_attempts, is_check_done, repeat_at, created_at) \
                 VALUES ($1, $2, 'NEW', 0, 0, 0, false, now(), now())",
            )
            .bind(&order.code)
            .bind(order.user_id)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn order_by_code(
        &self,
        code: &str,
        cancel: &CancellationToken,
    ) -> StorageResult<Order> {
        cancellable(cancel, async {
            let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE code = $1")
                .bind(code)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(StorageError::NotFound)?;
            Ok(order)
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
            if status.is_terminal() {
                sqlx::query(
                    "UPDATE orders SET check_status = $1, accrual = $2, \
                     avail_for_withdraw = $2, is_check_done = true \
                     WHERE code = $3 AND is_check_done = false",
                )
                .bind(status)
                .bind(accrual)
                .bind(code)
                .execute(&self.pool)
                .await?;
            } else {
                let retry_after_sec = retry_after_sec.max(1);
                let repeat_at = Utc::now() + Duration::seconds(retry_after_sec);
                sqlx::query(
                    "UPDATE orders SET check_status = $1, repeat_at = $2, \
                     check_attempts = check_attempts + 1 \
                     WHERE code = $3 AND is_check_done = false",
                )
                .bind(status)
                .bind(repeat_at)
                .bind(code)
                .execute(&self.pool)
                .await?;
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
            let mut tx = self.pool.begin().await?;
            sqlx::query(
                "UPDATE orders SET check_status = 'PROCESSED', accrual = $1, \
                 avail_for_withdraw = $1, is_check_done = true \
                 WHERE code = $2 AND is_check_done = false",
            )
            .bind(accrual)
            .bind(code)
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE users SET points = points + $1 WHERE user_id = $2")
                .bind(accrual)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(())
        })
        .await
    }

    async fn orders_for_check(&self, cancel: &CancellationToken) -> StorageResult<Vec<Order>> {
        cancellable(cancel, async {
            let orders = sqlx::query_as::<_, Order>(
                "SELECT * FROM orders WHERE is_check_done = false AND repeat_at < now() \
                 ORDER BY repeat_at ASC LIMIT 1000",
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(orders)
        })
        .await
    }

    async fn orders(&self, user_id: i64, cancel: &CancellationToken) -> StorageResult<Vec<Order>> {
        cancellable(cancel, async {
            let orders = sqlx::query_as::<_, Order>(
                "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
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
            let mut tx = self.pool.begin().await?;

            let points: Option<Decimal> =
                sqlx::query_scalar("SELECT points FROM users WHERE user_id = $1 FOR UPDATE")
                    .bind(user_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let points = points.ok_or(StorageError::NotFound)?;
            if points < sum {
                return Err(StorageError::InsufficientFunds);
            }

            sqlx::query(
                "UPDATE users SET points = points - $1, withdrawn = withdrawn + $1 \
                 WHERE user_id = $2",
            )
            .bind(sum)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "UPDATE orders SET avail_for_withdraw = avail_for_withdraw - $1 \
                 WHERE code = $2",
            )
            .bind(sum)
            .bind(order_code)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO withdrawals (user_id, order_code, points, status, created_at) \
                 VALUES ($1, $2, $3, 'PENDING', now())",
            )
            .bind(user_id)
            .bind(order_code)
            .bind(sum)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(())
        })
        .await
    }

    async fn active_withdrawals(
        &self,
        cancel: &CancellationToken,
    ) -> StorageResult<Vec<Withdrawal>> {
        cancellable(cancel, async {
            let withdrawals = sqlx::query_as::<_, Withdrawal>(
                "SELECT * FROM withdrawals WHERE status = 'PENDING' \
                 ORDER BY created_at ASC LIMIT 1000",
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(withdrawals)
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
            let result = sqlx::query(
                "UPDATE withdrawals SET status = 'SETTLED', processed_at = now() \
                 WHERE user_id = $1 AND order_code = $2 AND status = 'PENDING'",
            )
            .bind(user_id)
            .bind(order_code)
            .execute(&self.pool)
            .await?;
            if result.rows_affected() == 0 {
                return Err(StorageError::NotFound);
            }
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
            let withdrawals = sqlx::query_as::<_, Withdrawal>(
                "SELECT * FROM withdrawals WHERE user_id = $1 ORDER BY created_at DESC",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(withdrawals)
        })
        .await
    }

    async fn user_by_token(&self, token: &str, cancel: &CancellationToken) -> StorageResult<User> {
        cancellable(cancel, async {
            let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE auth_token = $1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(StorageError::NotFound)?;
            Ok(user)
        })
        .await
    }

    async fn create_user(&self, user: NewUser, cancel: &CancellationToken) -> StorageResult<User> {
        cancellable(cancel, async {
            let user = sqlx::query_as::<_, User>(
                "INSERT INTO users (login, password_hash, points, withdrawn, created_at) \
                 VALUES ($1, $2, 0, 0, now()) RETURNING *",
            )
            .bind(&user.login)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await?;
            Ok(user)
        })
        .await
    }

    async fn user_by_login(&self, login: &str, cancel: &CancellationToken) -> StorageResult<User> {
        cancellable(cancel, async {
            let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE login = $1")
                .bind(login)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(StorageError::NotFound)?;
            Ok(user)
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
            sqlx::query("UPDATE users SET auth_token = $1 WHERE user_id = $2")
                .bind(token)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        })
        .await
    }
}
