// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub user_id: i64,
    pub login: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub auth_token: Option<String>,
    pub points: Decimal,
    pub withdrawn: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied at registration time; the rest are storage-assigned.
pub struct NewUser {
    pub login: String,
    pub password_hash: String,
}
