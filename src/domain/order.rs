// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Mirrors the loyalty engine's status vocabulary plus the storage-internal
/// `NEW`/`PROCESSING` distinction (§3, §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    New,
    Processing,
    Invalid,
    Processed,
}

impl CheckStatus {
    /// §3 invariant 3: `check_status ∈ {PROCESSED, INVALID} ⇔ is_check_done`.
    pub fn is_terminal(self) -> bool {
        matches!(self, CheckStatus::Invalid | CheckStatus::Processed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    #[serde(skip)]
    pub id: i64,
    #[serde(rename = "number")]
    pub code: String,
    #[serde(skip)]
    pub user_id: i64,
    #[serde(rename = "status")]
    pub check_status: CheckStatus,
    #[serde(skip_serializing_if = "Decimal::is_zero")]
    pub accrual: Decimal,
    #[serde(skip)]
    pub avail_for_withdraw: Decimal,
    #[serde(skip)]
    pub check_attempts: i32,
    #[serde(skip)]
    pub is_check_done: bool,
    #[serde(skip)]
    pub repeat_at: DateTime<Utc>,
    #[serde(rename = "uploaded_at")]
    pub created_at: DateTime<Utc>,
}

/// What intake (§4.7) hands to `PutOrder`; storage fills in the rest.
pub struct NewOrder {
    pub code: String,
    pub user_id: i64,
}
