// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Check-order task queue (§4.3). `TaskQueue` is the only type the rest
//! of the system sees; broker-specific types never leak past this module
//! (§9 "do not leak broker-specific types beyond §4.3").

mod amqp;
mod inprocess;

pub use amqp::AmqpQueue;
pub use inprocess::InProcessQueue;

use crate::domain::Order;
use crate::error::QueueError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A queue entry is a value snapshot of an Order — the queue never holds
/// a live reference into storage (§3 Ownership).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckTask {
    pub order: Order,
}

impl From<Order> for CheckTask {
    fn from(order: Order) -> Self {
        Self { order }
    }
}

pub type QueueResult<T> = Result<T, QueueError>;

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Bounded at 1000 in-flight tasks; blocks the caller once full
    /// (§4.3, §5).
    async fn publish(&self, task: CheckTask) -> QueueResult<()>;

    /// Yields the next task, or `Closed`/`BrokerLost` on shutdown/fatal
    /// broker failure.
    async fn consume(&self) -> QueueResult<CheckTask>;
}
