// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use super::{CheckTask, QueueResult, TaskQueue};
use crate::error::QueueError;
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

/// Bounded in-process channel backend (§4.3.1): one process owns both
/// ends, lifetime tied to the process. The receiver is shared behind a
/// mutex so several worker tasks can consume concurrently — `tokio::mpsc`
/// only gives one owned `Receiver`, so this is the standard way to fan a
/// single channel out to a worker pool.
pub struct InProcessQueue {
    sender: mpsc::Sender<CheckTask>,
    receiver: Mutex<mpsc::Receiver<CheckTask>>,
}

impl InProcessQueue {
    /// Capacity fixed at 1000 per §4.3/§5.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel(1000);
        Self {
            sender,
            receiver: Mutex::new(receiver),
        }
    }
}

impl Default for InProcessQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskQueue for InProcessQueue {
    async fn publish(&self, task: CheckTask) -> QueueResult<()> {
        self.sender.send(task).await.map_err(|_| QueueError::Closed)
    }

    async fn consume(&self) -> QueueResult<CheckTask> {
        let mut receiver = self.receiver.lock().await;
        receiver.recv().await.ok_or(QueueError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CheckStatus, Order};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn sample_order(code: &str) -> Order {
        Order {
            id: 1,
            code: code.to_string(),
            user_id: 1,
            check_status: CheckStatus::New,
            accrual: Decimal::ZERO,
            avail_for_withdraw: Decimal::ZERO,
            check_attempts: 0,
            is_check_done: false,
            repeat_at: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn publish_then_consume_round_trips() {
        let queue = InProcessQueue::new();
        queue
            .publish(CheckTask::from(sample_order("12345674")))
            .await
            .unwrap();
        let task = queue.consume().await.unwrap();
        assert_eq!(task.order.code, "12345674");
    }

    #[tokio::test]
    async fn multiple_consumers_share_the_receiver() {
        let queue = Arc::new(InProcessQueue::new());
        for i in 0..4 {
            queue
                .publish(CheckTask::from(sample_order(&i.to_string())))
                .await
                .unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move { queue.consume().await.unwrap() }));
        }
        let mut codes: Vec<String> = Vec::new();
        for handle in handles {
            codes.push(handle.await.unwrap().order.code);
        }
        codes.sort();
        assert_eq!(codes, vec!["0", "1", "2", "3"]);
    }
}
