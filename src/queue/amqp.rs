// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use super::{CheckTask, QueueResult, TaskQueue};
use crate::error::QueueError;
use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tokio::sync::Mutex;

const QUEUE_NAME: &str = "orders";

/// External-broker backend (§4.3.2): an AMQP durable queue named
/// `orders`. Tasks are JSON-serialized Order snapshots; consumers
/// auto-ack. A dropped connection is fatal (§4.3, §7) — the pipeline
/// aborts and the supervising process is expected to restart.
pub struct AmqpQueue {
    channel: Channel,
    consumer: Mutex<lapin::Consumer>,
}

impl AmqpQueue {
    pub async fn connect(broker_host: &str) -> anyhow::Result<Self> {
        let connection =
            Connection::connect(broker_host, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        channel
            .queue_declare(
                QUEUE_NAME,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        let consumer = channel
            .basic_consume(
                QUEUE_NAME,
                "gophermart-worker",
                BasicConsumeOptions {
                    no_ack: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(Self {
            channel,
            consumer: Mutex::new(consumer),
        })
    }
}

#[async_trait]
impl TaskQueue for AmqpQueue {
    async fn publish(&self, task: CheckTask) -> QueueResult<()> {
        let payload = serde_json::to_vec(&task).map_err(|e| QueueError::BrokerLost(e.into()))?;
        self.channel
            .basic_publish(
                "",
                QUEUE_NAME,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_delivery_mode(2),
            )
            .await
            .map_err(|e| QueueError::BrokerLost(e.into()))?
            .await
            .map_err(|e| QueueError::BrokerLost(e.into()))?;
        Ok(())
    }

    async fn consume(&self) -> QueueResult<CheckTask> {
        let mut consumer = self.consumer.lock().await;
        let delivery = consumer
            .next()
            .await
            .ok_or(QueueError::Closed)?
            .map_err(|e| QueueError::BrokerLost(e.into()))?;
        // `no_ack: true` above means the broker already considers this
        // delivered; an explicit ack is a no-op but keeps the call site
        // uniform if auto-ack is ever turned off.
        let _ = delivery.ack(BasicAckOptions::default()).await;
        serde_json::from_slice(&delivery.data).map_err(|e| QueueError::BrokerLost(e.into()))
    }
}
