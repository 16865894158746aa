// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Process bootstrap (SPEC_FULL.md §2 C9): loads configuration, connects
//! storage and runs its migrations, selects a task queue backend, and
//! spawns the worker pool, re-scheduler, withdrawal confirmer, and HTTP
//! server under one cancellation token, then waits for a clean shutdown.

use anyhow::Context;
use gophermart::config::{BrokerType, Config};
use gophermart::http::{build_router, AppState};
use gophermart::loyalty::LoyaltyClient;
use gophermart::queue::{AmqpQueue, InProcessQueue, TaskQueue};
use gophermart::storage::{PgStorage, Storage};
use gophermart::worker::WorkerPool;
use gophermart::{confirmer, rescheduler};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// §5: the process waits this long for long-lived tasks to wind down
/// after cancellation before giving up and exiting anyway.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load().context("failed to load configuration")?;

    let pg_storage = PgStorage::connect(&config.database_uri)
        .await
        .context("failed to connect to storage")?;
    pg_storage
        .migrate()
        .await
        .context("failed to run database migrations")?;
    let storage: Arc<dyn Storage> = Arc::new(pg_storage);

    let queue: Arc<dyn TaskQueue> = match config.broker_type {
        BrokerType::Go => Arc::new(InProcessQueue::new()),
        BrokerType::Rabbitmq => {
            let broker_host = config
                .broker_host
                .as_deref()
                .context("BROKER_HOST is required when BROKER_TYPE=rabbitmq")?;
            Arc::new(
                AmqpQueue::connect(broker_host)
                    .await
                    .context("failed to connect to the AMQP broker")?,
            )
        }
    };

    let loyalty = Arc::new(LoyaltyClient::new(config.accrual_system_address.clone()));
    let cancel = CancellationToken::new();

    let mut tasks = JoinSet::new();

    {
        let queue = queue.clone();
        let storage = storage.clone();
        let loyalty = loyalty.clone();
        let cancel = cancel.clone();
        tasks.spawn(async move {
            WorkerPool::new(num_cpus::get())
                .run(queue, storage, loyalty, cancel)
                .await
        });
    }
    {
        let storage = storage.clone();
        let queue = queue.clone();
        let cancel = cancel.clone();
        tasks.spawn(async move { rescheduler::run(storage, queue, cancel).await });
    }
    {
        let storage = storage.clone();
        let cancel = cancel.clone();
        tasks.spawn(async move { confirmer::run(storage, cancel).await });
    }
    {
        let app_state = AppState {
            storage: storage.clone(),
            queue: queue.clone(),
            cancel: cancel.clone(),
        };
        let listener = tokio::net::TcpListener::bind(&config.run_address)
            .await
            .with_context(|| format!("failed to bind {}", config.run_address))?;
        tracing::info!(addr = %config.run_address, "http server listening");
        let server_cancel = cancel.clone();
        tasks.spawn(async move {
            axum::serve(listener, build_router(app_state))
                .with_graceful_shutdown(async move { server_cancel.cancelled().await })
                .await
                .map_err(anyhow::Error::from)
        });
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
        Some(finished) = tasks.join_next() => {
            match finished {
                Ok(Ok(())) => tracing::warn!("a component exited before shutdown was requested"),
                Ok(Err(err)) => tracing::error!(error = %err, "a component failed; shutting down"),
                Err(join_err) => tracing::error!(error = %join_err, "a component task panicked; shutting down"),
            }
        }
    }

    cancel.cancel();

    let drain = async {
        while tasks.join_next().await.is_some() {}
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        tracing::warn!("graceful shutdown timed out after {:?}; exiting anyway", SHUTDOWN_GRACE);
    }

    Ok(())
}
