// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Startup configuration (SPEC_FULL.md §6, §9): flag > environment
//! variable > `.env` file precedence.
//!
//! `clap`'s `env` feature makes every flag also readable from the
//! environment; loading `.env` with `dotenvy` *before* `clap::Parser::parse`
//! runs means a variable already present in the process environment is
//! never overwritten by the file, so the three-way precedence falls out
//! of running these two steps in this order rather than needing custom
//! merge logic.

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lower")]
pub enum BrokerType {
    /// In-process bounded channel (§4.3.1).
    Go,
    /// External AMQP broker (§4.3.2).
    Rabbitmq,
}

#[derive(Debug, Parser, Clone)]
#[command(name = "gophermart", about = "Loyalty-accrual backend")]
pub struct Config {
    /// Storage DSN (mandatory).
    #[arg(short = 'd', long, env = "DATABASE_URI")]
    pub database_uri: String,

    /// Loyalty engine base URL.
    #[arg(short = 'r', long, env = "ACCRUAL_SYSTEM_ADDRESS")]
    pub accrual_system_address: String,

    /// HTTP listen address (mandatory).
    #[arg(short = 'a', long, env = "RUN_ADDRESS")]
    pub run_address: String,

    /// Task queue backend (§4.3).
    #[arg(long, env = "BROKER_TYPE", default_value = "go")]
    pub broker_type: BrokerType,

    /// AMQP URL; required when `broker_type` is `rabbitmq`.
    #[arg(long, env = "BROKER_HOST")]
    pub broker_host: Option<String>,
}

impl Config {
    /// Loads `.env` (if present), then parses flags/environment. Returns a
    /// descriptive error rather than panicking — missing `DATABASE_URI` or
    /// `RUN_ADDRESS`, or `BROKER_TYPE=rabbitmq` without `BROKER_HOST`, are
    /// startup-time fatal errors (§9) that should not leak a panic
    /// backtrace to stdout.
    pub fn load() -> anyhow::Result<Self> {
        // Absence of a `.env` file is normal in production; only a
        // malformed one is worth surfacing.
        match dotenvy::dotenv() {
            Ok(_) | Err(dotenvy::Error::Io(_)) => {}
            Err(err) => return Err(anyhow::anyhow!(err).context("failed to read .env file")),
        }

        let config = Config::try_parse().map_err(|err| anyhow::anyhow!(err.to_string()))?;

        if config.broker_type == BrokerType::Rabbitmq && config.broker_host.is_none() {
            anyhow::bail!("BROKER_HOST is required when BROKER_TYPE=rabbitmq");
        }

        Ok(config)
    }
}
