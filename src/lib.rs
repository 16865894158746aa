// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! The loyalty-accrual backend (SPEC_FULL.md). `domain` holds the
//! persistent row types; `storage` is the seam every other component
//! depends on; `queue` carries check-order tasks between intake/
//! re-scheduler and the `worker` pool; `loyalty` adapts the remote
//! engine; `rescheduler` and `confirmer` are the two periodic tasks;
//! `http` is the concrete realization of order intake plus the
//! registration/login/balance routes; `config` loads startup options.

pub mod confirmer;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod loyalty;
pub mod luhn;
pub mod queue;
pub mod rescheduler;
pub mod storage;
pub mod worker;
