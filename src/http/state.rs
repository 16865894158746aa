// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use crate::queue::TaskQueue;
use crate::storage::Storage;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub queue: Arc<dyn TaskQueue>,
    pub cancel: CancellationToken,
}
