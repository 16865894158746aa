// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Global pause broadcast (§4.4, §9).
//!
//! A `watch` channel gives exactly the semantics spec.md asks for: a
//! single slot holding the latest pause duration, with every receiver
//! notified once per update (`changed()`), and a later value arriving
//! before a receiver has observed the previous one simply overwrites it
//! — the "coalescing" spec.md describes, without a shared mutex.

use tokio::sync::watch;

#[derive(Clone)]
pub struct PauseBroadcaster {
    sender: watch::Sender<Option<u64>>,
}

impl PauseBroadcaster {
    pub fn new() -> (Self, PauseSubscriber) {
        let (sender, receiver) = watch::channel(None);
        (Self { sender }, PauseSubscriber { receiver })
    }

    /// Broadcasts a pause of `sec` seconds to every subscriber. If a pause
    /// is already pending and unobserved, this overwrites it (§4.4
    /// "the later value is dropped").
    pub fn broadcast(&self, sec: u64) {
        let _ = self.sender.send(Some(sec));
    }

    pub fn subscribe(&self) -> PauseSubscriber {
        PauseSubscriber {
            receiver: self.sender.subscribe(),
        }
    }
}

pub struct PauseSubscriber {
    receiver: watch::Receiver<Option<u64>>,
}

impl PauseSubscriber {
    /// Waits for the next pause directive this subscriber hasn't already
    /// observed.
    pub async fn next_pause(&mut self) -> u64 {
        loop {
            if self.receiver.changed().await.is_err() {
                // Sender dropped; no more pauses will ever arrive.
                std::future::pending::<()>().await;
            }
            if let Some(sec) = *self.receiver.borrow_and_update() {
                return sec;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_observes_the_latest_pause() {
        let (broadcaster, _primary) = PauseBroadcaster::new();
        let mut a = broadcaster.subscribe();
        let mut b = broadcaster.subscribe();

        broadcaster.broadcast(10);

        assert_eq!(a.next_pause().await, 10);
        assert_eq!(b.next_pause().await, 10);
    }

    #[tokio::test]
    async fn a_later_pause_overwrites_an_unobserved_one() {
        let (broadcaster, _primary) = PauseBroadcaster::new();
        let mut sub = broadcaster.subscribe();

        broadcaster.broadcast(5);
        broadcaster.broadcast(10);

        // Only the latest value is ever observed — no queue of pauses.
        assert_eq!(sub.next_pause().await, 10);
    }
}
