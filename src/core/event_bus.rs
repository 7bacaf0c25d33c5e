// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/nvrwatch-rs

//! Bounded hand-off from the stream transport to the event worker

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::HeartbeatStore;
use crate::streaming::{MessageHandler, StreamMessage};

/// Producer side of the inbound message queue
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::Sender<StreamMessage>,
    dropped: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<StreamMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let bus = Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (bus, rx)
    }

    /// Messages discarded because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stream handler: stamps the heartbeat, then enqueues without blocking
    pub fn handler(&self, heartbeat: Arc<HeartbeatStore>) -> MessageHandler {
        let tx = self.tx.clone();
        let dropped = self.dropped.clone();
        Arc::new(move |msg: StreamMessage| {
            heartbeat.record(Utc::now());
            match tx.try_send(msg) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    let total = dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(dropped = total, "Event queue full, dropping stream message");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("Event queue closed, ignoring stream message");
                }
            }
        })
    }
}
