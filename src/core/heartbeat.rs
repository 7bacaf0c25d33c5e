// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/nvrwatch-rs

//! Stream heartbeat store

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Point-in-time copy of the heartbeat fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeartbeatSnapshot {
    pub last_message_at: Option<DateTime<Utc>>,
    pub connection_start_at: Option<DateTime<Utc>>,
}

/// Shared liveness cell written by the stream handler and read by the supervisor.
///
/// Writers run on the transport task; the reader runs on the supervisor timer.
#[derive(Debug, Default)]
pub struct HeartbeatStore {
    inner: Mutex<HeartbeatSnapshot>,
}

impl HeartbeatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an inbound message
    pub fn record(&self, now: DateTime<Utc>) {
        let mut state = self.inner.lock();
        state.last_message_at = Some(now);
        if state.connection_start_at.is_none() {
            state.connection_start_at = Some(now);
        }
    }

    /// A subscription was just established. Frames already recorded on it are kept.
    pub fn mark_connected(&self, now: DateTime<Utc>) {
        let mut state = self.inner.lock();
        if state.last_message_at.is_none() {
            state.connection_start_at = Some(now);
        }
    }

    /// Restart both clocks after a successful resubscription
    pub fn reset(&self, now: DateTime<Utc>) {
        let mut state = self.inner.lock();
        state.last_message_at = Some(now);
        state.connection_start_at = Some(now);
    }

    pub fn snapshot(&self) -> HeartbeatSnapshot {
        *self.inner.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    #[test]
    fn test_record_sets_connection_start_once() {
        let store = HeartbeatStore::new();
        let t0 = Utc::now();
        assert_eq!(store.snapshot(), HeartbeatSnapshot::default());

        store.record(t0);
        store.record(t0 + Duration::seconds(5));

        let snap = store.snapshot();
        assert_eq!(snap.last_message_at, Some(t0 + Duration::seconds(5)));
        assert_eq!(snap.connection_start_at, Some(t0));
    }

    #[test]
    fn test_mark_connected_starts_silent_clock() {
        let store = HeartbeatStore::new();
        let t0 = Utc::now();
        store.mark_connected(t0);

        let snap = store.snapshot();
        assert_eq!(snap.last_message_at, None);
        assert_eq!(snap.connection_start_at, Some(t0));
    }

    #[test]
    fn test_mark_connected_keeps_early_frame() {
        let store = HeartbeatStore::new();
        let t0 = Utc::now();
        // reader task delivered a frame before the subscriber got control back
        store.record(t0);

        store.mark_connected(t0 + Duration::seconds(1));

        let snap = store.snapshot();
        assert_eq!(snap.last_message_at, Some(t0));
        assert_eq!(snap.connection_start_at, Some(t0));
    }

    #[test]
    fn test_concurrent_writers() {
        let store = Arc::new(HeartbeatStore::new());
        let t0 = Utc::now();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for j in 0..100 {
                        store.record(t0 + Duration::milliseconds(i * 100 + j));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snap = store.snapshot();
        assert!(snap.last_message_at.is_some());
        assert!(snap.connection_start_at.is_some());
    }
}
