// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Buffer of events awaiting delivery.
//!
//! Producers (ending spans, recorded logs) append from any thread; the flusher
//! snapshots the buffer and, once the backend confirms the batch, removes exactly
//! the entries it sent from the head. Nothing is ever dropped: under a backend
//! that keeps failing the buffer grows without bound.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use tracelink_proto::Event;

/// Size above which a failed flush logs a warning about the backlog.
pub const PENDING_WARN_THRESHOLD: usize = 10_000;

#[derive(Debug, Default)]
pub struct PendingEvents {
    events: Mutex<VecDeque<Event>>,
}

impl PendingEvents {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event. Never blocks on I/O.
    pub fn push(&self, event: Event) {
        self.lock().push_back(event);
    }

    /// Clones the current entries in order. Events pushed afterwards are not
    /// part of the snapshot.
    pub fn snapshot(&self) -> Vec<Event> {
        self.lock().iter().cloned().collect()
    }

    /// Removes up to `count` entries from the head and returns how many were
    /// removed. Only the flusher holding the flush lock may call this, so the
    /// head is always the snapshot it just delivered.
    pub fn remove_front(&self, count: usize) -> usize {
        let mut events = self.lock();
        let count = count.min(events.len());
        events.drain(..count);
        count
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Event>> {
        // The queue is never left half-modified, so a poisoned lock is still usable.
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
