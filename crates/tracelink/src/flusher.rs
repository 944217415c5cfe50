// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Flush protocol and scheduler.
//!
//! ```text
//!   PendingEvents ──snapshot──> encode ──> Transport::send
//!        ^                                     │
//!        └──── remove_front(n) on 2xx ─────────┘
//! ```
//!
//! At most one flush runs at a time: a second caller gets
//! [`FlushOutcome::InFlight`] immediately instead of waiting. A failed batch stays
//! at the head of the buffer and is sent again, unchanged and ahead of newer
//! events, by the next flush.
//!
//! Delivery runs in a suppressed scope: nothing logged by the transport while
//! sending becomes telemetry of its own.

use std::sync::{Arc, Mutex, PoisonError};

use http::StatusCode;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracelink_proto::{BackEndInfo, Message, SendBackendEventsRequest};
use tracing::{debug, error, warn};

use crate::ambient;
use crate::config::Config;
use crate::pending::{PendingEvents, PENDING_WARN_THRESHOLD};
use crate::transport::{ingest_headers, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Another flush was running; nothing was done.
    InFlight,
    /// Monitoring is disabled.
    Disabled,
    /// Nothing to send.
    Empty,
    /// The backend confirmed this many events, which were removed.
    Delivered(usize),
    /// The backend answered with a non-2xx status; the batch is kept.
    Rejected(StatusCode),
    /// The call did not complete; the batch is kept.
    Failed,
}

pub struct Flusher {
    config: Arc<Config>,
    pending: Arc<PendingEvents>,
    transport: Arc<dyn Transport>,
    flush_lock: tokio::sync::Mutex<()>,
    scheduler: Mutex<Option<CancellationToken>>,
}

impl std::fmt::Debug for Flusher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flusher")
            .field("pending", &self.pending.len())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl Flusher {
    pub fn new(
        config: Arc<Config>,
        pending: Arc<PendingEvents>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            config,
            pending,
            transport,
            flush_lock: tokio::sync::Mutex::new(()),
            scheduler: Mutex::new(None),
        }
    }

    /// Sends everything currently pending in one call.
    pub async fn flush(&self) -> FlushOutcome {
        let Ok(_guard) = self.flush_lock.try_lock() else {
            debug!("TRACELINK | Flush already in progress, skipping");
            return FlushOutcome::InFlight;
        };

        if self.config.disabled {
            return FlushOutcome::Disabled;
        }

        let events = self.pending.snapshot();
        if events.is_empty() {
            return FlushOutcome::Empty;
        }
        let count = events.len();

        let headers = match ingest_headers(&self.config) {
            Ok(headers) => headers,
            Err(e) => {
                error!("TRACELINK | Unable to build ingestion headers: {e}");
                return FlushOutcome::Failed;
            }
        };
        let body = SendBackendEventsRequest {
            events,
            info: Some(BackEndInfo {
                name: self.config.system_name.clone(),
                version: self.config.version.clone(),
            }),
        }
        .encode_to_vec();

        debug!("TRACELINK | Flushing {count} events ({} bytes)", body.len());
        let outcome = match ambient::suppressed(self.transport.send(body, headers)).await {
            Ok(status) if status.is_success() => {
                let removed = self.pending.remove_front(count);
                debug!("TRACELINK | Delivered {removed} events");
                FlushOutcome::Delivered(removed)
            }
            Ok(status) => {
                error!("TRACELINK | Ingestion rejected {count} events with status {status}, will retry");
                FlushOutcome::Rejected(status)
            }
            Err(e) => {
                error!("TRACELINK | Failed to send {count} events: {e}, will retry");
                FlushOutcome::Failed
            }
        };

        if !matches!(outcome, FlushOutcome::Delivered(_)) {
            let backlog = self.pending.len();
            if backlog > PENDING_WARN_THRESHOLD {
                warn!("TRACELINK | {backlog} events are waiting for delivery");
            }
        }
        outcome
    }

    /// Starts flushing every `flush_interval`, the first time immediately.
    /// Returns `false` if already running or if there is no tokio runtime.
    pub fn start(self: &Arc<Self>) -> bool {
        if self.config.disabled {
            debug!("TRACELINK | Monitoring disabled, not starting the flush loop");
            return false;
        }

        let mut scheduler = self.scheduler.lock().unwrap_or_else(PoisonError::into_inner);
        if scheduler.is_some() {
            return false;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                error!("TRACELINK | Cannot start the flush loop outside a tokio runtime: {e}");
                return false;
            }
        };

        let cancel_token = CancellationToken::new();
        *scheduler = Some(cancel_token.clone());
        drop(scheduler);

        let flusher = Arc::clone(self);
        handle.spawn(async move {
            let mut flush_interval = interval(flusher.config.flush_interval);
            flush_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = cancel_token.cancelled() => {
                        debug!("TRACELINK | Flush loop stopped");
                        break;
                    }
                    _ = flush_interval.tick() => {
                        flusher.flush().await;
                    }
                }
            }
        });
        true
    }

    /// Stops the flush loop. Pending events are not flushed.
    pub fn stop(&self) {
        let token = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(token) = token {
            token.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
