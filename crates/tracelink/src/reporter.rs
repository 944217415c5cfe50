// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The service adapters talk to.
//!
//! A [`Reporter`] owns the propagation codec, the pending buffer and the
//! flusher. It is cheap to clone and meant to be built once at startup and
//! handed to every adapter. [`install_global`] exists for adapters that have no
//! way to receive it.

use std::sync::{Arc, OnceLock};

use http::HeaderMap;
use tracing::debug;

use crate::ambient;
use crate::config::Config;
use crate::context::RequestContext;
use crate::error::Error;
use crate::flusher::{FlushOutcome, Flusher};
use crate::log::LogRecord;
use crate::pending::PendingEvents;
use crate::propagation::carrier::{Extractor, Injector};
use crate::propagation::Propagator;
use crate::span::{ServerAction, Span, UserInfo};
use crate::transport::{HttpTransport, Transport};

static GLOBAL: OnceLock<Reporter> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct Reporter {
    inner: Arc<ReporterInner>,
}

#[derive(Debug)]
struct ReporterInner {
    config: Arc<Config>,
    propagator: Propagator,
    pending: Arc<PendingEvents>,
    flusher: Arc<Flusher>,
}

impl Reporter {
    /// Builds a reporter delivering through `transport`. Fails on invalid
    /// configuration.
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Result<Self, Error> {
        config.validate()?;
        let config = Arc::new(config);
        let pending = Arc::new(PendingEvents::new());
        let flusher = Arc::new(Flusher::new(
            Arc::clone(&config),
            Arc::clone(&pending),
            transport,
        ));

        Ok(Self {
            inner: Arc::new(ReporterInner {
                config,
                propagator: Propagator::new(),
                pending,
                flusher,
            }),
        })
    }

    /// Builds a reporter delivering over HTTP to `config.base_url`.
    pub fn from_config(config: Config) -> Result<Self, Error> {
        let transport = Arc::new(HttpTransport::new(&config));
        Self::new(config, transport)
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn is_enabled(&self) -> bool {
        !self.inner.config.disabled
    }

    pub fn extract_context(
        &self,
        headers: &dyn Extractor,
        cookies: &dyn Extractor,
    ) -> RequestContext {
        self.inner.propagator.extract(headers, cookies)
    }

    pub fn is_recursive(&self, headers: &dyn Extractor) -> bool {
        self.inner.propagator.is_recursive(headers)
    }

    /// Writes propagation headers for an outbound call made on behalf of
    /// `context`.
    pub fn inject_headers(&self, context: &RequestContext, carrier: &mut dyn Injector) {
        if self.is_enabled() {
            self.inner.propagator.inject(context, carrier);
        }
    }

    /// Propagation headers for the ambient context; empty without one.
    pub fn propagation_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(context) = ambient::current() {
            self.inject_headers(&context, &mut headers);
        }
        headers
    }

    /// Opens a span. Returns `None` when monitoring is disabled or when called
    /// while handling a recursive request.
    pub fn start_span(&self, action: ServerAction) -> Option<Span> {
        if !self.is_enabled() || ambient::is_suppressed() {
            return None;
        }
        Some(Span::start(action, Arc::clone(&self.inner.pending)))
    }

    /// Records a log against the ambient context, if any.
    pub fn record_log(&self, record: LogRecord) {
        if !self.is_enabled() {
            return;
        }
        let scope = ambient::capture();
        if scope.is_suppressed() {
            return;
        }
        self.inner
            .pending
            .push(record.to_event(scope.context().as_ref()));
    }

    pub fn record_log_with_context(&self, record: LogRecord, context: &RequestContext) {
        if !self.is_enabled() || ambient::is_suppressed() {
            return;
        }
        self.inner.pending.push(record.to_event(Some(context)));
    }

    /// Attaches the logged-in user to the ambient span.
    pub fn set_logged_in_user(&self, user: UserInfo) {
        match ambient::current_span() {
            Some(span) => span.set_user(user),
            None => debug!("TRACELINK | No current span, ignoring logged-in user"),
        }
    }

    pub async fn flush(&self) -> FlushOutcome {
        self.inner.flusher.flush().await
    }

    /// Starts the background flush loop. Must be called inside a tokio runtime.
    pub fn start(&self) -> bool {
        self.inner.flusher.start()
    }

    pub fn stop(&self) {
        self.inner.flusher.stop();
    }

    pub fn pending_len(&self) -> usize {
        self.inner.pending.len()
    }

    #[cfg(test)]
    pub(crate) fn pending_snapshot(&self) -> Vec<tracelink_proto::Event> {
        self.inner.pending.snapshot()
    }
}

/// Installs the process-wide reporter. Returns the reporter back if one was
/// already installed.
pub fn install_global(reporter: Reporter) -> Result<(), Reporter> {
    GLOBAL.set(reporter)
}

pub fn global() -> Option<&'static Reporter> {
    GLOBAL.get()
}
