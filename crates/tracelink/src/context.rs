// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-request identity.
//!
//! A [`RequestContext`] ties one unit of work (a fetch) to its browser session,
//! to the page view that issued it and to the upstream fetch that caused it. It
//! is created by the propagation codec for every inbound request and attached to
//! every event recorded while that request is handled.

use rand::RngCore;
use tracelink_proto::TraceInfo;

use crate::error::Error;

const FETCH_ID_BYTES: usize = 8;
const SESSION_ID_BYTES: usize = 16;
const TRACE_ID_BYTES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    fetch_id: String,
    session_id: String,
    page_view_id: Option<String>,
    parent_fetch_id: Option<String>,
    trace_id: Option<String>,
}

impl RequestContext {
    /// Creates a context for the given fetch and session. Both identifiers must be
    /// non-empty.
    pub fn new(
        fetch_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Result<Self, Error> {
        let fetch_id = fetch_id.into();
        let session_id = session_id.into();

        if fetch_id.trim().is_empty() {
            return Err(Error::EmptyIdentity("fetch_id"));
        }
        if session_id.trim().is_empty() {
            return Err(Error::EmptyIdentity("session_id"));
        }

        Ok(Self {
            fetch_id,
            session_id,
            page_view_id: None,
            parent_fetch_id: None,
            trace_id: None,
        })
    }

    /// Skips validation; callers guarantee both ids are non-empty.
    pub(crate) fn from_ids(fetch_id: String, session_id: String) -> Self {
        Self {
            fetch_id,
            session_id,
            page_view_id: None,
            parent_fetch_id: None,
            trace_id: None,
        }
    }

    /// A context with freshly generated fetch, session and trace ids.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            fetch_id: generate_fetch_id(),
            session_id: generate_session_id(),
            page_view_id: None,
            parent_fetch_id: None,
            trace_id: Some(generate_trace_id()),
        }
    }

    #[must_use]
    pub fn with_page_view_id(mut self, page_view_id: Option<String>) -> Self {
        self.page_view_id = page_view_id.filter(|id| !id.is_empty());
        self
    }

    #[must_use]
    pub fn with_parent_fetch_id(mut self, parent_fetch_id: Option<String>) -> Self {
        self.parent_fetch_id = parent_fetch_id.filter(|id| !id.is_empty());
        self
    }

    #[must_use]
    pub fn with_trace_id(mut self, trace_id: Option<String>) -> Self {
        self.trace_id = trace_id.filter(|id| !id.is_empty());
        self
    }

    pub fn fetch_id(&self) -> &str {
        &self.fetch_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn page_view_id(&self) -> Option<&str> {
        self.page_view_id.as_deref()
    }

    pub fn parent_fetch_id(&self) -> Option<&str> {
        self.parent_fetch_id.as_deref()
    }

    /// W3C trace id (32 lowercase hex chars) shared by every fetch of the trace.
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Wire representation attached to every event.
    pub fn to_trace_info(&self) -> TraceInfo {
        TraceInfo {
            fetch_id: self.fetch_id.clone(),
            session_id: self.session_id.clone(),
            page_view_id: self.page_view_id.clone(),
            parent_fetch_id: self.parent_fetch_id.clone(),
        }
    }
}

/// 8 random bytes as 16 lowercase hex chars, shaped like a W3C span id.
pub fn generate_fetch_id() -> String {
    random_hex(FETCH_ID_BYTES)
}

/// 16 bytes from the thread-local CSPRNG as 32 lowercase hex chars.
pub fn generate_session_id() -> String {
    random_hex(SESSION_ID_BYTES)
}

pub fn generate_trace_id() -> String {
    random_hex(TRACE_ID_BYTES)
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    loop {
        rand::thread_rng().fill_bytes(&mut bytes);
        // all-zero ids are invalid in traceparent
        if bytes.iter().any(|b| *b != 0) {
            return hex::encode(&bytes);
        }
    }
}
