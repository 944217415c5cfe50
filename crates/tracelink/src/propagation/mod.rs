// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Request context propagation.
//!
//! Inbound, [`Propagator::extract`] turns request headers and cookies into a
//! [`RequestContext`]. Outbound, [`Propagator::inject`] writes the headers that
//! let the downstream service attribute its own fetch to the same session and
//! to the calling fetch.
//!
//! # Headers
//!
//! ```text
//! x-tracelink-sessionid:      browser session
//! x-tracelink-parentfetchid:  fetch that issued this request
//! x-tracelink-pageviewid:     page view that issued this request
//! x-tracelink-recursive:      set on the reporter's own ingestion calls
//! traceparent:                W3C trace context
//! baggage:                    W3C baggage, `tracelink.sessionId` member
//! ```
//!
//! The session id is resolved from the session header, then the
//! `tracelinksession` cookie, then baggage, and is generated when all are absent.

use http::HeaderMap;
use tracing::debug;

use crate::context::{generate_fetch_id, generate_session_id, generate_trace_id, RequestContext};
use carrier::{Extractor, Injector};
use cookie::SESSION_COOKIE;
use traceparent::{Traceparent, TRACEPARENT_KEY};

pub mod baggage;
pub mod carrier;
pub mod cookie;
pub mod error;
pub mod traceparent;

pub const SESSION_ID_HEADER: &str = "x-tracelink-sessionid";
pub const PARENT_FETCH_ID_HEADER: &str = "x-tracelink-parentfetchid";
pub const PAGE_VIEW_ID_HEADER: &str = "x-tracelink-pageviewid";
pub const RECURSIVE_HEADER: &str = "x-tracelink-recursive";
pub const SESSION_BAGGAGE_KEY: &str = "tracelink.sessionId";

#[derive(Debug, Clone, Copy, Default)]
pub struct Propagator;

impl Propagator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Builds the context of an inbound request. A fresh fetch id is generated
    /// for every call; malformed headers are treated as absent.
    pub fn extract(&self, headers: &dyn Extractor, cookies: &dyn Extractor) -> RequestContext {
        let traceparent = headers
            .get(TRACEPARENT_KEY)
            .and_then(|value| match traceparent::parse(value) {
                Ok(tp) => Some(tp),
                Err(e) => {
                    debug!("TRACELINK | {e}");
                    None
                }
            });

        let session_id = present(headers.get(SESSION_ID_HEADER))
            .or_else(|| present(cookies.get(SESSION_COOKIE)))
            .or_else(|| {
                headers
                    .get(baggage::BAGGAGE_KEY)
                    .and_then(|header| baggage::get(header, SESSION_BAGGAGE_KEY))
                    .filter(|id| !id.trim().is_empty())
            })
            .unwrap_or_else(generate_session_id);

        let parent_fetch_id = present(headers.get(PARENT_FETCH_ID_HEADER)).or_else(|| {
            traceparent
                .as_ref()
                .map(|tp: &Traceparent| tp.parent_id.clone())
        });

        let trace_id = traceparent.map_or_else(generate_trace_id, |tp| tp.trace_id);

        RequestContext::from_ids(generate_fetch_id(), session_id)
            .with_page_view_id(present(headers.get(PAGE_VIEW_ID_HEADER)))
            .with_parent_fetch_id(parent_fetch_id)
            .with_trace_id(Some(trace_id))
    }

    /// Whether the request was sent by a reporter delivering telemetry. Such
    /// requests must not be instrumented.
    pub fn is_recursive(&self, headers: &dyn Extractor) -> bool {
        headers.get(RECURSIVE_HEADER).map(str::trim).is_some_and(|value| {
            !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
        })
    }

    /// Writes the propagation headers for a call made while handling `context`.
    /// The current fetch becomes the parent of the downstream one.
    pub fn inject(&self, context: &RequestContext, carrier: &mut dyn Injector) {
        carrier.set(SESSION_ID_HEADER, context.session_id().to_string());
        carrier.set(PARENT_FETCH_ID_HEADER, context.fetch_id().to_string());
        if let Some(page_view_id) = context.page_view_id() {
            carrier.set(PAGE_VIEW_ID_HEADER, page_view_id.to_string());
        }
        carrier.set(
            baggage::BAGGAGE_KEY,
            baggage::member(SESSION_BAGGAGE_KEY, context.session_id()),
        );

        if let Some(trace_id) = context.trace_id() {
            match traceparent::format(trace_id, context.fetch_id(), true) {
                Some(value) => carrier.set(TRACEPARENT_KEY, value),
                None => debug!(
                    "TRACELINK | {}",
                    error::Error::inject("ids are not W3C shaped", TRACEPARENT_KEY)
                ),
            }
        }
    }

    pub fn headers(&self, context: &RequestContext) -> HeaderMap {
        let mut headers = HeaderMap::new();
        self.inject(context, &mut headers);
        headers
    }
}

fn present(value: Option<&str>) -> Option<String> {
    value
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
}
