// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Span lifecycle.
//!
//! A [`Span`] frames one unit of work (an inbound request or RPC). It is opened
//! with provisional method and path, accumulates attributes while open, and is
//! closed exactly once by [`Span::end`], which queues the finished span for
//! delivery.
//!
//! ```text
//!   Open ──end()──> Closed
//!    │                │
//!    └ mutators       └ mutators and end() are no-ops
//! ```

use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use tracelink_proto::{self as proto, event, Event};
use tracing::debug;

use crate::ambient::{ContextGuard, Scope, WithContext};
use crate::context::RequestContext;
use crate::error::Error;
use crate::pending::PendingEvents;

/// Placeholder used before routing has resolved the real method and path.
pub const UNKNOWN: &str = "Unknown";

/// Status code recorded for work abandoned before completion (client went
/// away, timeout, call cancelled).
pub const CANCELLED_STATUS_CODE: u16 = 499;

/// Describes the unit of work a span is opened for.
#[derive(Debug, Clone)]
pub struct ServerAction {
    pub context: RequestContext,
    pub method: String,
    pub path_pattern: String,
    pub raw_path: String,
    pub params: Vec<(String, String)>,
}

impl ServerAction {
    /// An action with provisional `Unknown` method and paths.
    pub fn new(context: RequestContext) -> Self {
        Self {
            context,
            method: UNKNOWN.to_string(),
            path_pattern: UNKNOWN.to_string(),
            raw_path: UNKNOWN.to_string(),
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    #[must_use]
    pub fn path_pattern(mut self, path_pattern: impl Into<String>) -> Self {
        self.path_pattern = path_pattern.into();
        self
    }

    #[must_use]
    pub fn raw_path(mut self, raw_path: impl Into<String>) -> Self {
        self.raw_path = raw_path.into();
        self
    }

    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpanStatus {
    #[default]
    Unset,
    Ok,
    Error,
}

impl From<SpanStatus> for proto::SpanStatus {
    fn from(status: SpanStatus) -> Self {
        match status {
            SpanStatus::Unset => proto::SpanStatus::Unset,
            SpanStatus::Ok => proto::SpanStatus::Ok,
            SpanStatus::Error => proto::SpanStatus::Error,
        }
    }
}

/// Identity of the logged-in user the request was made for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub id: Option<String>,
    pub name: Option<String>,
}

impl UserInfo {
    pub fn new(id: Option<String>, name: Option<String>) -> Self {
        Self { id, name }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Str(String),
    Int(i64),
    Double(f64),
    Bool(bool),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Str(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Str(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Int(i64::from(value))
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Double(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<&AttributeValue> for proto::attribute::Value {
    fn from(value: &AttributeValue) -> Self {
        match value {
            AttributeValue::Str(v) => proto::attribute::Value::StrVal(v.clone()),
            AttributeValue::Int(v) => proto::attribute::Value::IntVal(*v),
            AttributeValue::Double(v) => proto::attribute::Value::DoubleVal(*v),
            AttributeValue::Bool(v) => proto::attribute::Value::BoolVal(*v),
        }
    }
}

#[derive(Debug)]
struct SpanState {
    method: String,
    path_pattern: String,
    raw_path: String,
    params: Vec<(String, String)>,
    status_code: Option<i32>,
    start_time: SystemTime,
    started: Instant,
    /// Set once by `end()`; its presence means the span is closed.
    elapsed: Option<Duration>,
    attributes: Vec<(String, AttributeValue)>,
    status: SpanStatus,
    error: Option<String>,
    user: Option<UserInfo>,
}

impl SpanState {
    fn to_fetch(&self) -> proto::Fetch {
        let end_time = self.elapsed.map(|elapsed| self.start_time + elapsed);
        let user = self.user.clone().unwrap_or_default();

        proto::Fetch {
            method: self.method.clone(),
            path: Some(proto::Path {
                pattern: self.path_pattern.clone(),
                params: self
                    .params
                    .iter()
                    .map(|(name, value)| proto::Param {
                        param_name: name.clone(),
                        arg_value: value.clone(),
                    })
                    .collect(),
            }),
            raw_path: self.raw_path.clone(),
            request_duration: self
                .elapsed
                .and_then(|elapsed| proto::Duration::try_from(elapsed).ok()),
            status_code: self.status_code,
            start_time: Some(proto::Timestamp::from(self.start_time)),
            end_time: end_time.map(proto::Timestamp::from),
            status: proto::SpanStatus::from(self.status) as i32,
            error_message: self.error.clone(),
            attributes: self
                .attributes
                .iter()
                .map(|(key, value)| proto::Attribute {
                    key: key.clone(),
                    value: Some(value.into()),
                })
                .collect(),
            logged_in_id: user.id,
            logged_in_name: user.name,
        }
    }
}

#[derive(Debug)]
struct SpanInner {
    context: RequestContext,
    state: Mutex<SpanState>,
    pending: Arc<PendingEvents>,
}

/// Handle to an open or closed span. Clones share the same span.
#[derive(Debug, Clone)]
pub struct Span {
    inner: Arc<SpanInner>,
}

impl Span {
    pub(crate) fn start(action: ServerAction, pending: Arc<PendingEvents>) -> Self {
        let state = SpanState {
            method: action.method.to_lowercase(),
            path_pattern: action.path_pattern,
            raw_path: action.raw_path,
            params: action.params,
            status_code: None,
            start_time: SystemTime::now(),
            started: Instant::now(),
            elapsed: None,
            attributes: Vec::new(),
            status: SpanStatus::Unset,
            error: None,
            user: None,
        };

        Self {
            inner: Arc::new(SpanInner {
                context: action.context,
                state: Mutex::new(state),
                pending,
            }),
        }
    }

    pub fn context(&self) -> &RequestContext {
        &self.inner.context
    }

    /// Replaces the provisional method, route pattern, params and raw path. The
    /// method is stored lower-cased; params replace the previous set as a whole.
    pub fn update_method_and_paths<I, K, V>(
        &self,
        method: &str,
        path_pattern: &str,
        params: I,
        raw_path: &str,
    ) where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let params: Vec<(String, String)> = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.mutate("update_method_and_paths", |state| {
            state.method = method.to_lowercase();
            state.path_pattern = path_pattern.to_string();
            state.raw_path = raw_path.to_string();
            state.params = params;
        });
    }

    pub fn set_status_code(&self, status_code: u16) {
        self.mutate("set_status_code", |state| {
            state.status_code = Some(i32::from(status_code));
        });
    }

    pub fn set_error(&self, error: impl Display) {
        let message = error.to_string();
        self.mutate("set_error", |state| {
            state.status = SpanStatus::Error;
            state.error = Some(message);
        });
    }

    pub fn set_ok(&self) {
        self.mutate("set_ok", |state| state.status = SpanStatus::Ok);
    }

    /// Sets a custom attribute, replacing any previous value for `key`.
    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        let key = key.into();
        let value = value.into();
        self.mutate("set_attribute", |state| {
            match state.attributes.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => state.attributes.push((key, value)),
            }
        });
    }

    /// Sets the logged-in user. Absent fields keep their previous value.
    pub fn set_user(&self, user: UserInfo) {
        self.mutate("set_user", |state| {
            let current = state.user.get_or_insert_with(UserInfo::default);
            if user.id.is_some() {
                current.id = user.id;
            }
            if user.name.is_some() {
                current.name = user.name;
            }
        });
    }

    /// Closes the span and queues it for delivery. Calling it again is a no-op.
    pub fn end(&self) {
        if self.try_end().is_err() {
            debug!(
                "TRACELINK | Span {} was already ended, ignoring end()",
                self.inner.context.fetch_id()
            );
        }
    }

    /// Like [`Span::end`], but reports a second call as an error.
    pub fn try_end(&self) -> Result<(), Error> {
        let fetch = {
            let mut state = self.lock();
            if state.elapsed.is_some() {
                return Err(Error::SpanAlreadyEnded);
            }
            state.elapsed = Some(state.started.elapsed());
            state.to_fetch()
        };

        self.inner.pending.push(Event {
            trace_info: Some(self.inner.context.to_trace_info()),
            payload: Some(event::Payload::Fetch(fetch)),
        });
        Ok(())
    }

    pub fn is_ended(&self) -> bool {
        self.lock().elapsed.is_some()
    }

    pub fn status(&self) -> SpanStatus {
        self.lock().status
    }

    /// Wire representation of the span in its current state.
    pub fn to_fetch(&self) -> proto::Fetch {
        self.lock().to_fetch()
    }

    /// Makes this span and its context current on this thread until the guard
    /// drops.
    pub fn make_current(&self) -> ContextGuard {
        Scope::with_span(self.clone()).enter()
    }

    /// Runs `future` with this span current on every poll.
    pub fn in_scope<F: Future>(&self, future: F) -> WithContext<F> {
        WithContext::new(future, Scope::with_span(self.clone()))
    }

    /// Guard ending this span with [`CANCELLED_STATUS_CODE`] if it is dropped
    /// while the span is still open, e.g. when the request future is dropped.
    pub fn cancel_guard(&self) -> CancelGuard {
        CancelGuard { span: self.clone() }
    }

    fn mutate(&self, operation: &str, f: impl FnOnce(&mut SpanState)) {
        let mut state = self.lock();
        if state.elapsed.is_some() {
            debug!(
                "TRACELINK | Ignoring {operation} on ended span {}",
                self.inner.context.fetch_id()
            );
            return;
        }
        f(&mut state);
    }

    fn lock(&self) -> MutexGuard<'_, SpanState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// See [`Span::cancel_guard`].
#[must_use = "the span is ended as cancelled as soon as the guard is dropped"]
#[derive(Debug)]
pub struct CancelGuard {
    span: Span,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if self.span.is_ended() {
            return;
        }
        debug!(
            "TRACELINK | Span {} dropped before completion, ending as cancelled",
            self.span.context().fetch_id()
        );
        self.span.set_status_code(CANCELLED_STATUS_CODE);
        self.span.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ambient;

    fn test_span() -> (Span, Arc<PendingEvents>) {
        let pending = Arc::new(PendingEvents::new());
        let context = RequestContext::new("hi1", "hi2").unwrap();
        let span = Span::start(ServerAction::new(context), Arc::clone(&pending));
        (span, pending)
    }

    fn queued_fetch(pending: &PendingEvents) -> proto::Fetch {
        let events = pending.snapshot();
        assert_eq!(events.len(), 1);
        match events[0].payload.clone() {
            Some(event::Payload::Fetch(fetch)) => fetch,
            other => panic!("expected a fetch, got {other:?}"),
        }
    }

    #[test]
    fn test_span_scenario() {
        let pending = Arc::new(PendingEvents::new());
        let context = RequestContext::new("hi1", "hi2").unwrap();
        let span = Span::start(
            ServerAction::new(context)
                .method("GET")
                .path_pattern("/test/{num}")
                .raw_path("/test/1")
                .param("num", "1"),
            Arc::clone(&pending),
        );
        span.set_status_code(200);
        span.end();

        let fetch = queued_fetch(&pending);
        assert_eq!(fetch.method, "get");
        assert_eq!(fetch.raw_path, "/test/1");
        let path = fetch.path.as_ref().unwrap();
        assert_eq!(path.pattern, "/test/{num}");
        assert_eq!(path.params.len(), 1);
        assert_eq!(path.params[0].param_name, "num");
        assert_eq!(path.params[0].arg_value, "1");
        assert_eq!(fetch.status_code, Some(200));
        assert_eq!(fetch.status(), proto::SpanStatus::Unset);

        let start = fetch.start_time.unwrap();
        let end = fetch.end_time.unwrap();
        assert!((end.seconds, end.nanos) >= (start.seconds, start.nanos));
        assert!(fetch.request_duration.is_some());
    }

    #[test]
    fn test_set_ok_marks_status() {
        let (span, pending) = test_span();
        span.set_ok();
        span.end();

        assert_eq!(queued_fetch(&pending).status(), proto::SpanStatus::Ok);
    }

    #[test]
    fn test_set_error() {
        let (span, pending) = test_span();
        span.set_error("boom");
        span.end();

        let fetch = queued_fetch(&pending);
        assert_eq!(fetch.status(), proto::SpanStatus::Error);
        assert_eq!(fetch.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_update_method_and_paths_overwrites_provisional_values() {
        let (span, pending) = test_span();
        assert_eq!(span.to_fetch().method, "unknown");

        span.update_method_and_paths("POST", "/users/{id}", [("id", "7")], "/users/7");
        span.update_method_and_paths("PUT", "/items/{sku}", [("sku", "x")], "/items/x");
        span.end();

        let fetch = queued_fetch(&pending);
        assert_eq!(fetch.method, "put");
        assert_eq!(fetch.raw_path, "/items/x");
        let path = fetch.path.as_ref().unwrap();
        assert_eq!(path.pattern, "/items/{sku}");
        assert_eq!(path.params.len(), 1);
        assert_eq!(path.params[0].param_name, "sku");
    }

    #[test]
    fn test_double_end_is_idempotent() {
        let (span, pending) = test_span();
        span.end();
        span.end();

        assert_eq!(pending.len(), 1);
        assert!(span.is_ended());
        assert!(matches!(span.try_end(), Err(Error::SpanAlreadyEnded)));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_cancel_guard_ends_open_span() {
        let (span, pending) = test_span();
        drop(span.cancel_guard());

        assert!(span.is_ended());
        let fetch = queued_fetch(&pending);
        assert_eq!(fetch.status_code, Some(499));
        assert_eq!(fetch.status(), proto::SpanStatus::Unset);
    }

    #[test]
    fn test_cancel_guard_leaves_ended_span_alone() {
        let (span, pending) = test_span();
        let guard = span.cancel_guard();
        span.set_status_code(200);
        span.end();
        drop(guard);

        assert_eq!(pending.len(), 1);
        assert_eq!(queued_fetch(&pending).status_code, Some(200));
    }

    #[test]
    fn test_mutators_after_end_are_ignored() {
        let (span, pending) = test_span();
        span.end();

        span.set_status_code(500);
        span.set_error("late");
        span.set_attribute("late", true);
        span.update_method_and_paths("GET", "/late", Vec::<(String, String)>::new(), "/late");

        let fetch = span.to_fetch();
        assert_eq!(fetch.status_code, None);
        assert_eq!(fetch.status(), proto::SpanStatus::Unset);
        assert!(fetch.attributes.is_empty());
        assert_eq!(fetch.raw_path, UNKNOWN);
        assert_eq!(queued_fetch(&pending), fetch);
    }

    #[test]
    fn test_attributes_and_user() {
        let (span, pending) = test_span();
        span.set_attribute("retries", 2);
        span.set_attribute("ratio", 0.25);
        span.set_attribute("retries", 3);
        span.set_user(UserInfo::new(Some("u1".to_string()), None));
        span.set_user(UserInfo::new(None, Some("Ada".to_string())));
        span.end();

        let fetch = queued_fetch(&pending);
        assert_eq!(fetch.attributes.len(), 2);
        assert_eq!(
            fetch.attributes[0].value,
            Some(proto::attribute::Value::IntVal(3))
        );
        assert_eq!(
            fetch.attributes[1].value,
            Some(proto::attribute::Value::DoubleVal(0.25))
        );
        assert_eq!(fetch.logged_in_id.as_deref(), Some("u1"));
        assert_eq!(fetch.logged_in_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_queued_event_carries_context() {
        let (span, pending) = test_span();
        span.end();

        let info = pending.snapshot()[0].trace_info.clone().unwrap();
        assert_eq!(info.fetch_id, "hi1");
        assert_eq!(info.session_id, "hi2");
    }

    #[test]
    fn test_make_current() {
        let (span, _pending) = test_span();
        {
            let _guard = span.make_current();
            assert_eq!(ambient::current().unwrap().fetch_id(), "hi1");
            assert_eq!(ambient::current_span().unwrap().context().fetch_id(), "hi1");
        }
        assert!(ambient::current().is_none());
    }

    #[tokio::test]
    async fn test_in_scope() {
        let (span, _pending) = test_span();
        let fetch_id = span
            .in_scope(async { ambient::current().map(|c| c.fetch_id().to_string()) })
            .await;

        assert_eq!(fetch_id.as_deref(), Some("hi1"));
    }
}
