// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! axum middleware opening a span per inbound request.
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/test/{num}", get(handler))
//!     .layer(axum::middleware::from_fn_with_state(reporter, tracelink::middleware::track_request));
//! ```
//!
//! Requests carrying the recursion marker run untouched inside a suppressed
//! scope, so neither a span nor logs are recorded for them. A request whose
//! future is dropped before the handler answers (client disconnect, timeout)
//! is recorded with status 499. Requests that matched no route are recorded
//! under the `Unknown` pattern.

use axum::extract::{FromRequestParts, MatchedPath, RawPathParams, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use http::header::{HeaderValue, SET_COOKIE};
use tracing::debug;

use crate::ambient;
use crate::propagation::cookie::{self, SESSION_COOKIE};
use crate::reporter::Reporter;
use crate::span::{ServerAction, UNKNOWN};

pub async fn track_request(
    State(reporter): State<Reporter>,
    request: Request,
    next: Next,
) -> Response {
    if !reporter.is_enabled() {
        return next.run(request).await;
    }
    if reporter.is_recursive(request.headers()) {
        return ambient::suppressed(next.run(request)).await;
    }

    let cookies = cookie::from_headers(request.headers());
    let has_session_cookie = cookies.get(SESSION_COOKIE).is_some_and(|v| !v.is_empty());
    let context = reporter.extract_context(request.headers(), &cookies);
    let session_id = context.session_id().to_string();

    let Some(span) = reporter.start_span(ServerAction::new(context)) else {
        return next.run(request).await;
    };
    let cancel_guard = span.cancel_guard();

    let method = request.method().as_str().to_string();
    let raw_path = request.uri().path().to_string();
    let path_pattern = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| UNKNOWN.to_string(), |path| path.as_str().to_string());

    let (mut parts, body) = request.into_parts();
    let params: Vec<(String, String)> = match RawPathParams::from_request_parts(&mut parts, &()).await {
        Ok(params) => params
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
        Err(e) => {
            debug!("TRACELINK | No path params for {raw_path}: {e}");
            Vec::new()
        }
    };
    let request = Request::from_parts(parts, body);
    span.update_method_and_paths(&method, &path_pattern, params, &raw_path);

    let mut response = span.in_scope(next.run(request)).await;

    let status = response.status();
    span.set_status_code(status.as_u16());
    if status.is_server_error() {
        span.set_error(status);
    } else {
        span.set_ok();
    }
    span.end();
    drop(cancel_guard);

    if !has_session_cookie {
        match HeaderValue::from_str(&cookie::session_set_cookie(&session_id)) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => debug!("TRACELINK | Unable to set the session cookie: {e}"),
        }
    }

    response
}
