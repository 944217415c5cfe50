// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Tower layer opening a span per inbound gRPC call.
//!
//! ```ignore
//! tonic::transport::Server::builder()
//!     .layer(TracelinkGrpcLayer::new(reporter.clone()))
//!     .add_service(GreeterServer::new(greeter))
//!     .serve(addr)
//!     .await?;
//! ```
//!
//! Spans use the method `grpc` and the full method name
//! (`package.Service/Method`) as both pattern and raw path. A call is ok (200)
//! when the service answers with `grpc-status` 0 or none in its headers, and
//! an error (500) when the service fails or answers with a non-zero status.
//! Status codes sent in trailers of streamed bodies are not inspected. A call
//! dropped before it answers is recorded with status 499.

use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use http::{HeaderMap, Request, Response};

use crate::ambient;
use crate::propagation::cookie;
use crate::reporter::Reporter;
use crate::span::{ServerAction, UNKNOWN};

pub const GRPC_METHOD: &str = "grpc";

const GRPC_STATUS_HEADER: &str = "grpc-status";
const GRPC_MESSAGE_HEADER: &str = "grpc-message";

#[derive(Debug, Clone)]
pub struct TracelinkGrpcLayer {
    reporter: Reporter,
}

impl TracelinkGrpcLayer {
    pub fn new(reporter: Reporter) -> Self {
        Self { reporter }
    }
}

impl<S> tower::Layer<S> for TracelinkGrpcLayer {
    type Service = TracelinkGrpcService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracelinkGrpcService {
            inner,
            reporter: self.reporter.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TracelinkGrpcService<S> {
    inner: S,
    reporter: Reporter,
}

/// `package.Service/Method` from a gRPC request path.
fn full_method_name(path: &str) -> String {
    match path.trim_start_matches('/') {
        "" => UNKNOWN.to_string(),
        name => name.to_string(),
    }
}

/// A non-zero `grpc-status` with its message, if the response carries one.
fn grpc_failure(headers: &HeaderMap) -> Option<String> {
    let code = headers.get(GRPC_STATUS_HEADER)?.to_str().ok()?.trim();
    if code == "0" {
        return None;
    }
    let message = headers
        .get(GRPC_MESSAGE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| urlencoding::decode(value).map_or_else(|_| value.to_string(), |v| v.into_owned()))
        .unwrap_or_default();
    Some(format!("grpc-status {code}: {message}"))
}

impl<S, ReqBody, ResBody> tower::Service<Request<ReqBody>> for TracelinkGrpcService<S>
where
    S: tower::Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: Display + Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        if !self.reporter.is_enabled() {
            return Box::pin(self.inner.call(request));
        }
        if self.reporter.is_recursive(request.headers()) {
            let future = {
                let _guard = ambient::suppress();
                self.inner.call(request)
            };
            return Box::pin(ambient::suppressed(future));
        }

        let name = full_method_name(request.uri().path());
        let cookies = cookie::from_headers(request.headers());
        let context = self.reporter.extract_context(request.headers(), &cookies);
        let action = ServerAction::new(context)
            .method(GRPC_METHOD)
            .path_pattern(name.as_str())
            .raw_path(name);
        let Some(span) = self.reporter.start_span(action) else {
            return Box::pin(self.inner.call(request));
        };
        let cancel_guard = span.cancel_guard();

        let future = {
            let _guard = span.make_current();
            self.inner.call(request)
        };
        let future = span.in_scope(future);

        Box::pin(async move {
            let result = future.await;
            match &result {
                Ok(response) => match grpc_failure(response.headers()) {
                    Some(failure) => {
                        span.set_status_code(500);
                        span.set_error(failure);
                    }
                    None => {
                        span.set_status_code(200);
                        span.set_ok();
                    }
                },
                Err(e) => {
                    span.set_status_code(500);
                    span.set_error(e);
                }
            }
            span.end();
            drop(cancel_guard);
            result
        })
    }
}
