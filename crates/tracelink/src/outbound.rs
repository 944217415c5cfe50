// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Propagation for outbound reqwest calls.
//!
//! ```ignore
//! let response = client
//!     .get("http://inventory/items")
//!     .with_tracelink(&reporter)
//!     .send()
//!     .await?;
//! ```

use http::HeaderMap;
use reqwest::RequestBuilder;

use crate::context::RequestContext;
use crate::reporter::Reporter;

/// Adds propagation headers for the ambient context. Leaves the request
/// untouched when there is none or when monitoring is disabled.
pub fn inject_reqwest(reporter: &Reporter, builder: RequestBuilder) -> RequestBuilder {
    let headers = reporter.propagation_headers();
    if headers.is_empty() {
        return builder;
    }
    builder.headers(headers)
}

pub fn inject_reqwest_with_context(
    reporter: &Reporter,
    context: &RequestContext,
    builder: RequestBuilder,
) -> RequestBuilder {
    let mut headers = HeaderMap::new();
    reporter.inject_headers(context, &mut headers);
    if headers.is_empty() {
        return builder;
    }
    builder.headers(headers)
}

pub trait RequestBuilderExt {
    #[must_use]
    fn with_tracelink(self, reporter: &Reporter) -> Self;

    #[must_use]
    fn with_tracelink_context(self, reporter: &Reporter, context: &RequestContext) -> Self;
}

impl RequestBuilderExt for RequestBuilder {
    fn with_tracelink(self, reporter: &Reporter) -> Self {
        inject_reqwest(reporter, self)
    }

    fn with_tracelink_context(self, reporter: &Reporter, context: &RequestContext) -> Self {
        inject_reqwest_with_context(reporter, context, self)
    }
}
