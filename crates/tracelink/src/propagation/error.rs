// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Errors raised while decoding propagation headers.
//!
//! They never reach callers of [`super::Propagator::extract`]: a malformed header
//! is logged and treated as absent, so the request still gets a usable context.

use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
#[error("Cannot {} {}: {}", operation, header, message)]
pub struct Error {
    message: &'static str,
    header: &'static str,
    operation: &'static str,
}

impl Error {
    #[must_use]
    pub fn extract(message: &'static str, header: &'static str) -> Self {
        Self {
            message,
            header,
            operation: "extract",
        }
    }

    #[must_use]
    pub fn inject(message: &'static str, header: &'static str) -> Self {
        Self {
            message,
            header,
            operation: "inject",
        }
    }
}
