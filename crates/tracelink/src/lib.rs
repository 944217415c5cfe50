// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # tracelink
//!
//! Client-side telemetry core embedded in server applications. It attributes
//! incoming requests to a distributed trace, records structured log events
//! against that trace, and ships both to a remote ingestion endpoint with an
//! at-least-once guarantee.
//!
//! ## Architecture
//!
//! ```text
//!   inbound headers/cookies
//!          │
//!          v
//!   ┌──────────────┐     ┌──────────────┐
//!   │  Propagator  │────>│     Span     │──┐
//!   └──────────────┘     └──────────────┘  │ end()
//!                                          v
//!   application logs ──> record_log ──> PendingEvents
//!                                          │ snapshot
//!                                          v
//!                                    ┌──────────┐
//!                                    │ Flusher  │ (fixed interval, one in flight)
//!                                    └────┬─────┘
//!                                         v
//!                                    Transport (PUT /api/ingest/be)
//! ```
//!
//! - [`propagation`]: extracts a [`RequestContext`] from inbound signals and
//!   injects headers into outbound calls, including the recursion guard
//! - [`span`]: the open/closed lifecycle of one unit of work
//! - [`ambient`]: scoped "current request" storage for code that cannot
//!   receive the context explicitly
//! - [`pending`] and [`flusher`]: the buffer and the delivery protocol
//! - [`reporter`]: the service object adapters talk to
//! - [`middleware`], [`grpc`], [`outbound`], [`layer`]: axum, tower/gRPC,
//!   reqwest and `tracing` adapters built on the reporter

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod ambient;
pub mod config;
pub mod context;
pub mod error;
pub mod flusher;
pub mod grpc;
pub mod layer;
pub mod log;
pub mod logger;
pub mod middleware;
pub mod outbound;
pub mod pending;
pub mod propagation;
pub mod reporter;
pub mod span;
pub mod transport;

pub use config::Config;
pub use context::RequestContext;
pub use error::Error;
pub use flusher::{FlushOutcome, Flusher};
pub use grpc::TracelinkGrpcLayer;
pub use log::{LogArgValue, LogArgument, LogRecord, Severity};
pub use reporter::Reporter;
pub use span::{CancelGuard, ServerAction, Span, SpanStatus, UserInfo};
pub use transport::{HttpTransport, Transport, TransportError};

/// Library name sent in the `User-Agent` of ingestion calls.
pub const LIBRARY_NAME: &str = "tracelink-rust";

/// Library version sent in the `User-Agent` of ingestion calls.
pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");
