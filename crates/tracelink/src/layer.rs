// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! A `tracing` layer forwarding application events to the reporter.
//!
//! ```ignore
//! tracing_subscriber::registry()
//!     .with(tracing_subscriber::fmt::layer())
//!     .with(TracelinkLayer::new(reporter.clone()))
//!     .init();
//!
//! tracing::info!(user = 7, "User logged in");
//! ```
//!
//! Every event is recorded against the ambient request context; ERROR and WARN
//! keep their severity, lower levels become info. Level filtering is left to
//! the subscriber, e.g. a per-layer `EnvFilter`. Events emitted by this crate
//! or by the HTTP stack delivering its batches are skipped, so the reporter
//! never reports on itself.

use std::fmt;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::log::{error_chain, LogArgValue, LogArgument, LogRecord, Severity};
use crate::reporter::Reporter;

/// Targets never recorded: this crate and the client stack used for delivery.
const SKIPPED_TARGETS: &[&str] = &["tracelink", "reqwest", "hyper", "hyper_util", "h2", "rustls"];

#[derive(Debug, Clone)]
pub struct TracelinkLayer {
    reporter: Reporter,
}

impl TracelinkLayer {
    pub fn new(reporter: Reporter) -> Self {
        Self { reporter }
    }
}

fn severity(level: &Level) -> Severity {
    match *level {
        Level::ERROR => Severity::Error,
        Level::WARN => Severity::Warn,
        _ => Severity::Info,
    }
}

fn is_skipped(target: &str) -> bool {
    SKIPPED_TARGETS.iter().any(|skipped| {
        target
            .strip_prefix(skipped)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

impl<S: Subscriber> Layer<S> for TracelinkLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !self.reporter.is_enabled() || is_skipped(metadata.target()) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut builder = LogRecord::builder()
            .severity(severity(metadata.level()))
            .message(visitor.message.unwrap_or_default())
            .args(visitor.args);
        if let Some(trace) = visitor.stack_trace {
            builder = builder.stack_trace(trace);
        }
        match builder.build() {
            Ok(record) => self.reporter.record_log(record),
            Err(e) => tracing::debug!("TRACELINK | Dropping tracing event: {e}"),
        }
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    args: Vec<LogArgument>,
    stack_trace: Option<String>,
}

impl FieldVisitor {
    fn push(&mut self, field: &Field, value: LogArgValue) {
        self.args.push(LogArgument::new(field.name(), value));
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            self.push(field, LogArgValue::Str(format!("{value:?}")));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.push(field, LogArgValue::from(value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, LogArgValue::Int(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        let value = i64::try_from(value).map_or_else(|_| LogArgValue::Str(value.to_string()), LogArgValue::Int);
        self.push(field, value);
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, LogArgValue::Double(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, LogArgValue::Str(value.to_string()));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, LogArgValue::Str(value.to_string()));
        self.stack_trace = Some(error_chain(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ambient;
    use crate::config::Config;
    use crate::context::RequestContext;
    use crate::transport::{Transport, TransportError};
    use async_trait::async_trait;
    use http::{HeaderMap, StatusCode};
    use std::sync::Arc;
    use tracelink_proto::event::Payload;
    use tracelink_proto::log_arg::Value;
    use tracing_subscriber::layer::SubscriberExt;

    struct NoopTransport;

    #[async_trait]
    impl Transport for NoopTransport {
        async fn send(&self, _body: Vec<u8>, _headers: HeaderMap) -> Result<StatusCode, TransportError> {
            Ok(StatusCode::OK)
        }
    }

    fn reporter() -> Reporter {
        let config = Config {
            private_key: "key".to_string(),
            version: "1".to_string(),
            system_name: "sys".to_string(),
            ..Default::default()
        };
        Reporter::new(config, Arc::new(NoopTransport)).unwrap()
    }

    fn logs(reporter: &Reporter) -> Vec<(Option<String>, tracelink_proto::Log)> {
        reporter
            .pending_snapshot()
            .into_iter()
            .filter_map(|event| match event.payload {
                Some(Payload::Log(log)) => {
                    Some((event.trace_info.map(|info| info.session_id), log))
                }
                _ => None,
            })
            .collect()
    }

    #[derive(Debug, thiserror::Error)]
    #[error("connection reset")]
    struct Reset;

    #[test]
    fn test_events_are_recorded_against_ambient_context() {
        let reporter = reporter();
        let subscriber = tracing_subscriber::registry().with(TracelinkLayer::new(reporter.clone()));

        tracing::subscriber::with_default(subscriber, || {
            let _guard = ambient::set_current(RequestContext::new("hi1", "hi2").unwrap());
            tracing::info!(target: "app", user = 7, ratio = 0.5, admin = true, "User logged in");
        });

        let logs = logs(&reporter);
        assert_eq!(logs.len(), 1);
        let (session, log) = &logs[0];
        assert_eq!(session.as_deref(), Some("hi2"));
        assert_eq!(log.message, "User logged in");
        assert_eq!(log.log_severity(), tracelink_proto::LogSeverity::Info);
        assert_eq!(log.log_args[0].param_name, "user");
        assert_eq!(log.log_args[0].value, Some(Value::IntVal(7)));
        assert_eq!(log.log_args[1].value, Some(Value::DoubleVal(0.5)));
        assert_eq!(log.log_args[2].value, Some(Value::StrVal("true".to_string())));
    }

    #[test]
    fn test_levels_map_to_severity() {
        let reporter = reporter();
        let subscriber = tracing_subscriber::registry().with(TracelinkLayer::new(reporter.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "app", "careful");
            tracing::error!(target: "app", error = &Reset as &(dyn std::error::Error + 'static), "failed");
            tracing::debug!(target: "app", "detail");
            tracing::trace!(target: "app", "more detail");
        });

        let logs = logs(&reporter);
        assert_eq!(logs.len(), 4);
        assert_eq!(logs[0].1.log_severity(), tracelink_proto::LogSeverity::Warning);
        assert_eq!(logs[1].1.log_severity(), tracelink_proto::LogSeverity::Error);
        assert_eq!(logs[1].1.stack_trace.as_deref(), Some("connection reset"));
        assert_eq!(logs[2].1.log_severity(), tracelink_proto::LogSeverity::Info);
        assert_eq!(logs[3].1.log_severity(), tracelink_proto::LogSeverity::Info);
        assert!(logs[0].0.is_none());
    }

    #[test]
    fn test_http_stack_events_are_skipped() {
        let reporter = reporter();
        let subscriber = tracing_subscriber::registry().with(TracelinkLayer::new(reporter.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "hyper_util::client::legacy", "connection error");
            tracing::debug!(target: "h2::codec", "frame");
            tracing::info!(target: "hyperdrive", "not the http stack");
        });

        let logs = logs(&reporter);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].1.message, "not the http stack");
    }

    #[test]
    fn test_own_events_are_skipped() {
        let reporter = reporter();
        let subscriber = tracing_subscriber::registry().with(TracelinkLayer::new(reporter.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(target: "tracelink::flusher", "TRACELINK | Failed to send");
        });

        assert_eq!(reporter.pending_len(), 0);
    }

    #[test]
    fn test_suppressed_scope_records_nothing() {
        let reporter = reporter();
        let subscriber = tracing_subscriber::registry().with(TracelinkLayer::new(reporter.clone()));

        tracing::subscriber::with_default(subscriber, || {
            let _guard = ambient::suppress();
            tracing::info!(target: "app", "inside a recursive request");
        });

        assert_eq!(reporter.pending_len(), 0);
    }
}
