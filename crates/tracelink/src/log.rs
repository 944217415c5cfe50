// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Structured log events recorded against a request.

use std::fmt::{self, Write as _};
use std::str::FromStr;
use std::time::SystemTime;

use serde_json::Value;
use tracelink_proto::{self as proto, event, log_arg, Event};
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            _ => Err(Error::UnknownSeverity(s.to_string())),
        }
    }
}

impl From<Severity> for proto::LogSeverity {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Info => proto::LogSeverity::Info,
            Severity::Warn => proto::LogSeverity::Warning,
            Severity::Error => proto::LogSeverity::Error,
        }
    }
}

/// Value of a template argument. Integers and floats stay distinct on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum LogArgValue {
    Str(String),
    Int(i64),
    Double(f64),
}

impl From<&str> for LogArgValue {
    fn from(value: &str) -> Self {
        LogArgValue::Str(value.to_string())
    }
}

impl From<String> for LogArgValue {
    fn from(value: String) -> Self {
        LogArgValue::Str(value)
    }
}

impl From<i64> for LogArgValue {
    fn from(value: i64) -> Self {
        LogArgValue::Int(value)
    }
}

impl From<i32> for LogArgValue {
    fn from(value: i32) -> Self {
        LogArgValue::Int(i64::from(value))
    }
}

impl From<f64> for LogArgValue {
    fn from(value: f64) -> Self {
        LogArgValue::Double(value)
    }
}

/// Scalars only: strings, numbers and booleans (recorded as `"true"`/`"false"`).
impl TryFrom<&Value> for LogArgValue {
    type Error = Error;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(s) => Ok(LogArgValue::Str(s.clone())),
            Value::Number(n) => n
                .as_i64()
                .map(LogArgValue::Int)
                .or_else(|| n.as_f64().map(LogArgValue::Double))
                .ok_or_else(|| Error::UnsupportedArgument(format!("number {n} out of range"))),
            Value::Bool(b) => Ok(LogArgValue::Str(b.to_string())),
            Value::Null => Err(Error::UnsupportedArgument("null".to_string())),
            Value::Array(_) => Err(Error::UnsupportedArgument("array".to_string())),
            Value::Object(_) => Err(Error::UnsupportedArgument("object".to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogArgument {
    pub name: String,
    pub value: LogArgValue,
}

impl LogArgument {
    pub fn new(name: impl Into<String>, value: impl Into<LogArgValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    fn to_proto(&self) -> proto::LogArg {
        let value = match &self.value {
            LogArgValue::Str(v) => log_arg::Value::StrVal(v.clone()),
            LogArgValue::Int(v) => log_arg::Value::IntVal(*v),
            LogArgValue::Double(v) => log_arg::Value::DoubleVal(*v),
        };
        proto::LogArg {
            param_name: self.name.clone(),
            value: Some(value),
        }
    }
}

/// A log line as handed to the reporter. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    severity: Severity,
    message_template: String,
    message: String,
    stack_trace: Option<String>,
    args: Vec<LogArgument>,
    time: SystemTime,
}

impl LogRecord {
    pub fn builder() -> LogRecordBuilder {
        LogRecordBuilder::default()
    }

    /// A record whose template is the message itself, timestamped now.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            severity,
            message_template: message.clone(),
            message,
            stack_trace: None,
            args: Vec::new(),
            time: SystemTime::now(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message_template(&self) -> &str {
        &self.message_template
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stack_trace(&self) -> Option<&str> {
        self.stack_trace.as_deref()
    }

    pub fn args(&self) -> &[LogArgument] {
        &self.args
    }

    pub fn time(&self) -> SystemTime {
        self.time
    }

    /// Wire event with a fresh id, tagged with `context` when there is one.
    pub fn to_event(&self, context: Option<&RequestContext>) -> Event {
        Event {
            trace_info: context.map(RequestContext::to_trace_info),
            payload: Some(event::Payload::Log(proto::Log {
                id: Uuid::new_v4().to_string(),
                time: Some(proto::Timestamp::from(self.time)),
                log_severity: proto::LogSeverity::from(self.severity) as i32,
                message: self.message.clone(),
                message_template: self.message_template.clone(),
                stack_trace: self.stack_trace.clone(),
                log_args: self.args.iter().map(LogArgument::to_proto).collect(),
            })),
        }
    }
}

/// `error` followed by one `Caused by:` line per source.
pub(crate) fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut trace = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let _ = write!(trace, "\nCaused by: {cause}");
        source = cause.source();
    }
    trace
}

#[derive(Debug, Clone, Default)]
pub struct LogRecordBuilder {
    severity: Option<Severity>,
    message_template: Option<String>,
    message: Option<String>,
    stack_trace: Option<String>,
    args: Vec<LogArgument>,
    time: Option<SystemTime>,
}

impl LogRecordBuilder {
    #[must_use]
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Template before argument substitution, e.g. `"User {id} logged in"`.
    /// Defaults to the formatted message.
    #[must_use]
    pub fn message_template(mut self, template: impl Into<String>) -> Self {
        self.message_template = Some(template.into());
        self
    }

    /// Formatted message, e.g. `"User 7 logged in"`.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Records `error` and its chain of sources as the stack trace.
    #[must_use]
    pub fn error(mut self, error: &(dyn std::error::Error + 'static)) -> Self {
        self.stack_trace = Some(error_chain(error));
        self
    }

    #[must_use]
    pub fn stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    #[must_use]
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<LogArgValue>) -> Self {
        self.args.push(LogArgument::new(name, value));
        self
    }

    #[must_use]
    pub fn args(mut self, args: impl IntoIterator<Item = LogArgument>) -> Self {
        self.args.extend(args);
        self
    }

    #[must_use]
    pub fn time(mut self, time: SystemTime) -> Self {
        self.time = Some(time);
        self
    }

    pub fn build(self) -> Result<LogRecord, Error> {
        let severity = self.severity.ok_or(Error::MissingField {
            field: "severity",
            setter: "severity()",
        })?;
        let message = self.message.ok_or(Error::MissingField {
            field: "message",
            setter: "message()",
        })?;

        Ok(LogRecord {
            severity,
            message_template: self.message_template.unwrap_or_else(|| message.clone()),
            message,
            stack_trace: self.stack_trace,
            args: self.args,
            time: self.time.unwrap_or_else(SystemTime::now),
        })
    }
}
