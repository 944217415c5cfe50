// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Protobuf models for the tracelink ingestion endpoint.
//!
//! The message types mirror `proto/tracelink/ingest.proto` and are derived with
//! `prost` directly, so building the crate does not need `protoc`. Keep the tags
//! in sync with the schema file when either side changes.

pub use prost::Message;
pub use prost_types::{Duration, Timestamp};

/// Body of a single ingestion call: the batch of events plus the identity of the
/// reporting system.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SendBackendEventsRequest {
    #[prost(message, repeated, tag = "1")]
    pub events: Vec<Event>,
    #[prost(message, optional, tag = "2")]
    pub info: Option<BackEndInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BackEndInfo {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub version: String,
}

/// One buffered telemetry event, either a log line or a finished fetch.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Event {
    #[prost(message, optional, tag = "1")]
    pub trace_info: Option<TraceInfo>,
    #[prost(oneof = "event::Payload", tags = "2, 3")]
    pub payload: Option<event::Payload>,
}

pub mod event {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "2")]
        Log(super::Log),
        #[prost(message, tag = "3")]
        Fetch(super::Fetch),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TraceInfo {
    #[prost(string, tag = "1")]
    pub fetch_id: String,
    #[prost(string, tag = "2")]
    pub session_id: String,
    #[prost(string, optional, tag = "3")]
    pub page_view_id: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub parent_fetch_id: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum LogSeverity {
    Unspecified = 0,
    Info = 1,
    Warning = 2,
    Error = 3,
}

impl LogSeverity {
    /// Name of the value as written in the schema file.
    pub fn as_str_name(&self) -> &'static str {
        match self {
            LogSeverity::Unspecified => "UNSPECIFIED_LOG_SEVERITY",
            LogSeverity::Info => "INFO_LOG_SEVERITY",
            LogSeverity::Warning => "WARNING_LOG_SEVERITY",
            LogSeverity::Error => "ERROR_LOG_SEVERITY",
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Log {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(message, optional, tag = "2")]
    pub time: Option<Timestamp>,
    #[prost(enumeration = "LogSeverity", tag = "3")]
    pub log_severity: i32,
    #[prost(string, tag = "4")]
    pub message: String,
    #[prost(string, tag = "5")]
    pub message_template: String,
    #[prost(string, optional, tag = "6")]
    pub stack_trace: Option<String>,
    #[prost(message, repeated, tag = "7")]
    pub log_args: Vec<LogArg>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LogArg {
    #[prost(string, tag = "1")]
    pub param_name: String,
    #[prost(oneof = "log_arg::Value", tags = "2, 3, 4")]
    pub value: Option<log_arg::Value>,
}

pub mod log_arg {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        #[prost(string, tag = "2")]
        StrVal(String),
        #[prost(int64, tag = "3")]
        IntVal(i64),
        #[prost(double, tag = "4")]
        DoubleVal(f64),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum SpanStatus {
    Unset = 0,
    Ok = 1,
    Error = 2,
}

/// A finished unit of work (an inbound request or RPC).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Fetch {
    #[prost(string, tag = "1")]
    pub method: String,
    #[prost(message, optional, tag = "2")]
    pub path: Option<Path>,
    #[prost(string, tag = "3")]
    pub raw_path: String,
    #[prost(message, optional, tag = "4")]
    pub request_duration: Option<Duration>,
    #[prost(int32, optional, tag = "5")]
    pub status_code: Option<i32>,
    #[prost(message, optional, tag = "6")]
    pub start_time: Option<Timestamp>,
    #[prost(message, optional, tag = "7")]
    pub end_time: Option<Timestamp>,
    #[prost(enumeration = "SpanStatus", tag = "8")]
    pub status: i32,
    #[prost(string, optional, tag = "9")]
    pub error_message: Option<String>,
    #[prost(message, repeated, tag = "10")]
    pub attributes: Vec<Attribute>,
    #[prost(string, optional, tag = "11")]
    pub logged_in_id: Option<String>,
    #[prost(string, optional, tag = "12")]
    pub logged_in_name: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Path {
    #[prost(string, tag = "1")]
    pub pattern: String,
    #[prost(message, repeated, tag = "2")]
    pub params: Vec<Param>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Param {
    #[prost(string, tag = "1")]
    pub param_name: String,
    #[prost(string, tag = "2")]
    pub arg_value: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Attribute {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(oneof = "attribute::Value", tags = "2, 3, 4, 5")]
    pub value: Option<attribute::Value>,
}

pub mod attribute {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        #[prost(string, tag = "2")]
        StrVal(String),
        #[prost(int64, tag = "3")]
        IntVal(i64),
        #[prost(double, tag = "4")]
        DoubleVal(f64),
        #[prost(bool, tag = "5")]
        BoolVal(bool),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_event() -> Event {
        Event {
            trace_info: Some(TraceInfo {
                fetch_id: "hi1".to_string(),
                session_id: "hi2".to_string(),
                page_view_id: None,
                parent_fetch_id: Some("hi6".to_string()),
            }),
            payload: Some(event::Payload::Log(Log {
                id: "28a892d8-811c-4472-b775-9a3a1ca72fb2".to_string(),
                time: Some(Timestamp {
                    seconds: 1_706_816_531,
                    nanos: 0,
                }),
                log_severity: LogSeverity::Info as i32,
                message: "Hi1".to_string(),
                message_template: "Hi1".to_string(),
                stack_trace: None,
                log_args: vec![
                    LogArg {
                        param_name: "count".to_string(),
                        value: Some(log_arg::Value::IntVal(3)),
                    },
                    LogArg {
                        param_name: "ratio".to_string(),
                        value: Some(log_arg::Value::DoubleVal(0.5)),
                    },
                ],
            })),
        }
    }

    #[test]
    fn test_request_decodes_to_same_message() {
        let request = SendBackendEventsRequest {
            events: vec![log_event()],
            info: Some(BackEndInfo {
                name: "sys".to_string(),
                version: "1".to_string(),
            }),
        };

        let bytes = request.encode_to_vec();
        let decoded = SendBackendEventsRequest::decode(bytes.as_slice()).unwrap();

        assert_eq!(decoded, request);
    }

    #[test]
    fn test_numeric_args_keep_their_type() {
        let bytes = log_event().encode_to_vec();
        let decoded = Event::decode(bytes.as_slice()).unwrap();

        let Some(event::Payload::Log(log)) = decoded.payload else {
            panic!("expected a log payload");
        };
        assert_eq!(log.log_severity(), LogSeverity::Info);
        assert_eq!(log.log_args[0].value, Some(log_arg::Value::IntVal(3)));
        assert_eq!(log.log_args[1].value, Some(log_arg::Value::DoubleVal(0.5)));
    }

    #[test]
    fn test_unset_optional_fields_are_absent() {
        let fetch = Fetch {
            method: "get".to_string(),
            ..Default::default()
        };
        let decoded = Fetch::decode(fetch.encode_to_vec().as_slice()).unwrap();

        assert_eq!(decoded.status_code, None);
        assert_eq!(decoded.status(), SpanStatus::Unset);
        assert_eq!(decoded.logged_in_id, None);
    }

    #[test]
    fn test_severity_names() {
        assert_eq!(LogSeverity::Info.as_str_name(), "INFO_LOG_SEVERITY");
        assert_eq!(LogSeverity::Warning.as_str_name(), "WARNING_LOG_SEVERITY");
        assert_eq!(LogSeverity::Error.as_str_name(), "ERROR_LOG_SEVERITY");
    }
}
