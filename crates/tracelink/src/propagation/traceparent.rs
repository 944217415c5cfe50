// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! W3C `traceparent` header.
//!
//! ```text
//! traceparent: 00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01
//!              │  │                                │                └ flags
//!              │  │                                └ parent span id (64-bit)
//!              │  └ trace id (128-bit)
//!              └ version
//! ```

#![allow(clippy::expect_used)]

use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use crate::propagation::error::Error;

pub const TRACEPARENT_KEY: &str = "traceparent";

const SAMPLED_FLAG: u8 = 0x1;

lazy_static! {
    static ref TRACEPARENT_REGEX: Regex =
        Regex::new(r"(?i)^([a-f0-9]{2})-([a-f0-9]{32})-([a-f0-9]{16})-([a-f0-9]{2})(-.*)?$")
            .expect("failed creating regex");
    static ref INVALID_SEGMENT_REGEX: Regex = Regex::new(r"^0+$").expect("failed creating regex");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Traceparent {
    /// 32 lowercase hex chars
    pub trace_id: String,
    /// 16 lowercase hex chars
    pub parent_id: String,
    pub flags: u8,
}

impl Traceparent {
    pub fn sampled(&self) -> bool {
        self.flags & SAMPLED_FLAG != 0
    }
}

pub fn parse(traceparent: &str) -> Result<Traceparent, Error> {
    let captures = TRACEPARENT_REGEX
        .captures(traceparent.trim())
        .ok_or_else(|| Error::extract("invalid format", TRACEPARENT_KEY))?;

    let version = &captures[1];
    let trace_id = &captures[2];
    let parent_id = &captures[3];
    let flags = &captures[4];
    let tail = captures.get(5).map_or("", |m| m.as_str());

    extract_version(version, tail)?;

    if INVALID_SEGMENT_REGEX.is_match(trace_id) {
        return Err(Error::extract(
            "`0` value for trace_id is invalid",
            TRACEPARENT_KEY,
        ));
    }
    if INVALID_SEGMENT_REGEX.is_match(parent_id) {
        return Err(Error::extract(
            "`0` value for span_id is invalid",
            TRACEPARENT_KEY,
        ));
    }

    let flags = u8::from_str_radix(flags, 16)
        .map_err(|_| Error::extract("Failed to decode trace_flags", TRACEPARENT_KEY))?;

    Ok(Traceparent {
        trace_id: trace_id.to_lowercase(),
        parent_id: parent_id.to_lowercase(),
        flags,
    })
}

fn extract_version(version: &str, tail: &str) -> Result<(), Error> {
    match version {
        "ff" | "FF" => {
            return Err(Error::extract(
                "`ff` is an invalid traceparent version",
                TRACEPARENT_KEY,
            ));
        }
        "00" => {
            if !tail.is_empty() {
                return Err(Error::extract(
                    "version `00` should contain only 4 values delimited by `-`",
                    TRACEPARENT_KEY,
                ));
            }
        }
        _ => {
            warn!("TRACELINK | Unsupported traceparent version {version}, still attempting to parse");
        }
    }

    Ok(())
}

/// Formats a version `00` header. Returns `None` unless both ids have the W3C shape.
pub fn format(trace_id: &str, span_id: &str, sampled: bool) -> Option<String> {
    let is_hex = |id: &str, len: usize| {
        id.len() == len
            && id.chars().all(|c| c.is_ascii_hexdigit())
            && !INVALID_SEGMENT_REGEX.is_match(id)
    };
    if !is_hex(trace_id, 32) || !is_hex(span_id, 16) {
        return None;
    }

    Some(format!(
        "00-{}-{}-{:02x}",
        trace_id.to_lowercase(),
        span_id.to_lowercase(),
        u8::from(sampled)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let tp = parse("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01").unwrap();
        assert_eq!(tp.trace_id, "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(tp.parent_id, "00f067aa0ba902b7");
        assert!(tp.sampled());
    }

    #[test]
    fn test_parse_normalizes_case() {
        let tp = parse("00-4BF92F3577B34DA6A3CE929D0E0E4736-00F067AA0BA902B7-00").unwrap();
        assert_eq!(tp.trace_id, "4bf92f3577b34da6a3ce929d0e0e4736");
        assert!(!tp.sampled());
    }

    #[test]
    fn test_parse_rejects_ff_version() {
        assert!(parse("ff-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01").is_err());
    }

    #[test]
    fn test_parse_rejects_version_00_with_tail() {
        assert!(parse("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01-extra").is_err());
    }

    #[test]
    fn test_parse_accepts_future_version_with_tail() {
        let tp = parse("01-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01-extra").unwrap();
        assert_eq!(tp.parent_id, "00f067aa0ba902b7");
    }

    #[test]
    fn test_parse_rejects_zero_ids() {
        assert!(parse("00-00000000000000000000000000000000-00f067aa0ba902b7-01").is_err());
        assert!(parse("00-4bf92f3577b34da6a3ce929d0e0e4736-0000000000000000-01").is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("").is_err());
        assert!(parse("not-a-traceparent").is_err());
        assert!(parse("00-4bf92f3577b34da6-00f067aa0ba902b7-01").is_err());
    }

    #[test]
    fn test_format() {
        assert_eq!(
            format("4bf92f3577b34da6a3ce929d0e0e4736", "00f067aa0ba902b7", true).as_deref(),
            Some("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01")
        );
        assert_eq!(format("4bf92f3577b34da6a3ce929d0e0e4736", "hi1", true), None);
        assert_eq!(format("short", "00f067aa0ba902b7", false), None);
    }
}
