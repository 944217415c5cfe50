// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Carrier traits for request context propagation.
//!
//! Carriers abstract over where propagation data lives: HTTP headers, cookies,
//! message metadata. Lookups are case-insensitive so that `X-Tracelink-SessionId`
//! and `x-tracelink-sessionid` resolve to the same entry.
//!
//! Implemented for:
//! - `HashMap<String, String>`: cookies and in-memory use
//! - `serde_json::Value` objects: JSON message metadata
//! - `http::HeaderMap`: inbound and outbound HTTP headers

use std::collections::HashMap;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::debug;

/// Writes propagation entries into a carrier. Keys are normalized to lowercase.
pub trait Injector {
    fn set(&mut self, key: &str, value: String);
}

/// Reads propagation entries from a carrier. Key lookup is case-insensitive.
pub trait Extractor {
    /// Gets a value from the carrier by key.
    fn get(&self, key: &str) -> Option<&str>;

    /// Gets all keys present in the carrier.
    fn keys(&self) -> Vec<&str>;
}

impl<S: std::hash::BuildHasher> Injector for HashMap<String, String, S> {
    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_lowercase(), value);
    }
}

impl<S: std::hash::BuildHasher> Extractor for HashMap<String, String, S> {
    fn get(&self, key: &str) -> Option<&str> {
        self.get(&key.to_lowercase()).map(String::as_str)
    }

    fn keys(&self) -> Vec<&str> {
        self.keys().map(String::as_str).collect::<Vec<_>>()
    }
}

/// Only `Value::Object` is written to; other values are left untouched.
impl Injector for Value {
    fn set(&mut self, key: &str, value: String) {
        if let Value::Object(map) = self {
            map.insert(key.to_lowercase(), Value::String(value));
        }
    }
}

impl Extractor for Value {
    fn get(&self, key: &str) -> Option<&str> {
        if let Value::Object(map) = self {
            map.get(&key.to_lowercase()).and_then(|v| v.as_str())
        } else {
            None
        }
    }

    fn keys(&self) -> Vec<&str> {
        if let Value::Object(map) = self {
            map.keys().map(String::as_str).collect::<Vec<_>>()
        } else {
            Vec::new()
        }
    }
}

/// Entries that are not valid header names or values are skipped.
impl Injector for HeaderMap {
    fn set(&mut self, key: &str, value: String) {
        let name = match HeaderName::from_bytes(key.to_lowercase().as_bytes()) {
            Ok(name) => name,
            Err(e) => {
                debug!("TRACELINK | Skipping invalid header name {key}: {e}");
                return;
            }
        };
        match HeaderValue::from_str(&value) {
            Ok(value) => {
                self.insert(name, value);
            }
            Err(e) => debug!("TRACELINK | Skipping invalid value for header {key}: {e}"),
        }
    }
}

/// Values that are not visible ASCII read as absent.
impl Extractor for HeaderMap {
    fn get(&self, key: &str) -> Option<&str> {
        HeaderMap::get(self, key.to_lowercase().as_str()).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        HeaderMap::keys(self)
            .map(HeaderName::as_str)
            .collect::<Vec<_>>()
    }
}
