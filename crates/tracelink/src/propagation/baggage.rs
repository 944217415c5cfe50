// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! W3C `baggage` header: `key1=value1;prop,key2=value2`.
//!
//! Values are percent-encoded. Members with properties keep only the value;
//! properties are dropped.

use tracing::debug;

pub const BAGGAGE_KEY: &str = "baggage";

/// Looks up one member of a baggage header.
pub fn get(header: &str, key: &str) -> Option<String> {
    parse(header)
        .into_iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value)
}

pub fn parse(header: &str) -> Vec<(String, String)> {
    header
        .split(',')
        .filter_map(|member| {
            let member = member.split(';').next()?.trim();
            let (name, value) = member.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            match urlencoding::decode(value.trim()) {
                Ok(value) => Some((name.to_string(), value.into_owned())),
                Err(e) => {
                    debug!("TRACELINK | Skipping baggage member {name}: {e}");
                    None
                }
            }
        })
        .collect()
}

/// Formats a single-member header.
pub fn member(key: &str, value: &str) -> String {
    format!("{key}={}", urlencoding::encode(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get() {
        let header = "userId=alice, tracelink.sessionId=abc123;ttl=60 ,other=x";
        assert_eq!(get(header, "tracelink.sessionId").as_deref(), Some("abc123"));
        assert_eq!(get(header, "userId").as_deref(), Some("alice"));
        assert_eq!(get(header, "missing"), None);
    }

    #[test]
    fn test_parse_decodes_values() {
        assert_eq!(
            parse("name=hello%20world"),
            vec![("name".to_string(), "hello world".to_string())]
        );
    }

    #[test]
    fn test_parse_skips_malformed_members() {
        assert_eq!(
            parse("novalue,=x,ok=1"),
            vec![("ok".to_string(), "1".to_string())]
        );
    }

    #[test]
    fn test_member_is_parsed_back() {
        let header = member("tracelink.sessionId", "a b,c");
        assert_eq!(header, "tracelink.sessionId=a%20b%2Cc");
        assert_eq!(get(&header, "tracelink.sessionId").as_deref(), Some("a b,c"));
    }
}
