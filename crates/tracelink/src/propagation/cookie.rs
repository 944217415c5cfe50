// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use http::header::{HeaderMap, COOKIE};

use crate::propagation::carrier::Extractor;

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "tracelinksession";

/// Cookies of one request. Unlike header carriers, names are matched exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies(HashMap<String, String>);

impl Cookies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Keeps the first value seen for `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.entry(name.into()).or_insert_with(|| value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Extractor for Cookies {
    fn get(&self, key: &str) -> Option<&str> {
        Cookies::get(self, key)
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }
}

/// Parses a `Cookie:` header (`a=1; b=2`). The first occurrence of a name wins.
pub fn parse_cookie_header(header: &str) -> Cookies {
    let mut cookies = Cookies::new();
    for pair in header.split(';') {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        cookies.insert(name, value.trim().trim_matches('"'));
    }
    cookies
}

/// Collects every `Cookie` header of a request.
pub fn from_headers(headers: &HeaderMap) -> Cookies {
    let mut cookies = Cookies::new();
    for header in headers.get_all(COOKIE) {
        if let Ok(header) = header.to_str() {
            for (name, value) in parse_cookie_header(header).0 {
                cookies.insert(name, value);
            }
        }
    }
    cookies
}

/// `Set-Cookie` value persisting the session id for the browser.
pub fn session_set_cookie(session_id: &str) -> String {
    format!("{SESSION_COOKIE}={session_id}; Path=/; SameSite=Lax")
}
