// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::Error;
use std::collections::HashMap;
use std::env;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://app.tracelink.dev";
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_LOG_LEVEL: &str = "info";
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration for the reporter and its delivery engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Credential sent with every ingestion call
    pub private_key: String,
    /// Version of the monitored system
    pub version: String,
    /// Name of the monitored system
    pub system_name: String,
    /// Ingestion base URL; events are sent to `{base_url}/api/ingest/be`
    pub base_url: String,
    /// Kill switch: every operation becomes a no-op
    pub disabled: bool,
    /// Marks this process's own ingestion calls so an instrumented backend skips them
    pub recursive: bool,
    /// Period of the background flush
    pub flush_interval: Duration,
    /// Timeout of a single ingestion call
    pub request_timeout: Duration,
    /// HTTPS proxy URL
    pub https_proxy: Option<String>,
    /// Log level for the crate's own diagnostics (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            private_key: String::new(),
            version: String::new(),
            system_name: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            disabled: false,
            recursive: false,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            https_proxy: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Create configuration from `TRACELINK_*` environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_env_iter(env::vars())
    }

    /// Same as [`Config::from_env`], reading from an explicit list of variables.
    pub fn from_env_iter<I, K, V>(vars: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let get = |key: &str| vars.get(key).map(|v| v.trim().to_string());

        let mut builder = Config::builder();
        if let Some(private_key) = get("TRACELINK_PRIVATE_KEY") {
            builder = builder.private_key(private_key);
        }
        if let Some(version) = get("TRACELINK_VERSION") {
            builder = builder.version(version);
        }
        if let Some(system_name) = get("TRACELINK_SYSTEM_NAME") {
            builder = builder.system_name(system_name);
        }
        if let Some(base_url) = get("TRACELINK_BASE_URL") {
            builder = builder.base_url(base_url);
        }
        builder = builder
            .disabled(get("TRACELINK_DISABLED").is_some_and(|val| parse_bool(&val)))
            .recursive(get("TRACELINK_RECURSIVE").is_some_and(|val| parse_bool(&val)));

        if let Some(secs) = get("TRACELINK_FLUSH_INTERVAL_SECS") {
            let secs = secs.parse::<u64>().map_err(|_| {
                Error::InvalidConfig(format!(
                    "TRACELINK_FLUSH_INTERVAL_SECS must be a number of seconds, got '{secs}'"
                ))
            })?;
            builder = builder.flush_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = get("TRACELINK_TIMEOUT_SECS") {
            let secs = secs.parse::<u64>().map_err(|_| {
                Error::InvalidConfig(format!(
                    "TRACELINK_TIMEOUT_SECS must be a number of seconds, got '{secs}'"
                ))
            })?;
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if let Some(proxy) = get("TRACELINK_PROXY_HTTPS").or_else(|| get("HTTPS_PROXY")) {
            builder = builder.https_proxy(proxy);
        }
        if let Some(level) = get("TRACELINK_LOG_LEVEL") {
            builder = builder.log_level(level.to_lowercase());
        }

        builder.build()
    }

    /// Endpoint receiving the event batches.
    pub fn ingest_url(&self) -> String {
        format!("{}/api/ingest/be", self.base_url.trim_end_matches('/'))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Error> {
        // A disabled reporter never talks to the backend, so it needs no identity.
        if !self.disabled {
            for (value, name) in [
                (&self.private_key, "private_key"),
                (&self.version, "version"),
                (&self.system_name, "system_name"),
            ] {
                if value.trim().is_empty() {
                    return Err(Error::InvalidConfig(format!("{name} cannot be empty")));
                }
            }
            // sent as a header on every ingestion call
            if http::HeaderValue::from_str(&self.private_key).is_err() {
                return Err(Error::InvalidConfig(
                    "private_key contains characters not allowed in an HTTP header".to_string(),
                ));
            }
        }

        match reqwest::Url::parse(&self.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(Error::InvalidConfig(format!(
                    "base_url must use http or https, got '{}'",
                    url.scheme()
                )));
            }
            Err(e) => {
                return Err(Error::InvalidConfig(format!(
                    "base_url '{}' is not a valid URL: {e}",
                    self.base_url
                )));
            }
        }

        if self.flush_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "flush interval must be greater than 0".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "request timeout must be greater than 0".to_string(),
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(Error::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }
}

/// Builder for [`Config`]. `private_key`, `version` and `system_name` are
/// required unless the reporter is disabled.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    private_key: Option<String>,
    version: Option<String>,
    system_name: Option<String>,
    base_url: Option<String>,
    disabled: bool,
    recursive: bool,
    flush_interval: Option<Duration>,
    request_timeout: Option<Duration>,
    https_proxy: Option<String>,
    log_level: Option<String>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn private_key(mut self, private_key: impl Into<String>) -> Self {
        self.private_key = Some(private_key.into());
        self
    }

    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    #[must_use]
    pub fn system_name(mut self, system_name: impl Into<String>) -> Self {
        self.system_name = Some(system_name.into());
        self
    }

    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    #[must_use]
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    #[must_use]
    pub fn flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = Some(flush_interval);
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = Some(request_timeout);
        self
    }

    #[must_use]
    pub fn https_proxy(mut self, https_proxy: impl Into<String>) -> Self {
        self.https_proxy = Some(https_proxy.into());
        self
    }

    #[must_use]
    pub fn log_level(mut self, log_level: impl Into<String>) -> Self {
        self.log_level = Some(log_level.into());
        self
    }

    pub fn build(self) -> Result<Config, Error> {
        let required = |value: Option<String>, field, setter| match value {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ if self.disabled => Ok(String::new()),
            _ => Err(Error::MissingField { field, setter }),
        };

        let config = Config {
            private_key: required(self.private_key, "private_key", "private_key()")?,
            version: required(self.version, "version", "version()")?,
            system_name: required(self.system_name, "system_name", "system_name()")?,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            disabled: self.disabled,
            recursive: self.recursive,
            flush_interval: self.flush_interval.unwrap_or(DEFAULT_FLUSH_INTERVAL),
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            https_proxy: self.https_proxy,
            log_level: self
                .log_level
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        };

        config.validate()?;
        Ok(config)
    }
}

fn parse_bool(val: &str) -> bool {
    matches!(val.to_lowercase().as_str(), "true" | "1" | "yes")
}
