// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Subscriber for the crate's own diagnostics, for applications that do not
//! install one themselves.

use std::fmt;

use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext, FormattedFields,
};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::Error;

/// Writes `LEVEL | span{fields}: message fields`.
#[derive(Debug, Clone, Copy)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(&mut writer, "{} | ", event.metadata().level())?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;
                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Filter directives for `level`, with the HTTP stack silenced.
pub fn env_filter(level: &str) -> Result<EnvFilter, Error> {
    EnvFilter::try_new(format!("h2=off,hyper=off,rustls=off,{level}"))
        .map_err(|e| Error::InvalidConfig(format!("could not parse log level '{level}': {e}")))
}

/// Installs a global fmt subscriber at `level`.
pub fn init(level: &str) -> Result<(), Error> {
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(env_filter(level)?)
        .event_format(Formatter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::LoggerInit(e.to_string()))
}

/// Installs a global fmt subscriber at `config.log_level`
/// (`TRACELINK_LOG_LEVEL`).
pub fn init_from(config: &Config) -> Result<(), Error> {
    init(&config.log_level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter() {
        assert!(env_filter("debug").is_ok());
        assert!(env_filter("tracelink=trace").is_ok());
        assert!(matches!(
            env_filter("tracelink=loud"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_init_from_uses_config_level() {
        let config = Config {
            log_level: "tracelink=loud".to_string(),
            ..Default::default()
        };
        assert!(matches!(init_from(&config), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_init_twice_fails_without_panicking() {
        let first = init("info");
        let second = init("info");
        // the test harness may already own the global subscriber
        assert!(first.is_err() || second.is_err());
        assert!(matches!(second, Err(Error::LoggerInit(_))));
    }
}
