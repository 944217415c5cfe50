// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors surfaced to callers of the tracelink API.
///
/// Delivery failures are deliberately absent: they are contained inside a flush
/// cycle and reported through [`crate::FlushOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{field} was not set. Please call {setter} with a non-empty value")]
    MissingField {
        field: &'static str,
        setter: &'static str,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Request context requires a non-empty {0}")]
    EmptyIdentity(&'static str),

    #[error("Unknown log severity '{0}'. Must be one of: info, warn, error")]
    UnknownSeverity(String),

    #[error("Unsupported log argument: {0}")]
    UnsupportedArgument(String),

    #[error("Span was already ended")]
    SpanAlreadyEnded,

    #[error("Failed to install the log subscriber: {0}")]
    LoggerInit(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_display() {
        let error = Error::MissingField {
            field: "private_key",
            setter: "private_key()",
        };
        assert_eq!(
            error.to_string(),
            "private_key was not set. Please call private_key() with a non-empty value"
        );
    }

    #[test]
    fn test_error_display() {
        let error = Error::InvalidConfig("flush interval must be greater than 0".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid configuration: flush interval must be greater than 0"
        );
        assert_eq!(
            Error::UnknownSeverity("fatal".to_string()).to_string(),
            "Unknown log severity 'fatal'. Must be one of: info, warn, error"
        );
    }
}
