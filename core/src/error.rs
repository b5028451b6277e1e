/*!
# Error Module

This module defines the error handling infrastructure for FlowGate.

Errors only surface at the edges of the dispatcher:
- Building a dispatcher from an invalid configuration
- Loading configuration from files or the environment
- Submitting work after the dispatcher has been closed

Failures inside submitted tasks are not errors of the dispatcher. They are
isolated per task and counted in [`DispatcherStats`](crate::stats::DispatcherStats).
*/

use thiserror::Error;

/// Result type alias for FlowGate operations
pub type Result<T> = std::result::Result<T, FlowGateError>;

/// Errors that can occur during FlowGate operations
#[derive(Debug, Error)]
pub enum FlowGateError {
    #[error("Invalid max concurrency {0}: must be greater than zero")]
    InvalidConcurrency(usize),

    #[error("Invalid poll interval: must be greater than zero milliseconds")]
    InvalidPollInterval,

    #[error("No tokio runtime available: construct the dispatcher inside a runtime or pass a handle")]
    NoRuntime,

    #[error("Dispatcher is closed")]
    Closed,

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_value() {
        let err = FlowGateError::InvalidConcurrency(0);
        assert_eq!(
            err.to_string(),
            "Invalid max concurrency 0: must be greater than zero"
        );
        assert_eq!(FlowGateError::Closed.to_string(), "Dispatcher is closed");
    }

    #[test]
    fn config_errors_convert() {
        let err: FlowGateError = config::ConfigError::NotFound("max_concurrency".into()).into();
        assert!(matches!(err, FlowGateError::Config(_)));
    }
}
