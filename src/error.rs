//! Error types and result handling for shadow-forwarder.
//!
//! This module defines the main error type [`Error`] and a convenience
//! [`Result`] type alias used throughout the crate.
//!
//! Every error that stops a batch is surfaced to the invocation boundary as a
//! single rejection; the triggering runtime redelivers the whole batch.
//!
//! # Example
//!
//! ```rust
//! use shadow_forwarder::{Error, Result};
//!
//! fn find_identity(name: &str) -> Result<&str> {
//!     if name.is_empty() {
//!         return Err(Error::Validation {
//!             message: "No thing name found".to_string(),
//!         });
//!     }
//!     Ok(name)
//! }
//!
//! match find_identity("") {
//!     Ok(name) => println!("Forwarding for {}", name),
//!     Err(e) if e.is_retryable() => eprintln!("Retry later: {}", e),
//!     Err(e) => eprintln!("Unprocessable batch: {}", e),
//! }
//! ```

use crate::kafka::ConnectionState;
use thiserror::Error;

/// The main error type for shadow-forwarder operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error, from the config file or environment variables.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Kafka client or producer error.
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// JSON serialization error when encoding outbound messages.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The shared connection is mid-transition. The batch was rejected
    /// without processing any record and should be redelivered.
    #[error("Kafka is in {state} state. Rejecting the batch for next retry")]
    ConnectionBusy {
        /// State observed by the admission check
        state: ConnectionState,
    },

    /// Connecting the producer to the brokers failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A record could not be turned into an outbound message.
    #[error("Validation error: {message}")]
    Validation {
        /// Description of what was invalid
        message: String,
    },

    /// Sending a message to the broker failed.
    #[error("Publish failed for key '{key}': {source}")]
    Publish {
        /// Identity key of the message that failed
        key: String,
        /// Underlying client error
        #[source]
        source: Box<Error>,
    },

    /// The connection state machine was asked to take an edge it does not have.
    #[error("Invalid connection state transition: {from} -> {to}")]
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },

    /// A broker operation did not complete within its deadline.
    #[error("Timeout error: {message}")]
    Timeout {
        /// Description of what timed out
        message: String,
    },

    /// The producer client has no live connection.
    #[error("Producer is not connected")]
    NotConnected,
}

impl Error {
    /// Whether redelivering the same batch can succeed.
    ///
    /// Validation failures are properties of the records themselves and will
    /// fail again on every redelivery.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::ConnectionBusy { .. }
            | Error::Connection(_)
            | Error::Publish { .. }
            | Error::Kafka(_)
            | Error::Timeout { .. }
            | Error::NotConnected => true,
            Error::Config(_)
            | Error::Serialization(_)
            | Error::Validation { .. }
            | Error::InvalidTransition { .. } => false,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }
}

/// A convenient Result type alias for shadow-forwarder operations.
///
/// This is equivalent to `std::result::Result<T, shadow_forwarder::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_busy_error_names_state() {
        let err = Error::ConnectionBusy {
            state: ConnectionState::Disconnecting,
        };
        assert_eq!(
            err.to_string(),
            "Kafka is in Disconnecting state. Rejecting the batch for next retry"
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn test_publish_error_keeps_source() {
        let err = Error::Publish {
            key: "thermostat-42".to_string(),
            source: Box::new(Error::NotConnected),
        };
        assert!(err.to_string().contains("thermostat-42"));
        assert_eq!(err.source().unwrap().to_string(), "Producer is not connected");
    }

    #[test]
    fn test_validation_is_not_retryable() {
        assert!(!Error::validation("No thing name found").is_retryable());
    }

    #[test]
    fn test_delivery_timeout_is_retryable() {
        let err = Error::Timeout {
            message: "delivery to 'shadow-updates' not acknowledged within 1s".to_string(),
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("shadow-updates"));
    }
}
