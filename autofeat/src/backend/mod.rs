//! Generative backend interface and error classification.
//!
//! A backend receives an ordered list of role/content messages and
//! returns a single text blob. Whether a failure is worth retrying is
//! decided here, once, so the contract caller never needs to know
//! which client produced the error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::AutofeatError;

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// User content.
    User,
}

/// One message in a backend request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author role.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Message patterns that mark an otherwise-unclassified failure as
/// transient I/O noise rather than a client mistake.
const TRANSIENT_PATTERNS: &[&str] = &[
    "timeout",
    "timed out",
    "unexpected mimetype",
    "connection reset",
];

/// A failure reported by the backend client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Retryable: 5xx-class status or recognized transient I/O pattern.
    #[error("transient: {message}")]
    Transient {
        /// Description from the client.
        message: String,
        /// HTTP-style status, when one was reported.
        status: Option<u16>,
    },

    /// Not retryable: auth/permission/malformed request, 4xx-class.
    #[error("fatal: {message}")]
    Fatal {
        /// Description from the client.
        message: String,
        /// HTTP-style status, when one was reported.
        status: Option<u16>,
    },
}

impl BackendError {
    /// Classifies a raw client failure into transient or fatal.
    ///
    /// A status of 500 or above is transient; a recognized transient
    /// message pattern is transient; everything else (including all
    /// 4xx-class statuses) is fatal.
    #[must_use]
    pub fn classify(message: impl Into<String>, status: Option<u16>) -> Self {
        let message = message.into();
        let transient = match status {
            Some(code) if code >= 500 => true,
            Some(_) => false,
            None => {
                let lower = message.to_lowercase();
                TRANSIENT_PATTERNS.iter().any(|p| lower.contains(p))
            }
        };
        if transient {
            Self::Transient { message, status }
        } else {
            Self::Fatal { message, status }
        }
    }

    /// Returns true for the retryable class.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

impl From<BackendError> for AutofeatError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Transient { message, status } => {
                Self::TransientBackend { message, status }
            }
            BackendError::Fatal { message, status } => {
                Self::FatalBackend { message, status }
            }
        }
    }
}

/// A generative text backend.
///
/// Implementations are expected to block (await) for the full round
/// trip; the pipeline never fans out concurrent calls.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Sends the ordered messages and returns the raw text reply.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_5xx_is_transient() {
        let err = BackendError::classify("internal server error", Some(503));
        assert!(err.is_transient());
    }

    #[test]
    fn status_4xx_is_fatal() {
        let err = BackendError::classify("unauthorized", Some(401));
        assert!(!err.is_transient());
    }

    #[test]
    fn transient_message_patterns_without_status() {
        assert!(BackendError::classify("Unexpected MIMEtype in reply", None).is_transient());
        assert!(BackendError::classify("read timed out", None).is_transient());
        assert!(!BackendError::classify("invalid api key", None).is_transient());
    }

    #[test]
    fn pattern_does_not_override_explicit_4xx() {
        // An explicit client-error status wins over message sniffing.
        let err = BackendError::classify("request timeout", Some(400));
        assert!(!err.is_transient());
    }

    #[test]
    fn conversion_preserves_class() {
        let transient: AutofeatError =
            BackendError::classify("oops", Some(502)).into();
        assert!(transient.is_retryable());

        let fatal: AutofeatError = BackendError::classify("nope", Some(403)).into();
        assert!(!fatal.is_retryable());
    }

    #[test]
    fn message_constructors_set_roles() {
        assert_eq!(ChatMessage::system("s").role, Role::System);
        assert_eq!(ChatMessage::user("u").role, Role::User);
    }
}
