//! Gateway error taxonomy.
//!
//! Every fault a delegate can produce maps onto one of these variants; the
//! dispatcher converts them into structured error envelopes so that no fault
//! ever escapes to terminate the listener or a sibling worker.

use thiserror::Error;

/// Faults the gateway can report to a caller.
///
/// `PolicyDenied` and `NotFound` are expected in normal operation and are
/// logged at debug level only. `Timeout` and `Internal` indicate something
/// operators may want to look at and are logged at warn level with the
/// method name and truncated parameters.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Path or command rejected by the allow/deny lists.
    #[error("{0}")]
    PolicyDenied(String),

    /// File or directory missing.
    #[error("{0}")]
    NotFound(String),

    /// Operation exceeded its wall-clock bound. The process tree has been
    /// reclaimed by the time this is returned.
    #[error("operation timed out after {0}s")]
    Timeout(u64),

    /// Undecodable request or a missing/invalid field.
    #[error("{0}")]
    MalformedRequest(String),

    /// Method name outside the supported set.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// Unexpected fault inside a delegate.
    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    /// Wire error code for the response envelope.
    pub fn code(&self) -> i64 {
        match self {
            GatewayError::MalformedRequest(_) => -32600,
            GatewayError::UnknownMethod(_) => -32601,
            GatewayError::PolicyDenied(_) => -32001,
            GatewayError::Timeout(_) => -32002,
            GatewayError::NotFound(_) => -32003,
            GatewayError::Internal(_) => -32603,
        }
    }

    /// Wrap an arbitrary delegate fault.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        GatewayError::Internal(err.to_string())
    }

    /// True for faults that are part of normal operation and should not be
    /// surfaced as operational incidents.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            GatewayError::PolicyDenied(_)
                | GatewayError::NotFound(_)
                | GatewayError::MalformedRequest(_)
                | GatewayError::UnknownMethod(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            GatewayError::PolicyDenied("p".into()),
            GatewayError::NotFound("n".into()),
            GatewayError::Timeout(5),
            GatewayError::MalformedRequest("m".into()),
            GatewayError::UnknownMethod("u".into()),
            GatewayError::Internal("i".into()),
        ];
        let codes: std::collections::HashSet<i64> = errors.iter().map(|e| e.code()).collect();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_expected_classification() {
        assert!(GatewayError::PolicyDenied("p".into()).is_expected());
        assert!(GatewayError::NotFound("n".into()).is_expected());
        assert!(!GatewayError::Timeout(5).is_expected());
        assert!(!GatewayError::Internal("i".into()).is_expected());
    }
}
