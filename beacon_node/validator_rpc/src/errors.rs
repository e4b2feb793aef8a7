use std::fmt;

/// Transport-neutral status of a failed RPC, mapped 1:1 onto gRPC codes by
/// whatever transport embeds this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// Transient: syncing, optimistic execution, builder outage. Retry.
    Unavailable,
    /// The request itself is malformed.
    InvalidArgument,
    /// State access or state transition failed.
    Internal,
    /// A pubkey or object the request names is unknown.
    NotFound,
    /// The request's context was canceled before completion.
    Canceled,
    /// Work was abandoned partway; partial results were discarded.
    Aborted,
    /// A cache entry resolved to nothing after a completed computation.
    DataLoss,
    /// The request is valid only under a fork that is not active.
    FailedPrecondition,
}

/// Internal failure classification. Carried for status mapping and logs,
/// never surfaced verbatim to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    CannotRetrieveHeadRoot,
    CannotRetrieveHeadState,
    CannotRetrieveState,
    CannotProcessSlots,
    StateMismatchSlotTooHigh,
    CacheEntryLost,
    BuilderUnavailable,
    EngineUnavailable,
    BroadcastFailed,
}

/// The error type every RPC entry point returns.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    code: StatusCode,
    message: String,
    reason: Option<Reason>,
}

impl RpcError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: Reason) -> Self {
        self.reason = Some(reason);
        self
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Unavailable, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StatusCode::InvalidArgument, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NotFound, message)
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Aborted, message)
    }

    pub fn data_loss(message: impl Into<String>) -> Self {
        Self::new(StatusCode::DataLoss, message)
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FailedPrecondition, message)
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn reason(&self) -> Option<Reason> {
        self.reason
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_is_not_in_display() {
        let err = RpcError::internal("could not advance state")
            .with_reason(Reason::CannotProcessSlots);
        let shown = err.to_string();
        assert!(shown.contains("could not advance state"));
        assert!(!shown.contains("CannotProcessSlots"));
        assert_eq!(err.reason(), Some(Reason::CannotProcessSlots));
    }

    #[test]
    fn constructors_set_codes() {
        assert_eq!(
            RpcError::unavailable("x").code(),
            StatusCode::Unavailable
        );
        assert_eq!(
            RpcError::invalid_argument("x").code(),
            StatusCode::InvalidArgument
        );
        assert_eq!(RpcError::data_loss("x").code(), StatusCode::DataLoss);
    }
}
