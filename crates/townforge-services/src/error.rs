//! Error type shared by every collaborator contract.

use townforge_types::ReasonCode;

/// Errors returned by collaborator services.
///
/// The engine maps these onto its reason-code taxonomy at the dispatch
/// boundary; services themselves stay close to the failure they saw.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// A referenced entity does not exist.
    #[error("{what} not found")]
    NotFound {
        /// What was being looked up.
        what: String,
    },

    /// The service refused the operation for a rule reason.
    #[error("rejected ({code}): {message}")]
    Rejected {
        /// The semantic reason.
        code: ReasonCode,
        /// Detail from the service.
        message: String,
    },

    /// The AMM clamped or slipped the swap beyond tolerance.
    #[error("swap rejected: {message}")]
    SwapRejected {
        /// Detail from the AMM.
        message: String,
    },

    /// The match engine refused a submitted move.
    #[error("move rejected: {message}")]
    MoveRejected {
        /// Detail from the match engine.
        message: String,
    },

    /// The model gateway failed (transport, quota, or parse).
    #[error("model gateway: {message}")]
    Model {
        /// Detail from the gateway.
        message: String,
    },

    /// Any other downstream failure.
    #[error("downstream: {message}")]
    Downstream {
        /// Detail from the collaborator.
        message: String,
    },
}

impl ServiceError {
    /// Convenience constructor for [`ServiceError::NotFound`].
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Convenience constructor for [`ServiceError::Downstream`].
    pub fn downstream(message: impl Into<String>) -> Self {
        Self::Downstream {
            message: message.into(),
        }
    }

    /// The reason code this error maps to in receipts and rejections.
    pub const fn reason_code(&self) -> ReasonCode {
        match self {
            Self::NotFound { .. } => ReasonCode::TargetUnavailable,
            Self::Rejected { code, .. } => *code,
            Self::SwapRejected { .. } => ReasonCode::AmmSlippage,
            Self::MoveRejected { .. } => ReasonCode::ExecutionFailed,
            Self::Model { .. } | Self::Downstream { .. } => ReasonCode::ExecutionError,
        }
    }
}
