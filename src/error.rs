//! # Dispatcher Errors
//!
//! Every expected protocol condition is a typed outcome rather than a panic.
//! Each variant carries the human-readable diagnostic that is returned to the
//! caller, and maps to one stable [`ResponseStatusCode`].

use crate::model::ResponseStatusCode;

/// Typed failure outcome of a dispatcher operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("originator has no privilege: {0}")]
    OriginatorHasNoPrivilege(String),
    #[error("security association required: {0}")]
    SecurityAssociationRequired(String),
    #[error("operation not allowed: {0}")]
    OperationNotAllowed(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("request timeout: {0}")]
    RequestTimeout(String),
    #[error("invalid child resource type: {0}")]
    InvalidChildResourceType(String),
    #[error("target not subscribable: {0}")]
    TargetNotSubscribable(String),
    #[error("target not reachable: {0}")]
    TargetNotReachable(String),
    #[error("not implemented: {0}")]
    NotImplemented(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    /// The status code reported for this outcome.
    pub const fn status(&self) -> ResponseStatusCode {
        match self {
            Self::NotFound(_) => ResponseStatusCode::NotFound,
            Self::BadRequest(_) => ResponseStatusCode::BadRequest,
            Self::OriginatorHasNoPrivilege(_) => ResponseStatusCode::OriginatorHasNoPrivilege,
            Self::SecurityAssociationRequired(_) => ResponseStatusCode::SecurityAssociationRequired,
            Self::OperationNotAllowed(_) => ResponseStatusCode::OperationNotAllowed,
            Self::Conflict(_) => ResponseStatusCode::Conflict,
            Self::RequestTimeout(_) => ResponseStatusCode::RequestTimeout,
            Self::InvalidChildResourceType(_) => ResponseStatusCode::InvalidChildResourceType,
            Self::TargetNotSubscribable(_) => ResponseStatusCode::TargetNotSubscribable,
            Self::TargetNotReachable(_) => ResponseStatusCode::TargetNotReachable,
            Self::NotImplemented(_) => ResponseStatusCode::NotImplemented,
            Self::Internal(_) => ResponseStatusCode::InternalServerError,
        }
    }

    /// The diagnostic message without the category prefix.
    pub fn diagnostic(&self) -> &str {
        match self {
            Self::NotFound(dbg)
            | Self::BadRequest(dbg)
            | Self::OriginatorHasNoPrivilege(dbg)
            | Self::SecurityAssociationRequired(dbg)
            | Self::OperationNotAllowed(dbg)
            | Self::Conflict(dbg)
            | Self::RequestTimeout(dbg)
            | Self::InvalidChildResourceType(dbg)
            | Self::TargetNotSubscribable(dbg)
            | Self::TargetNotReachable(dbg)
            | Self::NotImplemented(dbg)
            | Self::Internal(dbg) => dbg,
        }
    }
}

/// Result of every dispatcher and collaborator call.
pub type Outcome<T> = Result<T, DispatchError>;
