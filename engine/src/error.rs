//! Engine error type and its coarse classification.

use std::fmt;

use thiserror::Error;

use accord_store::{PersistenceError, StoreError};
use accord_types::{BranchId, InvalidVariant};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("protocol '{0}' not found")]
    ProtocolNotFound(String),
    #[error("branch '{0}' not found")]
    BranchNotFound(BranchId),
    #[error("participant '{0}' not found")]
    ParticipantNotFound(String),
    #[error(transparent)]
    InvalidVariant(#[from] InvalidVariant),
    #[error("branch '{0}' has already been merged")]
    AlreadyMerged(BranchId),
    #[error("missing required argument '{0}'")]
    MissingArgument(String),
    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),
    /// A store invariant (uniqueness, monotonic versions) rejected the change.
    #[error(transparent)]
    Conflict(StoreError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

impl EngineError {
    pub(crate) fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::ProtocolNotFound(_)
            | EngineError::BranchNotFound(_)
            | EngineError::ParticipantNotFound(_) => ErrorKind::NotFound,
            EngineError::InvalidVariant(_) => ErrorKind::InvalidVariant,
            EngineError::AlreadyMerged(_) => ErrorKind::AlreadyMerged,
            EngineError::MissingArgument(_)
            | EngineError::InvalidArgument { .. }
            | EngineError::UnknownOperation(_) => ErrorKind::InvalidArgument,
            EngineError::Conflict(_) => ErrorKind::Conflict,
            EngineError::Encode(_) => ErrorKind::MalformedState,
            EngineError::Persistence(err) => match err {
                PersistenceError::Read { .. } | PersistenceError::Write { .. } => ErrorKind::Io,
                PersistenceError::Encode(_) | PersistenceError::Malformed { .. } => {
                    ErrorKind::MalformedState
                }
            },
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ProtocolNotFound(name) => EngineError::ProtocolNotFound(name),
            StoreError::ParticipantNotFound(id) => EngineError::ParticipantNotFound(id),
            StoreError::BranchNotFound(id) => EngineError::BranchNotFound(id),
            StoreError::AlreadyMerged(id) => EngineError::AlreadyMerged(id),
            other => EngineError::Conflict(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidVariant,
    AlreadyMerged,
    MalformedState,
    Conflict,
    InvalidArgument,
    Io,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidVariant => "invalid_variant",
            ErrorKind::AlreadyMerged => "already_merged",
            ErrorKind::MalformedState => "malformed_state",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use accord_types::ProtocolScope;

    use super::*;

    #[test]
    fn store_errors_map_onto_engine_kinds() {
        let err: EngineError = StoreError::ProtocolNotFound("p".into()).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err: EngineError = StoreError::AlreadyMerged(BranchId::new("b")).into();
        assert_eq!(err.kind(), ErrorKind::AlreadyMerged);

        let err: EngineError = StoreError::DuplicateProtocol("p".into()).into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.to_string(), "protocol 'p' already exists");
    }

    #[test]
    fn variant_and_persistence_kinds() {
        let err: EngineError = ProtocolScope::parse("huge").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::InvalidVariant);

        let err: EngineError = PersistenceError::Malformed {
            origin: "document".into(),
            reason: "bad".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::MalformedState);
        assert_eq!(err.kind().to_string(), "malformed_state");
    }
}
