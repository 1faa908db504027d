use thiserror::Error;

/// Canonical error type for catalog and policy operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity was not found in the catalog.
    #[error("{entity} `{id}` was not found")]
    NotFound {
        /// Entity type name (e.g. `"policy"`).
        entity: &'static str,
        /// Identifier of the missing entity.
        id: String,
    },

    /// Entity already exists and cannot be created again.
    #[error("{entity} `{id}` already exists")]
    AlreadyExists {
        /// Entity type name (e.g. `"hypertable"`).
        entity: &'static str,
        /// Identifier that conflicts.
        id: String,
    },

    /// The hypertable a policy points at is gone or no longer partitioned,
    /// usually because it was dropped after the policy was created.
    #[error("{message}")]
    HypertableNotFound {
        /// Human-readable explanation naming the policy and relation.
        message: String,
    },

    /// An enterprise entitlement is required for the operation.
    #[error("cannot execute an enterprise function with an invalid enterprise license: {feature}")]
    LicenseRequired {
        /// Operation that was blocked.
        feature: String,
    },

    /// Caller lacks the privileges to act on the object.
    #[error("insufficient permissions: {message}")]
    InsufficientPrivilege {
        /// Human-readable explanation of the denied action.
        message: String,
    },

    /// Operation violates current state machine rules.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Human-readable explanation of the invalid state.
        message: String,
    },

    /// Unexpected internal error occurred.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable details for debugging purposes.
        message: String,
    },

    /// Catalog storage error.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Validation error for input data.
    #[error("validation error: {0}")]
    ValidationError(String),
}

impl CoreError {
    /// Creates a `NotFound` variant.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Creates an `AlreadyExists` variant.
    #[must_use]
    pub fn already_exists(entity: &'static str, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity,
            id: id.into(),
        }
    }

    /// Creates a `HypertableNotFound` variant.
    #[must_use]
    pub fn hypertable_not_found(message: impl Into<String>) -> Self {
        Self::HypertableNotFound {
            message: message.into(),
        }
    }

    /// Creates a `LicenseRequired` variant.
    #[must_use]
    pub fn license_required(feature: impl Into<String>) -> Self {
        Self::LicenseRequired {
            feature: feature.into(),
        }
    }

    /// Creates an `InsufficientPrivilege` variant.
    #[must_use]
    pub fn insufficient_privilege(message: impl Into<String>) -> Self {
        Self::InsufficientPrivilege {
            message: message.into(),
        }
    }

    /// Creates an `InvalidState` variant.
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates an `Internal` variant.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable category string, for schedulers and operators that need to
    /// tell failure kinds apart without matching on messages.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "undefined_object",
            Self::AlreadyExists { .. } => "duplicate_object",
            Self::HypertableNotFound { .. } => "hypertable_not_exist",
            Self::LicenseRequired { .. } => "license_required",
            Self::InsufficientPrivilege { .. } => "insufficient_privilege",
            Self::InvalidState { .. } => "invalid_state",
            Self::Internal { .. } => "internal_error",
            Self::StorageError(_) => "storage_error",
            Self::ValidationError(_) => "validation_error",
        }
    }
}

/// Convenient result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn license_errors_are_distinguishable() {
        let err = CoreError::license_required("reorder policy");
        assert_eq!(err.code(), "license_required");
        assert_ne!(err.code(), CoreError::internal("boom").code());
    }

    #[test]
    fn hypertable_not_found_keeps_message() {
        let err = CoreError::hypertable_not_found(
            "could not run drop_chunks policy #7 because \"public.metrics\" is not a hypertable",
        );
        assert_eq!(err.code(), "hypertable_not_exist");
        assert!(err.to_string().contains("policy #7"));
    }

    #[test]
    fn not_found_formats_entity_and_id() {
        let err = CoreError::not_found("policy", "404");
        assert_eq!(err.to_string(), "policy `404` was not found");
        assert_eq!(err.code(), "undefined_object");
    }
}
