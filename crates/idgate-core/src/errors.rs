//! Error types for the identity gate
//!
//! Only invariant violations and wiring mistakes surface as errors. Policy
//! rejections (a message that cannot be admitted yet, a throttled query, a
//! stale document) are reported through `bool`/`Option` results instead.

use crate::types::Identifier;

// ----------------------------------------------------------------------------
// Core Error
// ----------------------------------------------------------------------------

/// Core error types for the identity gate
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A component was built without a required collaborator or with an
    /// unusable setting
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// A second, different identity key was offered for the same owner
    #[error("Identity key already set for {owner}")]
    IdentityKeyConflict { owner: Identifier },

    /// Text that does not parse as an identifier
    #[error("Invalid identifier: {input}")]
    InvalidIdentifier { input: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl CoreError {
    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        CoreError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a missing-collaborator configuration error
    pub fn missing_collaborator(component: &str, collaborator: &str) -> Self {
        CoreError::Configuration {
            reason: format!("{component} requires a {collaborator}"),
        }
    }

    /// Create an identity key conflict error
    pub fn identity_key_conflict(owner: &Identifier) -> Self {
        CoreError::IdentityKeyConflict {
            owner: owner.clone(),
        }
    }

    /// Create an invalid identifier error
    pub fn invalid_identifier<T: Into<String>>(input: T) -> Self {
        CoreError::InvalidIdentifier {
            input: input.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, CoreError>;
pub type CoreResult<T> = Result<T>;
