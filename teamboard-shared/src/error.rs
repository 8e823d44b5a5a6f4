/// Domain error taxonomy
///
/// Every membership, team, project and task workflow returns
/// [`DomainError`]. The API layer maps each variant to a distinct HTTP status
/// and message; none of them are fatal to the process.
///
/// # Masking
///
/// Denials on resources the caller cannot even see are reported as
/// [`DomainError::NotFound`], never [`DomainError::NotAuthorized`], so that
/// ids cannot be probed for existence.

use crate::auth::authorization::AuthzError;
use crate::models::team_member::InvitationStatus;

/// Result alias used throughout the workflows
pub type DomainResult<T> = Result<T, DomainError>;

/// Error type for all registry and ledger operations
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    /// Caller lacks rights on a resource it can see
    #[error("Not authorized to perform this action")]
    NotAuthorized,

    /// Resource or parent missing, or outside the caller's visibility
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Illegal invitation state-machine move
    #[error("Invitation is already {from}, cannot move to {to}")]
    InvalidTransition {
        from: InvitationStatus,
        to: InvitationStatus,
    },

    /// An invited or accepted row already exists for this team and email
    #[error("{email} is already invited to or a member of this team")]
    DuplicateInvite { email: String },

    /// Team owner tried to invite their own email
    #[error("Team owners are members implicitly and cannot invite themselves")]
    SelfInvite,

    /// Referential or invariant violation
    #[error("Invalid association: {0}")]
    InvalidAssociation(String),

    /// Missing or malformed input
    #[error("Validation failed: {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// Attachment storage failure
    #[error("Attachment storage failed: {0}")]
    Storage(#[from] crate::storage::StorageError),

    /// Storage layer failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl DomainError {
    /// Shorthand for a validation failure on one field
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Stable machine-readable code for the variant
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::NotAuthorized => "not_authorized",
            DomainError::NotFound(_) => "not_found",
            DomainError::InvalidTransition { .. } => "invalid_transition",
            DomainError::DuplicateInvite { .. } => "duplicate_invite",
            DomainError::SelfInvite => "self_invite",
            DomainError::InvalidAssociation(_) => "invalid_association",
            DomainError::Validation { .. } => "validation_error",
            DomainError::Storage(_) => "storage_error",
            DomainError::Database(_) => "internal_error",
        }
    }

    /// Storage failure that may succeed on a second attempt
    pub fn is_transient(&self) -> bool {
        match self {
            DomainError::Database(e) => crate::db::pool::is_transient(e),
            _ => false,
        }
    }
}

impl From<AuthzError> for DomainError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Hidden(resource) => DomainError::NotFound(resource),
            AuthzError::NotAuthorized => DomainError::NotAuthorized,
        }
    }
}

/// Name of the partial unique index guarding active invitations
pub const ACTIVE_INVITE_INDEX: &str = "team_members_active_pair_key";

/// Returns true when `err` is a unique violation on the given constraint
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}

/// Returns true when `err` is a foreign key violation
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_foreign_key_violation(),
        _ => false,
    }
}
