//! Error taxonomy for public ledger operations.
//!
//! Every public operation returns `Result<T, LedgerError>`; the
//! [`ErrorKind`] accessor gives callers a machine-checkable class without
//! string matching.

use serde::{Deserialize, Serialize};

use crate::types::{CommunityId, UserId};

/// Machine-checkable class of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input, rejected before any mutation.
    Validation,
    /// The target user is banned; rejected before any mutation.
    BannedUser,
    /// The referenced report/tier/user does not exist; no-op.
    NotFound,
    /// A call to the external directory failed; partial effects possible.
    ExternalAdapter,
    /// The ledger store failed; the owning transaction rolled back.
    Storage,
}

/// Error type for public ledger operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
    /// Bad input (oversized reason, non-positive threshold, ...).
    #[error("invalid input: {0}")]
    Validation(String),

    /// The user is banned from the reputation system in this community.
    #[error("user {user} is banned from the reputation system in community {community}")]
    BannedUser {
        /// Community the ban applies to.
        community: CommunityId,
        /// Banned user.
        user: UserId,
    },

    /// The referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The external directory rejected or failed a call.
    #[error("external directory error: {0}")]
    ExternalAdapter(String),

    /// The ledger store failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::BannedUser { .. } => ErrorKind::BannedUser,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::ExternalAdapter(_) => ErrorKind::ExternalAdapter,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Wrap a store backend error.
    pub fn from_store<E: std::error::Error>(e: E) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<crate::directory::DirectoryError> for LedgerError {
    fn from(e: crate::directory::DirectoryError) -> Self {
        Self::ExternalAdapter(e.to_string())
    }
}
