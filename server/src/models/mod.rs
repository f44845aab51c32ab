//! Persisted entities and the read queries this layer performs.
//!
//! This layer is read-mostly: user accounts and group memberships are managed
//! elsewhere; the initialization layer only resolves identities and lists the
//! release catalogue. All queries run on the request's unit-of-work
//! connection (see [`crate::db::session`]).

mod release;
mod user;

pub use release::{all_releases, create_release, NewRelease, Release, ReleaseState};
pub use user::{find_user_by_name, groups_of, user_profile, Group, GroupRef, User, UserProfile};

/// Errors surfaced by the persistence queries in this module.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database rejected or failed the query.
    #[error("database query failed: {0}")]
    Query(#[from] diesel::result::Error),

    /// A stored value does not satisfy a domain invariant.
    #[error("corrupt row: {message}")]
    Corrupt { message: String },
}

impl StoreError {
    /// Create a corrupt-row error with the given message.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }
}
