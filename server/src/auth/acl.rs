//! Access-control-list authorization policy.
//!
//! An [`Acl`] is an ordered list of entries; the first entry whose principal
//! and permission both match decides the outcome. A request whose principals
//! match no entry is denied.

use std::fmt;

/// A security principal a request may act as.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Principal {
    /// Every request, authenticated or not.
    Everyone,
    /// Any request with a verified identity.
    Authenticated,
    /// A specific user, by account name.
    User(String),
    /// Membership of a named group.
    Group(String),
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Everyone => f.write_str("system.Everyone"),
            Self::Authenticated => f.write_str("system.Authenticated"),
            Self::User(name) => f.write_str(name),
            Self::Group(name) => write!(f, "group:{name}"),
        }
    }
}

/// Outcome an ACL entry applies to matching requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Allow,
    Deny,
}

/// One access-control entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ace {
    pub effect: Effect,
    pub principal: Principal,
    pub permission: String,
}

/// Ordered access-control list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Acl {
    entries: Vec<Ace>,
}

impl Acl {
    /// Empty list denying everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an allow entry.
    #[must_use]
    pub fn allow(mut self, principal: Principal, permission: impl Into<String>) -> Self {
        self.entries.push(Ace {
            effect: Effect::Allow,
            principal,
            permission: permission.into(),
        });
        self
    }

    /// Append a deny entry.
    #[must_use]
    pub fn deny(mut self, principal: Principal, permission: impl Into<String>) -> Self {
        self.entries.push(Ace {
            effect: Effect::Deny,
            principal,
            permission: permission.into(),
        });
        self
    }

    /// Decide `permission` for a request acting as `principals`.
    ///
    /// The first entry matching both a held principal and the permission
    /// wins; no match denies.
    pub fn permits(&self, principals: &[Principal], permission: &str) -> bool {
        for entry in &self.entries {
            if entry.permission == permission && principals.contains(&entry.principal) {
                return matches!(entry.effect, Effect::Allow);
            }
        }
        false
    }
}
