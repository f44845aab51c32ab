//! Authentication and authorization policies.
//!
//! The pieces assembled at bootstrap: the cookie-ticket authentication policy
//! ([`TicketPolicy`]), the ACL authorization policy ([`Acl`]), and the group
//! finder that expands an authenticated identity into its principals.

mod acl;
mod groups;
mod ticket;

pub use acl::{Ace, Acl, Effect, Principal};
pub use groups::{effective_principals, groupfinder, principals_for};
pub use ticket::{TicketError, TicketPolicy, AUTH_COOKIE_NAME, DEFAULT_TIMEOUT_SECS};
