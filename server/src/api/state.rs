//! Shared HTTP handler state.
//!
//! Handlers receive the bootstrap-assembled policies and shared clients via
//! `actix_web::web::Data`; the database session factory travels separately
//! inside the unit-of-work middleware.

use std::sync::Arc;

use crate::auth::{Acl, TicketPolicy};
use crate::buildsys;
use crate::cache::CacheRegion;

/// Policies and shared clients available to every handler.
#[derive(Clone)]
pub struct HttpState {
    /// Cookie-ticket authentication policy.
    pub tickets: TicketPolicy,
    /// Access-control list deciding permissions.
    pub acl: Acl,
    /// Process-wide cache region.
    pub cache: Arc<CacheRegion>,
    /// Build-system client, when the integration is configured.
    pub koji: Option<buildsys::Client>,
    /// Whether the development login shim is enabled.
    pub dev_login: bool,
}
