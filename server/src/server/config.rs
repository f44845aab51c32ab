//! Server configuration assembled at bootstrap.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::auth::{Acl, Principal, TicketPolicy};
use crate::buildsys;
use crate::cache::CacheRegion;
use crate::config::Settings;
use crate::db::{DbPool, PoolConfig, SessionFactory};

use super::BootstrapError;

/// Everything the HTTP server needs, assembled from settings.
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) tickets: TicketPolicy,
    pub(crate) acl: Acl,
    pub(crate) factory: SessionFactory,
    pub(crate) cache: Arc<CacheRegion>,
    pub(crate) koji: Option<buildsys::Client>,
    pub(crate) dev_login: bool,
}

impl ServerConfig {
    /// Assemble the full configuration: authentication and authorization
    /// policies, the session factory, the cache region, and the build-system
    /// client. Misconfiguration fails here, before the server binds.
    pub async fn from_settings(settings: &Settings) -> Result<Self, BootstrapError> {
        let tickets = TicketPolicy::from_settings(settings)?;
        let acl = root_acl(settings.admin_group());

        let pool = DbPool::new(PoolConfig::from_settings(settings)?).await?;
        let factory = SessionFactory::new(pool);

        let cache = CacheRegion::from_map(&settings.prefixed("cache_")).await?;
        let koji = buildsys::get_session(settings)?;

        Ok(Self {
            bind_addr: settings.bind_addr()?,
            tickets,
            acl,
            factory,
            cache: Arc::new(cache),
            koji,
            dev_login: settings.dev_login,
        })
    }

    /// The address the server will bind to.
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}

/// The root access-control list: everyone may view, the configured admin
/// group administers the catalogue.
fn root_acl(admin_group: &str) -> Acl {
    Acl::new()
        .allow(Principal::Everyone, "view")
        .allow(Principal::Group(admin_group.to_owned()), "admin")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn root_acl_grants_admin_to_the_configured_group() {
        let acl = root_acl("releng");
        let admins = vec![
            Principal::Everyone,
            Principal::Authenticated,
            Principal::Group("releng".to_owned()),
        ];
        let packagers = vec![
            Principal::Everyone,
            Principal::Authenticated,
            Principal::Group("packager".to_owned()),
        ];

        assert!(acl.permits(&admins, "admin"));
        assert!(!acl.permits(&packagers, "admin"));
        assert!(acl.permits(&packagers, "view"));
    }
}
