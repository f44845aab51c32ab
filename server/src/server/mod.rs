//! Server construction and middleware wiring.
//!
//! [`run`] takes the assembled [`ServerConfig`] (authentication policy,
//! authorization policy, session factory, cache region, build-system client)
//! and wires it into the actix application.

mod config;

pub use config::ServerConfig;

use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{web, App, HttpServer};
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

use crate::api::health::{live, ready, HealthState};
use crate::api::releases::{create_release, list_releases};
use crate::api::users::{current_user, get_user, login, logout};
use crate::api::HttpState;
use crate::auth::TicketError;
use crate::buildsys::BuildsysError;
use crate::cache::CacheError;
use crate::config::SettingsError;
use crate::db::{SessionError, SessionFactory};
#[cfg(debug_assertions)]
use crate::doc::ApiDoc;
use crate::middleware::{ExceptionFilter, UnitOfWork};

/// Errors that abort bootstrap before the server binds.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Tickets(#[from] TicketError),

    #[error(transparent)]
    Database(#[from] SessionError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Buildsys(#[from] BuildsysError),
}

#[derive(Clone)]
struct AppDependencies {
    http_state: web::Data<HttpState>,
    health_state: web::Data<HealthState>,
    factory: SessionFactory,
}

/// Bind and return the HTTP server for the given configuration.
pub fn run(config: ServerConfig) -> std::io::Result<Server> {
    let http_state = web::Data::new(HttpState {
        tickets: config.tickets,
        acl: config.acl,
        cache: config.cache,
        koji: config.koji,
        dev_login: config.dev_login,
    });
    let health_state = web::Data::new(HealthState::new());
    let factory = config.factory;

    let deps = AppDependencies {
        http_state,
        health_state: health_state.clone(),
        factory,
    };
    let server = HttpServer::new(move || build_app(deps.clone()))
        .bind(config.bind_addr)?
        .run();

    health_state.mark_ready();
    Ok(server)
}

fn build_app(
    deps: AppDependencies,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let AppDependencies {
        http_state,
        health_state,
        factory,
    } = deps;

    let api = web::scope("/api/v1")
        .service(login)
        .service(logout)
        .service(current_user)
        .service(get_user)
        .service(list_releases)
        .service(create_release);

    let app = App::new()
        .app_data(http_state)
        .app_data(health_state)
        .wrap(ExceptionFilter)
        .wrap(UnitOfWork::new(factory))
        .service(api)
        .service(ready)
        .service(live);

    #[cfg(debug_assertions)]
    let app =
        app.service(SwaggerUi::new("/docs/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()));

    app
}
