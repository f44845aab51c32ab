//! User authentication and profile handlers.
//!
//! ```text
//! POST /api/v1/login  {"username":"guest"}
//! POST /api/v1/logout
//! GET  /api/v1/users/me
//! GET  /api/v1/users/{name}
//! ```
//!
//! Production deployments authenticate through an external identity provider
//! that mints the same ticket cookies; the login handler here is the
//! development shim behind the `dev_login` setting.

use actix_web::{get, post, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::Db;
use crate::error::{ApiResult, Error};
use crate::models::{self, UserProfile};

use super::HttpState;

/// Login request body.
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct LoginRequest {
    /// Account name to mint a ticket for.
    #[schema(example = "guest")]
    pub username: String,
}

/// Mint a ticket cookie for an existing user (development shim).
#[utoipa::path(
    post,
    path = "/api/v1/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Ticket cookie set", headers(("Set-Cookie" = String, description = "Auth ticket"))),
        (status = 401, description = "Unknown user", body = Error),
        (status = 403, description = "Interactive login disabled", body = Error)
    ),
    tags = ["users"],
    operation_id = "login"
)]
#[post("/login")]
pub async fn login(
    state: web::Data<HttpState>,
    db: Db,
    payload: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    if !state.dev_login {
        return Err(Error::forbidden("interactive login is disabled"));
    }

    let username = payload.into_inner().username;
    let mut session = db.session().await?;
    let user = models::find_user_by_name(session.connection(), &username).await?;
    drop(session);

    let Some(user) = user else {
        return Err(Error::unauthorized("unknown user"));
    };
    let cookie = state
        .tickets
        .remember(&user.name)
        .map_err(|err| Error::internal(err.to_string()))?;
    Ok(HttpResponse::Ok()
        .cookie(cookie)
        .json(json!({ "user": user.name })))
}

/// Clear the ticket cookie.
#[utoipa::path(
    post,
    path = "/api/v1/logout",
    responses(
        (status = 200, description = "Ticket cookie cleared")
    ),
    tags = ["users"],
    operation_id = "logout"
)]
#[post("/logout")]
pub async fn logout(state: web::Data<HttpState>) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(state.tickets.forget())
        .json(json!({ "status": "ok" }))
}

/// Resolve the authenticated identity to its profile.
///
/// Requests without a verified ticket get 401; so do tickets whose identity
/// no longer corresponds to a registered user.
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses(
        (status = 200, description = "Authenticated user", body = UserProfile),
        (status = 401, description = "No authenticated identity", body = Error)
    ),
    tags = ["users"],
    operation_id = "currentUser"
)]
#[get("/users/me")]
pub async fn current_user(
    state: web::Data<HttpState>,
    db: Db,
    request: HttpRequest,
) -> ApiResult<web::Json<UserProfile>> {
    let Some(identity) = state.tickets.identity(&request) else {
        return Err(Error::unauthorized("no authenticated identity"));
    };

    let mut session = db.session().await?;
    let profile = models::user_profile(session.connection(), &identity).await?;
    profile
        .map(web::Json)
        .ok_or_else(|| Error::unauthorized("identity does not resolve to a user"))
}

/// Look up a user profile by account name.
#[utoipa::path(
    get,
    path = "/api/v1/users/{name}",
    params(("name" = String, Path, description = "Account name")),
    responses(
        (status = 200, description = "User profile", body = UserProfile),
        (status = 404, description = "No such user", body = Error)
    ),
    tags = ["users"],
    operation_id = "getUser"
)]
#[get("/users/{name}")]
pub async fn get_user(db: Db, path: web::Path<String>) -> ApiResult<web::Json<UserProfile>> {
    let name = path.into_inner();
    let mut session = db.session().await?;
    let profile = models::user_profile(session.connection(), &name).await?;
    profile
        .map(web::Json)
        .ok_or_else(|| Error::not_found(format!("no such user: {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Acl, TicketPolicy};
    use crate::cache::CacheRegion;
    use crate::db::SessionFactory;
    use crate::middleware::UnitOfWork;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    async fn test_state(tickets: TicketPolicy, dev_login: bool) -> web::Data<HttpState> {
        let cache = CacheRegion::from_map(&BTreeMap::new())
            .await
            .expect("memory cache");
        web::Data::new(HttpState {
            tickets,
            acl: Acl::new(),
            cache: Arc::new(cache),
            koji: None,
            dev_login,
        })
    }

    fn test_app(
        state: web::Data<HttpState>,
        factory: SessionFactory,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new().app_data(state).wrap(UnitOfWork::new(factory)).service(
            web::scope("/api/v1")
                .service(login)
                .service(logout)
                .service(current_user),
        )
    }

    #[actix_web::test]
    async fn login_is_forbidden_when_the_shim_is_disabled() {
        let state = test_state(TicketPolicy::new("hunter2", 60, false), false).await;
        let (factory, log) = SessionFactory::recording();
        let app = test::init_service(test_app(state, factory)).await;

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/login")
                .set_json(&LoginRequest {
                    username: "guest".into(),
                })
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        // Refused before any database access.
        assert!(crate::db::session::events(&log).is_empty());
    }

    #[actix_web::test]
    async fn logout_clears_the_ticket_cookie() {
        let state = test_state(TicketPolicy::new("hunter2", 60, false), false).await;
        let (factory, _log) = SessionFactory::recording();
        let app = test::init_service(test_app(state, factory)).await;

        let res = test::call_service(
            &app,
            test::TestRequest::post().uri("/api/v1/logout").to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
        let cookie = res
            .response()
            .cookies()
            .find(|cookie| cookie.name() == crate::auth::AUTH_COOKIE_NAME)
            .expect("clearing cookie present");
        assert_eq!(cookie.value(), "");
    }

    #[actix_web::test]
    async fn current_user_requires_an_identity() {
        let state = test_state(TicketPolicy::new("hunter2", 60, false), false).await;
        let (factory, log) = SessionFactory::recording();
        let app = test::init_service(test_app(state, factory)).await;

        let res = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/v1/users/me").to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["code"], "unauthorized");
        // No identity, no database session.
        assert!(crate::db::session::events(&log).is_empty());
    }
}
