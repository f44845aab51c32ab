//! Release catalogue handlers.

use actix_web::{get, post, web, HttpRequest, HttpResponse};
use tracing::warn;

use crate::auth::{self, Principal};
use crate::db::Db;
use crate::error::{ApiResult, Error};
use crate::models::{self, NewRelease, Release};

use super::HttpState;

/// Permission required to manage the release catalogue.
const ADMIN_PERMISSION: &str = "admin";

/// Cache key for the full release list.
const RELEASES_CACHE_KEY: &str = "releases.all";

/// List every known release.
///
/// The list changes rarely and is requested constantly, so it is served from
/// the cache region when possible. Cache failures degrade to a database read.
#[utoipa::path(
    get,
    path = "/api/v1/releases",
    responses(
        (status = 200, description = "Releases ordered by name", body = [Release])
    ),
    tags = ["releases"],
    operation_id = "listReleases"
)]
#[get("/releases")]
pub async fn list_releases(
    state: web::Data<HttpState>,
    db: Db,
) -> ApiResult<web::Json<Vec<Release>>> {
    match state.cache.get(RELEASES_CACHE_KEY).await {
        Ok(Some(cached)) => match serde_json::from_value::<Vec<Release>>(cached) {
            Ok(releases) => return Ok(web::Json(releases)),
            Err(err) => warn!(error = %err, "discarding undecodable release cache entry"),
        },
        Ok(None) => {}
        Err(err) => warn!(error = %err, "release cache read failed"),
    }

    let mut session = db.session().await?;
    let releases = models::all_releases(session.connection()).await?;
    drop(session);

    match serde_json::to_value(&releases) {
        Ok(value) => {
            if let Err(err) = state.cache.put(RELEASES_CACHE_KEY, value).await {
                warn!(error = %err, "release cache write failed");
            }
        }
        Err(err) => warn!(error = %err, "release list not cacheable"),
    }
    Ok(web::Json(releases))
}

/// Create a release. Requires the `admin` permission.
#[utoipa::path(
    post,
    path = "/api/v1/releases",
    request_body = NewRelease,
    responses(
        (status = 201, description = "Release created", body = Release),
        (status = 403, description = "Admin permission required", body = Error)
    ),
    tags = ["releases"],
    operation_id = "createRelease"
)]
#[post("/releases")]
pub async fn create_release(
    state: web::Data<HttpState>,
    db: Db,
    request: HttpRequest,
    payload: web::Json<NewRelease>,
) -> ApiResult<HttpResponse> {
    // Anonymous requests hold only the Everyone principal; resolving group
    // membership is what needs the database.
    let principals = match state.tickets.identity(&request) {
        Some(identity) => {
            let mut session = db.session().await?;
            auth::effective_principals(Some(identity.as_str()), session.connection()).await?
        }
        None => vec![Principal::Everyone],
    };

    if !state.acl.permits(&principals, ADMIN_PERMISSION) {
        return Err(Error::forbidden("admin permission required"));
    }

    let mut session = db.session().await?;
    let release = models::create_release(session.connection(), &payload).await?;
    Ok(HttpResponse::Created().json(release))
}
