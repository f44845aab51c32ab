//! OpenAPI document served by Swagger UI in debug builds.

use utoipa::OpenApi;

use crate::api;
use crate::error::{Error, ErrorCode};
use crate::models::{GroupRef, NewRelease, Release, ReleaseState, UserProfile};

/// Public OpenAPI surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "gatehouse",
        description = "Package update gating service: bootstrap and identity layer."
    ),
    paths(
        api::users::login,
        api::users::logout,
        api::users::current_user,
        api::users::get_user,
        api::releases::list_releases,
        api::releases::create_release,
        api::health::live,
        api::health::ready,
    ),
    components(schemas(
        api::users::LoginRequest,
        UserProfile,
        GroupRef,
        Release,
        ReleaseState,
        NewRelease,
        Error,
        ErrorCode,
    ))
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();

        for expected in [
            "/api/v1/login",
            "/api/v1/logout",
            "/api/v1/users/me",
            "/api/v1/users/{name}",
            "/api/v1/releases",
            "/health/live",
            "/health/ready",
        ] {
            assert!(paths.contains(&expected), "missing path: {expected}");
        }
    }
}
