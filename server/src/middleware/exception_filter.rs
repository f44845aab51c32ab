//! Response filter logging unhandled exceptions.
//!
//! Any response that carries an error (an attached handler error or a 5xx
//! status) is logged at error level and returned to the client unchanged.
//! The filter never rewrites, recovers, or retries; it exists so unhandled
//! failures always leave a trace in the logs.

use std::task::{Context, Poll};

use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::Error;
use futures_util::future::{ready, LocalBoxFuture, Ready};
use tracing::error;

/// Exception-logging middleware factory.
#[derive(Clone, Default)]
pub struct ExceptionFilter;

impl<S, B> Transform<S, ServiceRequest> for ExceptionFilter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = ExceptionFilterMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ExceptionFilterMiddleware { service }))
    }
}

/// Service wrapper produced by [`ExceptionFilter`].
pub struct ExceptionFilterMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for ExceptionFilterMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let fut = self.service.call(req);
        Box::pin(async move {
            let result = fut.await;
            match &result {
                Ok(res) => {
                    if let Some(err) = res.response().error() {
                        error!(error = %err, "Unhandled exception raised");
                    } else if res.status().is_server_error() {
                        error!(status = %res.status(), "Unhandled exception raised");
                    }
                }
                Err(err) => error!(error = %err, "Unhandled exception raised"),
            }
            result
        })
    }
}
