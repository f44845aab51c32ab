//! Middleware tying the database session to the request lifecycle.
//!
//! Every request is seeded with a lazy [`Db`] handle. After the inner
//! service resolves, any session that was opened is finalized exactly once:
//! rolled back when the request recorded an exception (a handler error, an
//! attached response error, or a 5xx status), committed otherwise, and
//! closed in both cases.

use std::task::{Context, Poll};

use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, HttpMessage};
use futures_util::future::{ready, LocalBoxFuture, Ready};

use crate::db::{session, Db, SessionFactory};

/// Unit-of-work middleware factory.
pub struct UnitOfWork {
    factory: SessionFactory,
}

impl UnitOfWork {
    /// Wire the middleware to a session factory.
    pub fn new(factory: SessionFactory) -> Self {
        Self { factory }
    }
}

impl<S, B> Transform<S, ServiceRequest> for UnitOfWork
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = UnitOfWorkMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(UnitOfWorkMiddleware {
            service,
            factory: self.factory.clone(),
        }))
    }
}

/// Service wrapper produced by [`UnitOfWork`].
pub struct UnitOfWorkMiddleware<S> {
    service: S,
    factory: SessionFactory,
}

impl<S, B> Service<ServiceRequest> for UnitOfWorkMiddleware<S>
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
        let db = Db::new(self.factory.clone());
        req.extensions_mut().insert(db.clone());
        let fut = self.service.call(req);
        Box::pin(async move {
            let result = fut.await;
            let errored = match &result {
                Ok(res) => res.response().error().is_some() || res.status().is_server_error(),
                Err(_) => true,
            };
            if let Some(open_session) = db.take() {
                session::finalize(open_session, errored).await;
            }
            result
        })
    }
}
