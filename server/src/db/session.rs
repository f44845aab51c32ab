//! Request-scoped database session: one unit of work per request.
//!
//! The [`SessionFactory`] lives in app data; the [`UnitOfWork`] middleware
//! seeds every request with a lazy [`Db`] handle. The first access through
//! the handle checks a connection out of the pool and opens a transaction;
//! a request that never touches the database opens nothing. When the request
//! finishes, the middleware finalizes the session exactly once: rollback if
//! the request recorded an exception, commit otherwise, then close the
//! connection unconditionally.
//!
//! The lifecycle policy is testable without a database through a recording
//! backend that logs commit/rollback/close calls.
//!
//! [`UnitOfWork`]: crate::middleware::UnitOfWork

use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpMessage, HttpRequest};
use diesel_async::pooled_connection::bb8::PooledConnection;
use diesel_async::{AsyncConnection, AsyncPgConnection, TransactionManager};
use futures_util::future::{ready, Ready};
use tracing::error;

use crate::error::Error;

use super::DbPool;

#[cfg(test)]
use recording::{RecordingFactory, RecordingSession};

type PgTransaction = <AsyncPgConnection as AsyncConnection>::TransactionManager;

/// Errors raised across the session lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Failed to check a connection out of the pool.
    #[error("failed to get connection from pool: {message}")]
    Checkout { message: String },

    /// Failed to build the connection pool.
    #[error("failed to build connection pool: {message}")]
    Build { message: String },

    /// A transaction operation failed.
    #[error("transaction {operation} failed: {message}")]
    Transaction {
        operation: &'static str,
        message: String,
    },

    /// The request session has already been finalized.
    #[error("request session is unavailable")]
    Unavailable,
}

impl SessionError {
    /// Create a checkout error with the given message.
    pub fn checkout(message: impl Into<String>) -> Self {
        Self::Checkout {
            message: message.into(),
        }
    }

    /// Create a pool-build error with the given message.
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build {
            message: message.into(),
        }
    }

    fn transaction(operation: &'static str, err: diesel::result::Error) -> Self {
        Self::Transaction {
            operation,
            message: err.to_string(),
        }
    }
}

/// Produces request sessions; the per-process "registry" entry the
/// middleware hands to every request.
#[derive(Clone)]
pub struct SessionFactory {
    kind: FactoryKind,
}

#[derive(Clone)]
enum FactoryKind {
    Pool(DbPool),
    #[cfg(test)]
    Recording(RecordingFactory),
}

impl SessionFactory {
    /// Factory backed by the shared connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self {
            kind: FactoryKind::Pool(pool),
        }
    }

    /// Open a session: check out a connection and begin its transaction.
    pub async fn open(&self) -> Result<RequestSession, SessionError> {
        match &self.kind {
            FactoryKind::Pool(pool) => {
                let mut conn = pool.checkout_owned().await?;
                {
                    let pg: &mut AsyncPgConnection = &mut conn;
                    PgTransaction::begin_transaction(pg)
                        .await
                        .map_err(|err| SessionError::transaction("begin", err))?;
                }
                Ok(RequestSession {
                    backend: SessionBackend::Pg { conn },
                })
            }
            #[cfg(test)]
            FactoryKind::Recording(recording) => recording.open(),
        }
    }
}

/// One unit of work bound to a single request.
pub struct RequestSession {
    backend: SessionBackend,
}

enum SessionBackend {
    Pg {
        conn: PooledConnection<'static, AsyncPgConnection>,
    },
    #[cfg(test)]
    Recording(RecordingSession),
}

impl RequestSession {
    /// The live connection for running queries inside this unit of work.
    pub fn connection(&mut self) -> &mut AsyncPgConnection {
        match &mut self.backend {
            SessionBackend::Pg { conn } => conn,
            #[cfg(test)]
            SessionBackend::Recording(_) => {
                panic!("recording sessions do not expose a database connection")
            }
        }
    }

    /// Commit the unit of work.
    pub async fn commit(&mut self) -> Result<(), SessionError> {
        match &mut self.backend {
            SessionBackend::Pg { conn } => {
                let pg: &mut AsyncPgConnection = conn;
                PgTransaction::commit_transaction(pg)
                    .await
                    .map_err(|err| SessionError::transaction("commit", err))
            }
            #[cfg(test)]
            SessionBackend::Recording(recording) => recording.commit(),
        }
    }

    /// Roll the unit of work back.
    pub async fn rollback(&mut self) -> Result<(), SessionError> {
        match &mut self.backend {
            SessionBackend::Pg { conn } => {
                let pg: &mut AsyncPgConnection = conn;
                PgTransaction::rollback_transaction(pg)
                    .await
                    .map_err(|err| SessionError::transaction("rollback", err))
            }
            #[cfg(test)]
            SessionBackend::Recording(recording) => recording.rollback(),
        }
    }

    /// Close the session, returning the connection to the pool.
    pub fn close(self) {
        match self.backend {
            SessionBackend::Pg { conn } => drop(conn),
            #[cfg(test)]
            SessionBackend::Recording(recording) => recording.close(),
        }
    }
}

/// Finalize a session at request completion: rollback when the request
/// recorded an exception, commit otherwise, then close unconditionally.
/// Finalization failures are logged, never surfaced to the client.
pub(crate) async fn finalize(mut session: RequestSession, errored: bool) {
    let outcome = if errored {
        session.rollback().await
    } else {
        session.commit().await
    };
    if let Err(err) = outcome {
        error!(error = %err, "request session finalization failed");
    }
    session.close();
}

/// Lazy per-request session handle seeded into request extensions by the
/// unit-of-work middleware.
#[derive(Clone)]
pub struct Db {
    slot: Rc<RefCell<DbSlot>>,
}

struct DbSlot {
    factory: SessionFactory,
    session: Option<RequestSession>,
}

impl Db {
    pub(crate) fn new(factory: SessionFactory) -> Self {
        Self {
            slot: Rc::new(RefCell::new(DbSlot {
                factory,
                session: None,
            })),
        }
    }

    /// The request's session, opened on first access.
    ///
    /// The returned guard must be dropped before the handler yields the
    /// response; at most one session exists per request.
    pub async fn session(&self) -> Result<RefMut<'_, RequestSession>, SessionError> {
        let needs_open = self.slot.borrow().session.is_none();
        if needs_open {
            let factory = self.slot.borrow().factory.clone();
            let opened = factory.open().await?;
            self.slot.borrow_mut().session = Some(opened);
        }
        RefMut::filter_map(self.slot.borrow_mut(), |slot| slot.session.as_mut())
            .map_err(|_| SessionError::Unavailable)
    }

    /// Take the session out for finalization, if one was ever opened.
    pub(crate) fn take(&self) -> Option<RequestSession> {
        self.slot.borrow_mut().session.take()
    }
}

impl FromRequest for Db {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Db>()
                .cloned()
                .ok_or_else(|| Error::internal("unit-of-work middleware is not configured")),
        )
    }
}

#[cfg(test)]
pub(crate) use recording::{events, SessionEvent};

#[cfg(test)]
mod recording {
    //! Recording session backend for lifecycle tests.
    //!
    //! The log is `Arc<Mutex<_>>` rather than `Rc<RefCell<_>>` so the
    //! factory stays `Send` and server construction type-checks under test
    //! builds too.

    use std::sync::{Arc, Mutex};

    use super::{FactoryKind, RequestSession, SessionBackend, SessionError, SessionFactory};

    /// Shared log of lifecycle events, in call order.
    pub(crate) type EventLog = Arc<Mutex<Vec<SessionEvent>>>;

    /// Snapshot of the events recorded so far.
    pub(crate) fn events(log: &EventLog) -> Vec<SessionEvent> {
        log.lock().expect("event log lock").clone()
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum SessionEvent {
        Opened,
        Committed,
        RolledBack,
        Closed,
    }

    #[derive(Clone)]
    pub(super) struct RecordingFactory {
        log: EventLog,
        fail_commit: bool,
    }

    impl RecordingFactory {
        pub(super) fn open(&self) -> Result<RequestSession, SessionError> {
            self.log.lock().expect("event log lock").push(SessionEvent::Opened);
            Ok(RequestSession {
                backend: SessionBackend::Recording(RecordingSession {
                    log: self.log.clone(),
                    fail_commit: self.fail_commit,
                }),
            })
        }
    }

    pub(super) struct RecordingSession {
        log: EventLog,
        fail_commit: bool,
    }

    impl RecordingSession {
        pub(super) fn commit(&mut self) -> Result<(), SessionError> {
            if self.fail_commit {
                return Err(SessionError::Transaction {
                    operation: "commit",
                    message: "injected commit failure".to_owned(),
                });
            }
            self.log.lock().expect("event log lock").push(SessionEvent::Committed);
            Ok(())
        }

        pub(super) fn rollback(&mut self) -> Result<(), SessionError> {
            self.log.lock().expect("event log lock").push(SessionEvent::RolledBack);
            Ok(())
        }

        pub(super) fn close(self) {
            self.log.lock().expect("event log lock").push(SessionEvent::Closed);
        }
    }

    impl SessionFactory {
        /// Factory producing sessions that only record lifecycle calls.
        pub(crate) fn recording() -> (Self, EventLog) {
            let log: EventLog = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    kind: FactoryKind::Recording(RecordingFactory {
                        log: log.clone(),
                        fail_commit: false,
                    }),
                },
                log,
            )
        }

        /// Recording factory whose commits fail, for close-always coverage.
        pub(crate) fn recording_with_failing_commit() -> (Self, EventLog) {
            let log: EventLog = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    kind: FactoryKind::Recording(RecordingFactory {
                        log: log.clone(),
                        fail_commit: true,
                    }),
                },
                log,
            )
        }
    }
}
