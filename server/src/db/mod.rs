//! Database access: connection pool and the request-scoped unit of work.

pub mod pool;
pub mod session;

pub use pool::{DbPool, PoolConfig};
pub use session::{Db, RequestSession, SessionError, SessionFactory};
