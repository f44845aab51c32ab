//! Request-lifecycle middleware.

pub mod exception_filter;
pub mod unit_of_work;

pub use exception_filter::ExceptionFilter;
pub use unit_of_work::UnitOfWork;
