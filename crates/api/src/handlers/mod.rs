//! Request handlers.
//!
//! Handlers delegate to the repositories in `muninn_db` and map errors via
//! [`AppError`](crate::error::AppError).

pub mod products;
pub mod root;
