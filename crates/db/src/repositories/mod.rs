//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&mut PgConnection` and the target [`Archive`] as their first
//! arguments, so reads can use a pooled connection and writes a
//! transaction.
//!
//! [`Archive`]: muninn_core::registry::Archive

pub mod link_repo;
pub mod namespace_repo;
pub mod product_repo;
pub mod tag_repo;

pub use link_repo::LinkRepo;
pub use namespace_repo::NamespaceRepo;
pub use product_repo::ProductRepo;
pub use tag_repo::TagRepo;
