//! Request extractors.
//!
//! - [`archive::ResolvedArchive`] -- Resolves the addressed archive, enforces
//!   its read-only flag and validates the query string.

pub mod archive;
