//! Row models.

pub mod product;
