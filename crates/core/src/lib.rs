pub mod config;
pub mod datetime;
pub mod ddl;
pub mod error;
pub mod field;
pub mod filter;
pub mod ordering;
pub mod pagination;
pub mod query;
pub mod reconcile;
pub mod registry;
pub mod removal;
pub mod schema;
pub mod shape;
pub mod types;
