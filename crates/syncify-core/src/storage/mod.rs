//! Storage layer
//!
//! SQLite schema and connection setup for the local store. The `Store`
//! (see `crate::store`) is the only writer.

pub mod schema;

pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
