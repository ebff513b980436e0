//! Database module: models, schema and queries for persistent storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `sqlite.rs`: the `Storage` handle and connection setup
//! - one file per entity group with its `impl Storage` queries

pub mod fleet;
pub mod issues;
pub mod locations;
pub mod models;
pub mod notifications;
pub mod reports;
pub mod routes;
pub mod schema;
pub mod sqlite;
pub mod users;

pub use schema::SQLITE_INIT;
pub use sqlite::{SqlitePool, Storage};
