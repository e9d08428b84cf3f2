//! Local SQLite persistence for tracked events

pub mod repo;
pub mod schema;

pub use repo::SqliteEventStore;
