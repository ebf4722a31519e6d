//! Persistence layer for monitored domain records and notification settings.
//!
//! Backed by SeaORM over SQLite (WAL mode); migrations run when the store is
//! opened. Aggregates and nulls-last ordering use raw SQL statements, row
//! mutations go through ActiveModels.

pub mod entities;
pub mod store;


pub use store::{DomainQuery, DomainStore, SortKey};
