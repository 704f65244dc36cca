//! # TableDB Core
//!
//! A lightweight relational-like layer over a transactional, sorted
//! key-value store: named tables, auto-incrementing primary keys, and
//! single-column and compound secondary indexes, all expressed purely
//! through key encoding. Every row, index entry, and piece of schema
//! metadata is one key/value pair in a single shared keyspace; the
//! engine below knows nothing about tables or columns.
//!
//! This crate provides:
//! - [`keys`] - the key codec defining the keyspace layout
//! - [`Schema`] / [`TableDef`] - declarative schema, persisted once by
//!   [`Database::create`]
//! - [`Database`] - the handle: insert, transactional batching, iterators
//! - [`TxnContext`] - insert/remove bound to one shared write transaction
//! - [`RangeIter`] - prefix-bounded iteration over a table's primary-key
//!   space or any of its index spaces
//!
//! Row documents are JSON objects and are stored verbatim; indexed column
//! values are treated as opaque strings.

mod database;
mod error;
mod iter;
pub mod keys;
mod schema;

pub use database::{Database, TxnContext, DEFAULT_VERSION};
pub use error::{TableError, TableResult};
pub use iter::RangeIter;
pub use schema::{Schema, TableDef, TableInfo};
pub use tabledb_store::{StoreError, StoreResult};
