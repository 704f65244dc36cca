//! # TableDB Store
//!
//! LMDB store adapter for TableDB.
//!
//! This crate confines every engine-specific handle type behind a narrow
//! capability interface:
//!
//! - [`Store`] - environment lifecycle (create with a fixed map size, open)
//! - [`Store::write`] / [`Store::read`] - scoped transactions that commit on
//!   success and abort on any error, released exactly once per exit path
//! - [`WriteScope`] - put / delete / exact-key lookup
//! - [`Snapshot`] - a long-lived read-only transaction with exact-match
//!   lookup, nearest-greater-or-equal seek, and cursor-relative stepping
//!
//! The table layer above depends only on these operations, never on the
//! engine's transaction or cursor types.

mod error;
mod store;

pub use error::{StoreError, StoreResult};
pub use store::{Snapshot, Store, WriteScope};
