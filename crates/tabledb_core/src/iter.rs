//! Prefix-bounded range iteration.

use crate::error::{TableError, TableResult};
use crate::keys;
use tabledb_store::Snapshot;
use tracing::trace;

/// Where the iterator currently stands.
///
/// `Unpositioned` is the state before the first `find`; `Exhausted` means
/// the last seek or step left the prefix region (or found nothing) and the
/// iterator must be re-positioned with `find` before it can move again.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Position {
    Unpositioned,
    Valid { key: String, value: String },
    Exhausted,
}

/// A cursor over one prefix-delimited region of the keyspace: either the
/// primary-key space of a table or one of its index spaces.
///
/// The iterator owns a dedicated read-only transaction for its whole
/// lifetime, so it observes one consistent snapshot across repeated
/// repositioning - and pins that snapshot until it is dropped, so keep
/// iterator lifetimes short. Dropping the iterator releases the
/// transaction exactly once; the type cannot be cloned, only moved.
///
/// Constructed through [`Database::primary_key_iter`],
/// [`Database::index_iter`], or [`Database::compound_index_iter`].
///
/// [`Database::primary_key_iter`]: crate::Database::primary_key_iter
/// [`Database::index_iter`]: crate::Database::index_iter
/// [`Database::compound_index_iter`]: crate::Database::compound_index_iter
pub struct RangeIter<'db> {
    snapshot: Snapshot<'db>,
    table: String,
    prefix: String,
    /// True when iterating the primary-key space; index spaces store a
    /// pointer to the row key as their value instead of the row itself.
    primary: bool,
    position: Position,
}

impl<'db> RangeIter<'db> {
    pub(crate) fn primary(snapshot: Snapshot<'db>, table: &str) -> Self {
        Self {
            snapshot,
            table: table.to_owned(),
            prefix: keys::row_prefix(table),
            primary: true,
            position: Position::Unpositioned,
        }
    }

    pub(crate) fn index(snapshot: Snapshot<'db>, table: &str, prefix: String) -> Self {
        Self {
            snapshot,
            table: table.to_owned(),
            prefix,
            primary: false,
            position: Position::Unpositioned,
        }
    }

    /// Positions on the smallest key `>=` the encoded `value` within this
    /// iterator's region.
    ///
    /// An empty `value` positions at the start of the region. The iterator
    /// becomes valid iff the landed key still carries the region prefix.
    pub fn find(&mut self, value: &str) -> TableResult<()> {
        let target = keys::seek_key(&self.prefix, value);
        self.position_at(&target)
    }

    /// Positions within a compound index region using an ordered, possibly
    /// partial, list of column values.
    pub fn find_values(&mut self, values: &[&str]) -> TableResult<()> {
        let target = keys::seek_key_values(&self.prefix, values);
        self.position_at(&target)
    }

    /// Steps one key forward in store order.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::InvalidIterator`] unless the iterator is
    /// currently valid.
    pub fn next(&mut self) -> TableResult<()> {
        let key = self.require_valid()?.0.to_owned();
        self.position = match self.snapshot.next_after(&key)? {
            Some((key, value)) if key.starts_with(&self.prefix) => Position::Valid { key, value },
            _ => Position::Exhausted,
        };
        Ok(())
    }

    /// Steps one key backward in store order.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::InvalidIterator`] unless the iterator is
    /// currently valid.
    pub fn prev(&mut self) -> TableResult<()> {
        let key = self.require_valid()?.0.to_owned();
        self.position = match self.snapshot.prev_before(&key)? {
            Some((key, value)) if key.starts_with(&self.prefix) => Position::Valid { key, value },
            _ => Position::Exhausted,
        };
        Ok(())
    }

    /// Returns `true` if the iterator stands on an entry of its region.
    #[must_use]
    pub fn valid(&self) -> bool {
        matches!(self.position, Position::Valid { .. })
    }

    /// Returns the raw key the iterator stands on.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::InvalidIterator`] unless the iterator is
    /// currently valid.
    pub fn current_key(&self) -> TableResult<&str> {
        Ok(self.require_valid()?.0)
    }

    /// Returns the primary key of the row the current entry belongs to.
    ///
    /// For an index-space iterator this is the trailing component of the
    /// stored pointer (`<table>_<pk>`); for a primary-key iterator it is
    /// the trailing component of the key itself.
    pub fn current_primary_key(&self) -> TableResult<&str> {
        let (key, value) = self.require_valid()?;
        let pointer = if self.primary { key } else { value };
        keys::primary_key_of(&self.table, pointer).ok_or_else(|| TableError::DanglingIndexEntry {
            key: key.to_owned(),
        })
    }

    /// Returns the row document the current entry resolves to, verbatim.
    ///
    /// A primary-key iterator already stands on the row; an index iterator
    /// dereferences the stored pointer.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::InvalidIterator`] if the iterator is not
    /// valid, or [`TableError::DanglingIndexEntry`] if an index entry
    /// points at a row that no longer exists.
    pub fn current_data(&self) -> TableResult<String> {
        let (key, value) = self.require_valid()?;
        if self.primary {
            return Ok(value.to_owned());
        }
        self.snapshot
            .get(value)?
            .ok_or_else(|| TableError::DanglingIndexEntry {
                key: key.to_owned(),
            })
    }

    fn position_at(&mut self, target: &str) -> TableResult<()> {
        self.position = match self.snapshot.seek(target)? {
            Some((key, value)) if key.starts_with(&self.prefix) => Position::Valid { key, value },
            _ => Position::Exhausted,
        };
        trace!(
            target_key = target,
            valid = self.valid(),
            "positioned iterator"
        );
        Ok(())
    }

    fn require_valid(&self) -> TableResult<(&str, &str)> {
        match &self.position {
            Position::Valid { key, value } => Ok((key, value)),
            _ => Err(TableError::InvalidIterator),
        }
    }
}
