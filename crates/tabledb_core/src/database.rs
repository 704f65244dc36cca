//! Database handle, row store, and transactional batching.

use crate::error::{TableError, TableResult};
use crate::iter::RangeIter;
use crate::keys;
use crate::schema::{Catalog, Schema};
use parking_lot::ReentrantMutex;
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use tabledb_store::{Store, WriteScope};
use tracing::{debug, error};

/// The default catalog version written by [`Database::create`].
pub const DEFAULT_VERSION: u32 = 1;

/// A handle to one table database.
///
/// The handle owns the store environment and the catalog loaded at open;
/// both live until the handle is dropped. One writer at a time and any
/// number of concurrent readers may share a handle across threads: row
/// mutations serialize on a per-handle write lock (and on the engine's
/// single write-transaction slot), while every [`RangeIter`] reads from
/// its own snapshot.
///
/// # Example
///
/// ```rust,ignore
/// use tabledb_core::{Database, Schema, TableDef};
///
/// Database::create(
///     path,
///     16 * 1024 * 1024,
///     &Schema::new(vec![TableDef::new("segments").index_column("time")]),
///     1,
/// )?;
///
/// let db = Database::open(path)?;
/// let pk = db.insert("segments", r#"{ "time": "1234" }"#)?;
///
/// let mut iter = db.index_iter("segments", "time")?;
/// iter.find("1234")?;
/// assert!(iter.valid());
/// ```
pub struct Database {
    store: Store,
    catalog: Catalog,
    /// Serializes logical write transactions issued through this handle.
    /// Reentrant so a unit of work reaching back into the handle cannot
    /// deadlock on its own lock.
    write_lock: ReentrantMutex<()>,
}

impl Database {
    /// Creates a new database file at `path` and writes the catalog for
    /// `schema` in one transaction.
    ///
    /// `map_size` fixes the environment's maximum size; `version` is
    /// stored as the catalog version ([`DEFAULT_VERSION`] by convention).
    /// Each table's primary-key sequence starts at 1. The schema is
    /// write-once: there is no way to alter it later.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::InvalidName`] if any table or column name
    /// contains the reserved delimiter, or a store error if the file
    /// already exists or cannot be created.
    pub fn create(path: &Path, map_size: usize, schema: &Schema, version: u32) -> TableResult<()> {
        schema.validate()?;
        let store = Store::create(path, map_size)?;
        store.write(|writer| Catalog::persist(schema, version, writer))?;
        debug!(
            path = %path.display(),
            tables = schema.tables().len(),
            version,
            "created database"
        );
        Ok(())
    }

    /// Opens the database at `path` and loads its catalog.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::MissingCatalogKey`] or
    /// [`TableError::CorruptCatalog`] if the file was not produced by
    /// [`Database::create`], or a store error if the environment cannot
    /// be opened.
    pub fn open(path: &Path) -> TableResult<Self> {
        let store = Store::open(path)?;
        let catalog = store.read(|reader| Catalog::load(reader))?;
        debug!(path = %path.display(), version = catalog.version(), "opened database");
        Ok(Self {
            store,
            catalog,
            write_lock: ReentrantMutex::new(()),
        })
    }

    /// Returns the catalog version stored at creation time.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.catalog.version()
    }

    /// Inserts one row in its own transaction and returns its primary key.
    ///
    /// Convenience form of [`Database::transaction`] for a single insert;
    /// see [`TxnContext::insert`] for the semantics.
    pub fn insert(&self, table: &str, row: &str) -> TableResult<String> {
        self.transaction(|txn| txn.insert(table, row))
    }

    /// Runs `unit_of_work` inside one shared write transaction.
    ///
    /// All inserts and removals issued through the provided [`TxnContext`]
    /// commit atomically when the closure returns `Ok`; any error aborts
    /// the transaction, leaving none of its writes visible, and is
    /// propagated to the caller.
    ///
    /// Write transactions serialize: concurrent calls on the same handle
    /// block until the previous unit of work commits or aborts.
    pub fn transaction<T, F>(&self, unit_of_work: F) -> TableResult<T>
    where
        F: FnOnce(&mut TxnContext<'_, '_>) -> TableResult<T>,
    {
        let _guard = self.write_lock.lock();
        let result = self.store.write(|scope| {
            let mut txn = TxnContext {
                catalog: &self.catalog,
                scope,
            };
            unit_of_work(&mut txn)
        });
        if let Err(TableError::Store(err)) = &result {
            if err.is_map_full() {
                // The map size is fixed at creation; this write can never
                // succeed on this environment.
                error!("write aborted: environment map is full");
            }
        }
        result
    }

    /// Returns the primary key assigned by the most recent insert into
    /// `table`, or `"0"` if the table has never been inserted into.
    pub fn last_insert_id(&self, table: &str) -> TableResult<String> {
        self.catalog.table(table)?;
        let key = keys::last_insert_id_key(table);
        self.store.read(|reader| {
            reader
                .get(&key)?
                .ok_or_else(|| TableError::missing_catalog_key(&key))
        })
    }

    /// Opens an iterator over the primary-key space of `table`.
    pub fn primary_key_iter(&self, table: &str) -> TableResult<RangeIter<'_>> {
        self.catalog.table(table)?;
        Ok(RangeIter::primary(self.store.snapshot()?, table))
    }

    /// Opens an iterator over the single-column index `column` of `table`.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::UnknownIndex`] if `column` has no declared
    /// index on `table`.
    pub fn index_iter(&self, table: &str, column: &str) -> TableResult<RangeIter<'_>> {
        let info = self.catalog.table(table)?;
        if !info.index_columns.iter().any(|c| c == column) {
            return Err(TableError::unknown_index(table, column));
        }
        let prefix = keys::index_prefix(table, column);
        Ok(RangeIter::index(self.store.snapshot()?, table, prefix))
    }

    /// Opens an iterator over the compound index declared over `columns`
    /// (in declaration order) of `table`.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::UnknownIndex`] if no compound index with
    /// exactly these columns, in this order, is declared on `table`.
    pub fn compound_index_iter(&self, table: &str, columns: &[&str]) -> TableResult<RangeIter<'_>> {
        let info = self.catalog.table(table)?;
        let declared = info.compound_indexes.iter().find(|declared| {
            declared.len() == columns.len()
                && declared.iter().zip(columns).all(|(a, b)| a == b)
        });
        let Some(declared) = declared else {
            return Err(TableError::unknown_index(table, columns.join(",")));
        };
        let prefix = keys::compound_index_prefix(table, declared);
        Ok(RangeIter::index(self.store.snapshot()?, table, prefix))
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("store", &self.store)
            .field("version", &self.catalog.version())
            .finish_non_exhaustive()
    }
}

/// Row mutations bound to one shared write transaction.
///
/// A `TxnContext` only exists inside [`Database::transaction`], so every
/// insert and removal necessarily runs under an active transaction.
pub struct TxnContext<'db, 'env> {
    catalog: &'db Catalog,
    scope: &'db mut WriteScope<'env>,
}

impl TxnContext<'_, '_> {
    /// Inserts a row document into `table` and returns its primary key.
    ///
    /// In one transaction: the row is stored verbatim under the next
    /// primary key of the table's sequence, the sequence and
    /// last-insert-id bookkeeping advance, and one index entry is written
    /// for every declared single-column and compound index. A row with N
    /// single and M compound indexes lands as exactly 1 + N + M pairs.
    ///
    /// Primary keys are unpadded decimal strings assigned from 1 upward
    /// and never reused; once a table crosses a power of ten their
    /// iteration order diverges from numeric order.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::MissingIndexColumn`] or
    /// [`TableError::NonStringColumn`] if the document lacks a string
    /// value for a declared index column; the transaction aborts with no
    /// partial writes.
    pub fn insert(&mut self, table: &str, row: &str) -> TableResult<String> {
        let info = self.catalog.table(table)?;
        let doc = parse_row(row)?;

        // Resolve every index key up front so a bad document fails the
        // insert before anything is staged.
        let mut index_keys = Vec::with_capacity(info.index_columns.len());
        for column in &info.index_columns {
            let value = string_field(&doc, table, column)?;
            index_keys.push(keys::index_key(table, column, value));
        }
        for columns in &info.compound_indexes {
            let mut values = Vec::with_capacity(columns.len());
            for column in columns {
                values.push(string_field(&doc, table, column)?);
            }
            index_keys.push(keys::compound_index_key(table, columns, &values));
        }

        let sequence_key = keys::next_pri_key_id_key(table);
        let pk = self
            .scope
            .try_get(&sequence_key)?
            .ok_or_else(|| TableError::missing_catalog_key(&sequence_key))?;
        let row_key = keys::row_key(table, &pk);

        self.scope.put(&row_key, row)?;
        self.scope.put(&keys::last_insert_id_key(table), &pk)?;
        let next = pk
            .parse::<u64>()
            .map_err(|_| TableError::corrupt_catalog(format!("bad sequence value: {pk}")))?
            + 1;
        self.scope.put(&sequence_key, &next.to_string())?;

        for index_key in &index_keys {
            self.scope.put(index_key, &row_key)?;
        }

        debug!(table, primary_key = %pk, entries = index_keys.len() + 1, "inserted row");
        Ok(pk)
    }

    /// Removes the row of `table` stored under `primary_key` together with
    /// every one of its index entries.
    ///
    /// The stored row document is read back first to recover the indexed
    /// column values; the index entries and the row are then deleted in
    /// the same transaction. The primary key is not reused.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::RowNotFound`] if no such row exists. Any
    /// failure aborts the transaction, rolling back partial deletions.
    pub fn remove(&mut self, table: &str, primary_key: &str) -> TableResult<()> {
        let info = self.catalog.table(table)?;
        let row_key = keys::row_key(table, primary_key);
        let row = self
            .scope
            .try_get(&row_key)?
            .ok_or_else(|| TableError::RowNotFound {
                table: table.to_owned(),
                primary_key: primary_key.to_owned(),
            })?;
        let doc = parse_row(&row)?;

        for column in &info.index_columns {
            let value = string_field(&doc, table, column)?;
            self.scope.delete(&keys::index_key(table, column, value))?;
        }
        for columns in &info.compound_indexes {
            let mut values = Vec::with_capacity(columns.len());
            for column in columns {
                values.push(string_field(&doc, table, column)?);
            }
            self.scope
                .delete(&keys::compound_index_key(table, columns, &values))?;
        }
        self.scope.delete(&row_key)?;

        debug!(table, primary_key, "removed row");
        Ok(())
    }
}

fn parse_row(raw: &str) -> TableResult<Map<String, Value>> {
    Ok(serde_json::from_str(raw)?)
}

fn string_field<'doc>(
    doc: &'doc Map<String, Value>,
    table: &str,
    column: &str,
) -> TableResult<&'doc str> {
    match doc.get(column) {
        Some(Value::String(value)) => Ok(value),
        Some(_) => Err(TableError::NonStringColumn {
            table: table.to_owned(),
            column: column.to_owned(),
        }),
        None => Err(TableError::MissingIndexColumn {
            table: table.to_owned(),
            column: column.to_owned(),
        }),
    }
}
