//! Error types for TableDB core.

use thiserror::Error;

/// Result type for table operations.
pub type TableResult<T> = Result<T, TableError>;

/// Errors that can occur in TableDB operations.
///
/// Every error aborts the nearest enclosing store transaction before it is
/// surfaced; nothing is retried and nothing is swallowed.
#[derive(Debug, Error)]
pub enum TableError {
    /// Store adapter error (resource or capacity failure).
    #[error("store error: {0}")]
    Store(#[from] tabledb_store::StoreError),

    /// A row document or catalog entry is not valid JSON.
    #[error("document error: {0}")]
    Document(#[from] serde_json::Error),

    /// A catalog key that `create` always writes is absent.
    ///
    /// The database file is malformed or was not created through
    /// [`Database::create`](crate::Database::create).
    #[error("missing catalog key: {key}")]
    MissingCatalogKey {
        /// The absent key.
        key: String,
    },

    /// A catalog entry exists but cannot be interpreted.
    #[error("corrupt catalog: {message}")]
    CorruptCatalog {
        /// Description of the problem.
        message: String,
    },

    /// The named table is not part of the catalog.
    #[error("unknown table: {table}")]
    UnknownTable {
        /// The table that was named.
        table: String,
    },

    /// The named index is not declared on the table.
    #[error("unknown index on table {table}: {index}")]
    UnknownIndex {
        /// The table that was searched.
        table: String,
        /// The index that was named.
        index: String,
    },

    /// A table or column name is empty, reserved, or contains the key
    /// delimiter.
    #[error("invalid name: {name:?} (empty, reserved, or contains '_')")]
    InvalidName {
        /// The offending name.
        name: String,
    },

    /// A compound index references a column not declared on its table.
    #[error("compound index on table {table} references undeclared column {column:?}")]
    UndeclaredColumn {
        /// The table carrying the compound index.
        table: String,
        /// The column missing from the table's declared columns.
        column: String,
    },

    /// A row document does not carry a string value for an indexed column.
    #[error("row for table {table} is missing indexed column {column:?}")]
    MissingIndexColumn {
        /// The table being inserted into.
        table: String,
        /// The declared index column absent from the document.
        column: String,
    },

    /// An indexed column is present but its value is not a JSON string.
    #[error("column {column:?} of table {table} must be a string")]
    NonStringColumn {
        /// The table being inserted into.
        table: String,
        /// The column with the non-string value.
        column: String,
    },

    /// No row exists under the given primary key.
    #[error("no row in table {table} with primary key {primary_key}")]
    RowNotFound {
        /// The table that was searched.
        table: String,
        /// The primary key that was looked up.
        primary_key: String,
    },

    /// An index entry points at a row that no longer exists.
    #[error("index entry {key} points at a missing row")]
    DanglingIndexEntry {
        /// The index key whose pointer failed to resolve.
        key: String,
    },

    /// An iterator operation that requires a valid position was called
    /// without one.
    #[error("iterator is not positioned on a valid entry")]
    InvalidIterator,
}

impl TableError {
    /// Creates a missing-catalog-key error.
    pub fn missing_catalog_key(key: impl Into<String>) -> Self {
        Self::MissingCatalogKey { key: key.into() }
    }

    /// Creates a corrupt-catalog error.
    pub fn corrupt_catalog(message: impl Into<String>) -> Self {
        Self::CorruptCatalog {
            message: message.into(),
        }
    }

    /// Creates an unknown-table error.
    pub fn unknown_table(table: impl Into<String>) -> Self {
        Self::UnknownTable {
            table: table.into(),
        }
    }

    /// Creates an unknown-index error.
    pub fn unknown_index(table: impl Into<String>, index: impl Into<String>) -> Self {
        Self::UnknownIndex {
            table: table.into(),
            index: index.into(),
        }
    }

    /// Creates an invalid-name error.
    pub fn invalid_name(name: impl Into<String>) -> Self {
        Self::InvalidName { name: name.into() }
    }
}
