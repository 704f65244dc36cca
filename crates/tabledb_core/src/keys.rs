//! Key codec: the flat keyspace layout.
//!
//! Every higher-level entity - rows, index entries, catalog metadata - is a
//! plain key/value pair in one shared, lexicographically ordered keyspace.
//! This module is the single place that knows the layout:
//!
//! | entity | key |
//! |---|---|
//! | catalog version | `database_version` |
//! | table list | `table_names` |
//! | plain columns | `regular_columns_<table>` |
//! | indexed columns | `index_columns_<table>` |
//! | compound indexes | `compound_indexes_<table>` |
//! | next primary key | `next_pri_key_id_<table>` |
//! | last inserted key | `last_insert_id_<table>` |
//! | row | `<table>_<pk>` |
//! | index entry | `index_<table>_<column>_<value>` |
//! | compound entry | `index_<table>_<col1>_<col2>..._<val1>_<val2>...` |
//!
//! `_` is the reserved component delimiter. Table and column names must not
//! contain it - [`is_valid_name`] is enforced when a schema is constructed,
//! so key building itself can never fail. Indexed *values* are opaque and
//! unrestricted.
//!
//! Lexicographic key order doubles as iteration order. Primary keys are
//! unpadded decimal strings, so their iteration order diverges from numeric
//! order once a table crosses a power of ten ("10" sorts before "9").

/// The reserved component delimiter.
pub const DELIMITER: char = '_';

/// Key of the catalog version entry.
pub const VERSION_KEY: &str = "database_version";

/// Key of the serialized table-name list.
pub const TABLE_NAMES_KEY: &str = "table_names";

/// Leading key components claimed by the catalog and index layouts.
///
/// Row scans are prefix-bounded, so a table carrying one of these names
/// would pull catalog or index entries into its primary-key space.
pub const RESERVED_TABLE_NAMES: &[&str] = &[
    "compound", "database", "index", "last", "next", "regular", "table",
];

/// Returns `true` if `name` may be used as a table or column name.
///
/// Names must be non-empty and must not contain [`DELIMITER`], otherwise
/// prefix matching over the shared keyspace becomes ambiguous.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(DELIMITER)
}

/// Key under which the row with primary key `pk` of `table` is stored.
#[must_use]
pub fn row_key(table: &str, pk: &str) -> String {
    format!("{table}{DELIMITER}{pk}")
}

/// Prefix delimiting the primary-key space of `table`.
#[must_use]
pub fn row_prefix(table: &str) -> String {
    table.to_owned()
}

/// Key of the single-column index entry for `value` in `column` of `table`.
#[must_use]
pub fn index_key(table: &str, column: &str, value: &str) -> String {
    format!("index{DELIMITER}{table}{DELIMITER}{column}{DELIMITER}{value}")
}

/// Prefix delimiting the index space of `column` on `table`.
#[must_use]
pub fn index_prefix(table: &str, column: &str) -> String {
    format!("index{DELIMITER}{table}{DELIMITER}{column}")
}

/// Key of the compound index entry for `values` under the index declared
/// over `columns` of `table`.
///
/// Column names come first in declared order, then the values in the same
/// order, each component preceded by the delimiter.
#[must_use]
pub fn compound_index_key(table: &str, columns: &[String], values: &[&str]) -> String {
    let mut key = compound_index_prefix(table, columns);
    for value in values {
        key.push(DELIMITER);
        key.push_str(value);
    }
    key
}

/// Prefix delimiting the compound index space declared over `columns` of
/// `table` (column names only, no values).
#[must_use]
pub fn compound_index_prefix(table: &str, columns: &[String]) -> String {
    let mut prefix = format!("index{DELIMITER}{table}");
    for column in columns {
        prefix.push(DELIMITER);
        prefix.push_str(column);
    }
    prefix
}

/// Seek target for positioning at `value` within a prefix-delimited region.
///
/// An empty `value` yields `<prefix>_`, which seeks to the first key of the
/// region.
#[must_use]
pub fn seek_key(prefix: &str, value: &str) -> String {
    format!("{prefix}{DELIMITER}{value}")
}

/// Seek target for positioning at an ordered (possibly partial) value list
/// within a compound index region.
#[must_use]
pub fn seek_key_values(prefix: &str, values: &[&str]) -> String {
    let mut key = prefix.to_owned();
    for value in values {
        key.push(DELIMITER);
        key.push_str(value);
    }
    key
}

/// Extracts the primary key from a row key of `table`.
///
/// Index entries store the pointed-to row key as their value, so this also
/// recovers the primary key from an index pointer. Returns `None` if `key`
/// does not belong to the primary-key space of `table`.
#[must_use]
pub fn primary_key_of<'a>(table: &str, key: &'a str) -> Option<&'a str> {
    let rest = key.strip_prefix(table)?;
    rest.strip_prefix(DELIMITER)
}

/// Key of the primary-key sequence counter of `table`.
#[must_use]
pub fn next_pri_key_id_key(table: &str) -> String {
    format!("next_pri_key_id{DELIMITER}{table}")
}

/// Key of the last-inserted-primary-key entry of `table`.
#[must_use]
pub fn last_insert_id_key(table: &str) -> String {
    format!("last_insert_id{DELIMITER}{table}")
}

/// Key of the serialized plain-column list of `table`.
#[must_use]
pub fn regular_columns_key(table: &str) -> String {
    format!("regular_columns{DELIMITER}{table}")
}

/// Key of the serialized single-column index list of `table`.
#[must_use]
pub fn index_columns_key(table: &str) -> String {
    format!("index_columns{DELIMITER}{table}")
}

/// Key of the serialized compound index definitions of `table`.
#[must_use]
pub fn compound_indexes_key(table: &str) -> String {
    format!("compound_indexes{DELIMITER}{table}")
}
