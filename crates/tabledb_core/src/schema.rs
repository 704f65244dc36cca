//! Schema description and the persisted catalog.
//!
//! A database is created from a declarative [`Schema`]: an ordered list of
//! table definitions, each with optional plain, indexed, and
//! compound-indexed column lists. [`Database::create`] writes the schema
//! into the store as catalog keys; at open the [`Catalog`] is read back
//! once and is immutable for the lifetime of the handle. Changing a schema
//! means creating a new database, not mutating a live catalog.
//!
//! [`Database::create`]: crate::Database::create

use crate::error::{TableError, TableResult};
use crate::keys;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tabledb_store::{Snapshot, WriteScope};

/// Declarative definition of one table.
///
/// The field names match the serialized schema layout, so a definition can
/// be written in Rust or deserialized from JSON:
///
/// ```json
/// {
///     "table_name": "segments",
///     "regular_columns": [ "sdp" ],
///     "index_columns": [ "time" ],
///     "compound_indexes": [ [ "channel", "time" ] ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TableDef {
    /// Name of the table.
    pub table_name: String,
    /// Columns stored in the row document but not indexed.
    #[serde(default)]
    pub regular_columns: Vec<String>,
    /// Columns with a single-column secondary index.
    #[serde(default)]
    pub index_columns: Vec<String>,
    /// Compound indexes, each an ordered list of column names.
    #[serde(default)]
    pub compound_indexes: Vec<Vec<String>>,
}

impl TableDef {
    /// Creates a table definition with no columns.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            regular_columns: Vec::new(),
            index_columns: Vec::new(),
            compound_indexes: Vec::new(),
        }
    }

    /// Adds an unindexed column.
    #[must_use]
    pub fn regular_column(mut self, name: impl Into<String>) -> Self {
        self.regular_columns.push(name.into());
        self
    }

    /// Adds a column with a single-column index.
    #[must_use]
    pub fn index_column(mut self, name: impl Into<String>) -> Self {
        self.index_columns.push(name.into());
        self
    }

    /// Adds a compound index over the given columns, in order.
    #[must_use]
    pub fn compound_index<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compound_indexes
            .push(columns.into_iter().map(Into::into).collect());
        self
    }
}

/// An ordered collection of table definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Schema {
    tables: Vec<TableDef>,
}

impl Schema {
    /// Creates a schema from table definitions.
    pub fn new(tables: Vec<TableDef>) -> Self {
        Self { tables }
    }

    /// Parses a schema from its JSON description.
    ///
    /// # Errors
    ///
    /// Returns a document error if `raw` is not a JSON array of table
    /// definitions.
    pub fn from_json(raw: &str) -> TableResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Returns the table definitions in declaration order.
    #[must_use]
    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    /// Checks every name against the key codec's rules.
    ///
    /// Names must be delimiter-free; table names must not be reserved key
    /// components or prefixes of one another (row scans are
    /// prefix-bounded); columns must be unique per table; compound indexes
    /// must reference declared columns and must not repeat a definition.
    pub(crate) fn validate(&self) -> TableResult<()> {
        let mut seen = BTreeSet::new();
        for table in &self.tables {
            let name = table.table_name.as_str();
            if !keys::is_valid_name(name) || keys::RESERVED_TABLE_NAMES.contains(&name) {
                return Err(TableError::invalid_name(name));
            }
            if !seen.insert(name) {
                return Err(TableError::corrupt_catalog(format!(
                    "duplicate table definition: {name}"
                )));
            }

            let mut columns = BTreeSet::new();
            for column in table.regular_columns.iter().chain(&table.index_columns) {
                if !keys::is_valid_name(column) {
                    return Err(TableError::invalid_name(column));
                }
                if !columns.insert(column.as_str()) {
                    return Err(TableError::corrupt_catalog(format!(
                        "duplicate column on table {name}: {column}"
                    )));
                }
            }

            let mut compounds = BTreeSet::new();
            for compound in &table.compound_indexes {
                for column in compound {
                    if !keys::is_valid_name(column) {
                        return Err(TableError::invalid_name(column));
                    }
                    if !columns.contains(column.as_str()) {
                        return Err(TableError::UndeclaredColumn {
                            table: name.to_owned(),
                            column: column.to_owned(),
                        });
                    }
                }
                if !compounds.insert(compound.as_slice()) {
                    return Err(TableError::corrupt_catalog(format!(
                        "duplicate compound index on table {name}: {}",
                        compound.join(",")
                    )));
                }
            }
        }

        // Sorted order puts any prefix right before its extensions.
        let names: Vec<&str> = seen.into_iter().collect();
        for pair in names.windows(2) {
            if pair[1].starts_with(pair[0]) {
                return Err(TableError::corrupt_catalog(format!(
                    "table name {:?} is a prefix of {:?}",
                    pair[0], pair[1]
                )));
            }
        }
        Ok(())
    }
}

/// Column and index metadata of one table, as loaded from the catalog.
#[derive(Debug, Clone, Default)]
pub struct TableInfo {
    /// Columns stored but not indexed.
    pub regular_columns: Vec<String>,
    /// Columns with a single-column index.
    pub index_columns: Vec<String>,
    /// Compound indexes in declaration order.
    pub compound_indexes: Vec<Vec<String>>,
}

/// The in-memory catalog: table name to metadata, plus the version.
///
/// Loaded once at open; never refreshed.
#[derive(Debug)]
pub(crate) struct Catalog {
    version: u32,
    tables: BTreeMap<String, TableInfo>,
}

impl Catalog {
    /// Reads the full catalog out of the store.
    pub(crate) fn load(reader: &Snapshot<'_>) -> TableResult<Self> {
        let version = read_catalog_key(reader, keys::VERSION_KEY)?
            .parse::<u32>()
            .map_err(|_| TableError::corrupt_catalog("version is not a number"))?;

        let names = decode_list(&read_catalog_key(reader, keys::TABLE_NAMES_KEY)?)?;

        let mut tables = BTreeMap::new();
        for name in names {
            let regular_columns =
                decode_list(&read_catalog_key(reader, &keys::regular_columns_key(&name))?)?;
            let index_columns =
                decode_list(&read_catalog_key(reader, &keys::index_columns_key(&name))?)?;
            let compound_raw = read_catalog_key(reader, &keys::compound_indexes_key(&name))?;
            let compound_indexes = decode_nested_list(&compound_raw)?
                .into_iter()
                .filter(|columns| !columns.is_empty())
                .collect();

            tables.insert(
                name,
                TableInfo {
                    regular_columns,
                    index_columns,
                    compound_indexes,
                },
            );
        }

        Ok(Self { version, tables })
    }

    /// Writes all catalog keys for `schema` inside the caller's transaction
    /// and seeds each table's primary-key sequence.
    pub(crate) fn persist(
        schema: &Schema,
        version: u32,
        writer: &mut WriteScope<'_>,
    ) -> TableResult<()> {
        writer.put(keys::VERSION_KEY, &version.to_string())?;

        let mut names = Vec::with_capacity(schema.tables().len());
        for table in schema.tables() {
            let name = table.table_name.as_str();
            names.push(name);

            writer.put(
                &keys::regular_columns_key(name),
                &encode(&table.regular_columns)?,
            )?;
            writer.put(
                &keys::index_columns_key(name),
                &encode(&table.index_columns)?,
            )?;
            writer.put(
                &keys::compound_indexes_key(name),
                &encode(&table.compound_indexes)?,
            )?;

            writer.put(&keys::next_pri_key_id_key(name), "1")?;
            writer.put(&keys::last_insert_id_key(name), "0")?;
        }

        writer.put(keys::TABLE_NAMES_KEY, &encode(&names)?)?;
        Ok(())
    }

    /// Returns the catalog version.
    pub(crate) fn version(&self) -> u32 {
        self.version
    }

    /// Looks a table up by name.
    pub(crate) fn table(&self, name: &str) -> TableResult<&TableInfo> {
        self.tables
            .get(name)
            .ok_or_else(|| TableError::unknown_table(name))
    }
}

fn read_catalog_key(reader: &Snapshot<'_>, key: &str) -> TableResult<String> {
    reader
        .get(key)?
        .ok_or_else(|| TableError::missing_catalog_key(key))
}

fn encode<T: Serialize>(value: &T) -> TableResult<String> {
    Ok(serde_json::to_string(value)?)
}

fn decode_list(raw: &str) -> TableResult<Vec<String>> {
    serde_json::from_str(raw)
        .map_err(|e| TableError::corrupt_catalog(format!("malformed list: {e}")))
}

fn decode_nested_list(raw: &str) -> TableResult<Vec<Vec<String>>> {
    serde_json::from_str(raw)
        .map_err(|e| TableError::corrupt_catalog(format!("malformed list: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_json_fills_defaults() {
        let schema = Schema::from_json(
            r#"[ { "table_name": "segments", "index_columns": [ "time" ] } ]"#,
        )
        .unwrap();

        let table = &schema.tables()[0];
        assert_eq!(table.table_name, "segments");
        assert!(table.regular_columns.is_empty());
        assert_eq!(table.index_columns, vec!["time".to_owned()]);
        assert!(table.compound_indexes.is_empty());
    }

    #[test]
    fn builder_matches_json_form() {
        let built = Schema::new(vec![TableDef::new("segments")
            .regular_column("sdp")
            .index_column("time")
            .compound_index(["channel", "time"])]);

        let parsed = Schema::from_json(
            r#"[ { "table_name": "segments",
                   "regular_columns": [ "sdp" ],
                   "index_columns": [ "time" ],
                   "compound_indexes": [ [ "channel", "time" ] ] } ]"#,
        )
        .unwrap();

        assert_eq!(built, parsed);
    }

    #[test]
    fn validate_rejects_delimiter_in_names() {
        let schema = Schema::new(vec![TableDef::new("segment_files")]);
        assert!(matches!(
            schema.validate(),
            Err(TableError::InvalidName { .. })
        ));

        let schema = Schema::new(vec![TableDef::new("segments").index_column("start_time")]);
        assert!(matches!(
            schema.validate(),
            Err(TableError::InvalidName { .. })
        ));

        let schema = Schema::new(vec![TableDef::new("segments")
            .regular_column("channel")
            .compound_index(["channel", "end_time"])]);
        assert!(matches!(
            schema.validate(),
            Err(TableError::InvalidName { .. })
        ));
    }

    #[test]
    fn validate_rejects_reserved_table_names() {
        for name in ["index", "table", "database", "next", "last"] {
            let schema = Schema::new(vec![TableDef::new(name)]);
            assert!(matches!(
                schema.validate(),
                Err(TableError::InvalidName { .. })
            ));
        }
    }

    #[test]
    fn validate_rejects_prefix_overlapping_tables() {
        // A scan of "seg" would walk into the rows of "segments".
        let schema = Schema::new(vec![TableDef::new("segments"), TableDef::new("seg")]);
        assert!(matches!(
            schema.validate(),
            Err(TableError::CorruptCatalog { .. })
        ));
    }

    #[test]
    fn validate_rejects_undeclared_compound_constituents() {
        let schema = Schema::new(vec![TableDef::new("segments")
            .index_column("time")
            .compound_index(["channel", "time"])]);
        assert!(matches!(
            schema.validate(),
            Err(TableError::UndeclaredColumn { .. })
        ));
    }

    #[test]
    fn validate_rejects_duplicate_columns() {
        let schema = Schema::new(vec![TableDef::new("segments")
            .index_column("time")
            .index_column("time")]);
        assert!(matches!(
            schema.validate(),
            Err(TableError::CorruptCatalog { .. })
        ));

        // Regular and indexed declarations share one namespace.
        let schema = Schema::new(vec![TableDef::new("segments")
            .regular_column("time")
            .index_column("time")]);
        assert!(matches!(
            schema.validate(),
            Err(TableError::CorruptCatalog { .. })
        ));
    }

    #[test]
    fn validate_rejects_duplicate_compound_definitions() {
        let schema = Schema::new(vec![TableDef::new("segments")
            .regular_column("channel")
            .regular_column("time")
            .compound_index(["channel", "time"])
            .compound_index(["channel", "time"])]);
        assert!(matches!(
            schema.validate(),
            Err(TableError::CorruptCatalog { .. })
        ));
    }

    #[test]
    fn validate_rejects_duplicates_and_empty_names() {
        let schema = Schema::new(vec![TableDef::new("segments"), TableDef::new("segments")]);
        assert!(matches!(
            schema.validate(),
            Err(TableError::CorruptCatalog { .. })
        ));

        let schema = Schema::new(vec![TableDef::new("")]);
        assert!(matches!(
            schema.validate(),
            Err(TableError::InvalidName { .. })
        ));
    }

    #[test]
    fn validate_accepts_well_formed_schema() {
        let schema = Schema::new(vec![
            TableDef::new("segments")
                .regular_column("channel")
                .index_column("time")
                .compound_index(["channel", "time"]),
            TableDef::new("channels").regular_column("name"),
        ]);
        schema.validate().unwrap();
    }
}
