//! LMDB environment wrapper and scoped transactions.

use crate::error::{StoreError, StoreResult};
use heed::types::Str;
use heed::{Env, EnvFlags, EnvOpenOptions, RoTxn, RwTxn};
use std::fmt;
use std::path::Path;

/// The single unnamed key/value database inside an environment.
type Tree = heed::Database<Str, Str>;

/// Environment flags shared by create and open.
///
/// No-subdirectory mode keeps the store in one file (plus the engine's
/// companion lock file), writes go through the memory map, and meta-page
/// fsyncs are skipped. NO_TLS lets one thread hold several read
/// transactions, which range iterators rely on.
fn env_flags() -> EnvFlags {
    EnvFlags::NO_SUB_DIR | EnvFlags::WRITE_MAP | EnvFlags::NO_META_SYNC | EnvFlags::NO_TLS
}

/// A handle to one LMDB environment and its sole key/value database.
///
/// `Store` is the narrow capability surface the table layer is written
/// against: get-by-exact-key, nearest-greater-or-equal seek, put, delete,
/// and scoped transactions. Nothing above this crate touches engine
/// handle types.
///
/// The environment is exclusively owned by this handle and released when
/// it is dropped. Cloning is deliberately not provided; share a `Store`
/// by reference.
pub struct Store {
    env: Env,
    tree: Tree,
}

impl Store {
    /// Creates a new environment file at `path` with a fixed maximum map
    /// size, in no-subdirectory mode.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if `path` already exists, or
    /// an engine error if the environment cannot be created.
    pub fn create(path: &Path, map_size: usize) -> StoreResult<Self> {
        if path.exists() {
            return Err(StoreError::AlreadyExists {
                path: path.display().to_string(),
            });
        }

        let mut options = EnvOpenOptions::new();
        options.map_size(map_size);
        options.max_dbs(10);
        Self::from_options(options, path)
    }

    /// Opens an existing environment file at `path`.
    ///
    /// The map size recorded in the file at creation time is adopted.
    ///
    /// # Errors
    ///
    /// Returns an engine error if the environment cannot be opened.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::from_options(EnvOpenOptions::new(), path)
    }

    fn from_options(mut options: EnvOpenOptions, path: &Path) -> StoreResult<Self> {
        // Opening a memory-mapped environment is unsafe by the engine
        // binding's contract: the caller must guarantee no other process
        // opens the same file with incompatible options.
        #[allow(unsafe_code)]
        let env = unsafe {
            options.flags(env_flags());
            options.open(path)?
        };

        // The unnamed database always exists; resolving it still needs a
        // write transaction the first time around.
        let mut txn = env.write_txn()?;
        let tree = env.create_database::<Str, Str>(&mut txn, None)?;
        txn.commit()?;

        Ok(Self { env, tree })
    }

    /// Runs `f` inside one read-write transaction.
    ///
    /// The transaction commits iff `f` returns `Ok`; any error aborts it
    /// and is propagated. The transaction is released exactly once on
    /// every exit path (an uncommitted transaction aborts on drop).
    ///
    /// The engine serializes read-write transactions: concurrent callers
    /// block until the previous write commits or aborts.
    pub fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut WriteScope<'_>) -> Result<T, E>,
    {
        let txn = self.env.write_txn().map_err(StoreError::from)?;
        let mut scope = WriteScope {
            txn,
            tree: self.tree,
        };
        let value = f(&mut scope)?;
        scope.txn.commit().map_err(StoreError::from)?;
        Ok(value)
    }

    /// Runs `f` inside one read-only transaction.
    ///
    /// The closure observes exactly the data committed before the
    /// transaction began (snapshot isolation); later commits are
    /// invisible to it.
    pub fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&Snapshot<'_>) -> Result<T, E>,
    {
        let snapshot = self.snapshot()?;
        f(&snapshot)
    }

    /// Opens a free-standing read-only snapshot.
    ///
    /// The snapshot holds its transaction for its entire lifetime, so the
    /// caller must bound that lifetime to avoid pinning old pages.
    pub fn snapshot(&self) -> StoreResult<Snapshot<'_>> {
        let txn = self.env.read_txn()?;
        Ok(Snapshot {
            txn,
            tree: self.tree,
        })
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.env.path())
            .finish_non_exhaustive()
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        // The engine keeps every open environment in a process-global
        // registry; the entry only goes away once the environment is
        // prepared for closing. Without this, a later open of the same
        // path fails on mismatched options.
        let _ = self.env.clone().prepare_for_closing();
    }
}

/// Operations bound to one read-write transaction.
///
/// Handed to the closure given to [`Store::write`]; all writes performed
/// through it land atomically when the closure returns `Ok`.
pub struct WriteScope<'env> {
    txn: RwTxn<'env>,
    tree: Tree,
}

impl WriteScope<'_> {
    /// Reads the value stored under `key`, or `None` if absent.
    pub fn try_get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.tree.get(&self.txn, key)?.map(str::to_owned))
    }

    /// Writes `value` under `key`, replacing any previous value.
    pub fn put(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.tree.put(&mut self.txn, key, value)?;
        Ok(())
    }

    /// Deletes the entry stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeyNotFound`] if the key is absent.
    pub fn delete(&mut self, key: &str) -> StoreResult<()> {
        if self.tree.delete(&mut self.txn, key)? {
            Ok(())
        } else {
            Err(StoreError::key_not_found(key))
        }
    }
}

/// Operations bound to one read-only transaction.
///
/// A snapshot observes the store as of the moment it was opened. Seek and
/// step operations are keyed rather than cursor-handle based: the caller
/// carries its current key and asks for the nearest neighbour, which keeps
/// positioning stateless on this side of the boundary.
pub struct Snapshot<'env> {
    txn: RoTxn<'env>,
    tree: Tree,
}

impl Snapshot<'_> {
    /// Reads the value stored under `key`, or `None` if absent.
    pub fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.tree.get(&self.txn, key)?.map(str::to_owned))
    }

    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeyNotFound`] if the key is absent.
    pub fn get_required(&self, key: &str) -> StoreResult<String> {
        self.get(key)?.ok_or_else(|| StoreError::key_not_found(key))
    }

    /// Positions on the smallest entry whose key is `>= key`.
    ///
    /// Returns `None` when no such entry exists.
    pub fn seek(&self, key: &str) -> StoreResult<Option<(String, String)>> {
        Ok(self
            .tree
            .get_greater_than_or_equal_to(&self.txn, key)?
            .map(owned_pair))
    }

    /// Returns the entry immediately after `key` in store order.
    pub fn next_after(&self, key: &str) -> StoreResult<Option<(String, String)>> {
        Ok(self.tree.get_greater_than(&self.txn, key)?.map(owned_pair))
    }

    /// Returns the entry immediately before `key` in store order.
    pub fn prev_before(&self, key: &str) -> StoreResult<Option<(String, String)>> {
        Ok(self.tree.get_lower_than(&self.txn, key)?.map(owned_pair))
    }
}

fn owned_pair((key, value): (&str, &str)) -> (String, String) {
    (key.to_owned(), value.to_owned())
}
