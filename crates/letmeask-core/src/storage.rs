//! Persistent storage using redb.
//!
//! Backs the local stand-ins for the external collaborators:
//! - The realtime store tree (one JSON document)
//! - The account of the last interactive sign-in

use crate::error::{LetmeaskError, LetmeaskResult};
use crate::types::Account;
use parking_lot::RwLock;
use redb::{Database, DatabaseError, TableDefinition};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

// Table definitions
const STORE_TREE_TABLE: JsonTable = TableDefinition::new("store_tree");
const AUTH_SESSION_TABLE: JsonTable = TableDefinition::new("auth_session");

const TREE_KEY: &str = "root";
const ACCOUNT_KEY: &str = "account";

/// Storage layer using redb for ACID-compliant persistence
#[derive(Clone)]
pub struct Storage {
    db: Arc<RwLock<Database>>,
}

impl Storage {
    /// Create a new storage instance at the given path.
    ///
    /// This will:
    /// - Create the database directory if it doesn't exist
    /// - Initialize the database file
    /// - Create all required tables
    ///
    /// The file stays locked until every clone is dropped, so only one
    /// process can use a database at a time. A second open fails with
    /// `LetmeaskError::DatabaseInUse`.
    pub fn new(path: impl AsRef<Path>) -> LetmeaskResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path).map_err(|e| match e {
            DatabaseError::DatabaseAlreadyOpen => LetmeaskError::DatabaseInUse(path.to_path_buf()),
            other => other.into(),
        })?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(STORE_TREE_TABLE)?;
            let _ = write_txn.open_table(AUTH_SESSION_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Store Tree
    // ═══════════════════════════════════════════════════════════════════════

    /// Replace the persisted store tree.
    pub fn save_tree(&self, tree: &Value) -> LetmeaskResult<()> {
        let data = serde_json::to_vec(tree)?;
        self.put(STORE_TREE_TABLE, TREE_KEY, &data)
    }

    /// Load the persisted store tree, if one was ever saved.
    pub fn load_tree(&self) -> LetmeaskResult<Option<Value>> {
        self.get(STORE_TREE_TABLE, TREE_KEY)?
            .map(|bytes| serde_json::from_slice(&bytes).map_err(LetmeaskError::from))
            .transpose()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Auth Session
    // ═══════════════════════════════════════════════════════════════════════

    /// Remember the signed-in account.
    pub fn save_account(&self, account: &Account) -> LetmeaskResult<()> {
        let data = serde_json::to_vec(account)?;
        self.put(AUTH_SESSION_TABLE, ACCOUNT_KEY, &data)
    }

    /// Load the remembered account.
    ///
    /// Returns `None` if nobody signed in, or after [`Storage::clear_account`].
    pub fn load_account(&self) -> LetmeaskResult<Option<Account>> {
        self.get(AUTH_SESSION_TABLE, ACCOUNT_KEY)?
            .map(|bytes| serde_json::from_slice(&bytes).map_err(LetmeaskError::from))
            .transpose()
    }

    /// Forget the signed-in account.
    pub fn clear_account(&self) -> LetmeaskResult<()> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(AUTH_SESSION_TABLE)?;
            table.remove(ACCOUNT_KEY)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn put(&self, table: JsonTable, key: &str, data: &[u8]) -> LetmeaskResult<()> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(table)?;
            table.insert(key, data)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get(&self, table: JsonTable, key: &str) -> LetmeaskResult<Option<Vec<u8>>> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(table)?;
        Ok(table.get(key)?.map(|v| v.value().to_vec()))
    }
}
