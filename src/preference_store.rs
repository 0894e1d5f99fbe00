//! Durable key-value flags on LMDB.
//!
//! The site keeps exactly one piece of local state across sessions (the
//! language choice), but the store is generic over string keys and values.

use std::fs;
use std::path::{Path, PathBuf};

use lmdb::{Database, DatabaseFlags, Environment, Transaction, WriteFlags};
use log::info;

use crate::app_error::AppError;

const DB_NAME: &str = "preferences";
const MAP_SIZE: usize = 1024 * 1024;

pub struct PreferenceStore {
    env: Environment,
    db: Database,
    path: PathBuf,
}

impl PreferenceStore {
    /// Opens or creates the store in the `{name}.lmdb` directory.
    pub fn open(name: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = PathBuf::from(format!("{}.lmdb", name.as_ref().display()));
        fs::create_dir_all(&path).map_err(|e| {
            AppError::StorageError(format!("Cannot create {}: {e}", path.display()))
        })?;

        let env = Environment::new()
            .set_max_dbs(1)
            .set_map_size(MAP_SIZE)
            .open(&path)?;
        let db = env.create_db(Some(DB_NAME), DatabaseFlags::empty())?;

        info!("Preference store opened at {}", path.display());
        Ok(Self { env, db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let txn = self.env.begin_ro_txn()?;
        let value = match txn.get(self.db, &key) {
            Ok(bytes) => Some(String::from_utf8(bytes.to_vec()).map_err(|e| {
                AppError::SerializationError(format!("Preference '{key}' is not UTF-8: {e}"))
            })?),
            Err(lmdb::Error::NotFound) => None,
            Err(e) => return Err(e.into()),
        };
        txn.commit()?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        let mut txn = self.env.begin_rw_txn()?;
        txn.put(self.db, &key, &value, WriteFlags::empty())?;
        txn.commit()?;
        Ok(())
    }

    /// Returns whether the key existed.
    pub fn remove(&self, key: &str) -> Result<bool, AppError> {
        let mut txn = self.env.begin_rw_txn()?;
        let existed = match txn.del(self.db, &key, None) {
            Ok(()) => true,
            Err(lmdb::Error::NotFound) => false,
            Err(e) => return Err(e.into()),
        };
        txn.commit()?;
        Ok(existed)
    }
}
