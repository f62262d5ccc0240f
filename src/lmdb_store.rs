use std::path::{Path, PathBuf};

use lmdb::{Cursor, Database, Environment, Transaction, WriteFlags};
use log::{info, warn};

use crate::app_response::AppResponse;
use crate::blob_store::BlobStore;

/// Durable blob backend on a single LMDB environment.
///
/// Every collection blob is one key in the environment's main database.
/// LMDB commits are atomic and read transactions see a stable snapshot, so
/// a reader never observes a partially written collection.
pub struct LmdbBlobStore {
    env: Environment,
    db: Database,
    path: PathBuf,
}

impl LmdbBlobStore {
    /// Opens (creating if needed) the environment directory at `path`.
    ///
    /// `map_size` is the maximum size of the memory map in bytes; writes
    /// beyond it fail with `StorageUnavailable`.
    pub fn open(path: impl AsRef<Path>, map_size: usize) -> Result<Self, AppResponse> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;

        let env = Environment::new()
            .set_map_size(map_size)
            .set_max_dbs(1)
            .open(&path)
            .map_err(|e| {
                warn!("Failed to open LMDB environment at {}: {e}", path.display());
                AppResponse::from(e)
            })?;
        let db = env.open_db(None)?;

        info!("LMDB environment ready at {}", path.display());
        Ok(Self { env, db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes buffered data to disk.
    pub fn sync(&self) -> Result<(), AppResponse> {
        self.env.sync(true)?;
        Ok(())
    }
}

impl BlobStore for LmdbBlobStore {
    fn read(&self, key: &str) -> Result<Option<String>, AppResponse> {
        let txn = self.env.begin_ro_txn()?;
        let text = match txn.get(self.db, &key) {
            Ok(bytes) => Some(String::from_utf8(bytes.to_vec()).map_err(|e| {
                AppResponse::StorageUnavailable(format!("blob '{key}' is not valid UTF-8: {e}"))
            })?),
            Err(lmdb::Error::NotFound) => None,
            Err(e) => return Err(e.into()),
        };
        txn.abort();
        Ok(text)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), AppResponse> {
        let mut txn = self.env.begin_rw_txn()?;
        txn.put(self.db, &key, &value, WriteFlags::empty())?;
        txn.commit()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, AppResponse> {
        let mut txn = self.env.begin_rw_txn()?;
        match txn.del(self.db, &key, None) {
            Ok(()) => {
                txn.commit()?;
                Ok(true)
            }
            Err(lmdb::Error::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, AppResponse> {
        let txn = self.env.begin_ro_txn()?;
        let keys = {
            let mut cursor = txn.open_ro_cursor(self.db)?;
            cursor
                .iter()
                .map(|(key, _)| String::from_utf8_lossy(key).into_owned())
                .collect::<Vec<_>>()
        };
        txn.abort();
        Ok(keys)
    }
}
