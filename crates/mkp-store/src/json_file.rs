//! Single-file JSON store.
//!
//! The table lives on disk only; every operation reloads it. Mutations run
//! under an exclusive `fs2` lock on a sibling `.lock` file, so several
//! processes (daemon, `mkp replay`, `mkp usage report`) can share one file:
//! each writer re-reads the current table under the lock, applies its change
//! and commits before releasing it.
//!
//! Commit path: serialize the table, write it to a sibling `.tmp` file,
//! fsync, rename over the target. Readers never take the lock; the rename
//! means they see either the previous table or the next one. A failed
//! commit leaves the previous file in place.
//!
//! File I/O runs on the blocking pool.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use mkp_schemas::Customer;
use tokio::sync::Mutex;

use crate::{RecordStore, StoreError};

type Table = BTreeMap<String, Customer>;

pub struct JsonFileStore {
    path: PathBuf,
    // In-process writers queue here instead of parking blocking-pool threads on the file lock.
    writer: Mutex<()>,
}

impl JsonFileStore {
    /// Open the table at `path`. A missing file is an empty table; a corrupt
    /// one is rejected here rather than on first use.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let table = load_table(&path)?;
        tracing::debug!(path = %path.display(), records = table.len(), "json store opened");
        Ok(Self {
            path,
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn snapshot(&self) -> Result<Table, StoreError> {
        let path = self.path.clone();
        run_blocking(&self.path, move || load_table(&path)).await
    }

    /// Reload under the file lock, apply `change`, commit if it reports a change.
    async fn mutate<F>(&self, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Table) -> bool + Send + 'static,
    {
        let _writer = self.writer.lock().await;
        let path = self.path.clone();
        run_blocking(&self.path, move || {
            let _lock = CommitLock::acquire(&path)?;
            let mut table = load_table(&path)?;
            if change(&mut table) {
                commit(&path, &table)?;
            }
            Ok(())
        })
        .await
    }
}

async fn run_blocking<T, F>(path: &Path, f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::io(path, std::io::Error::other(e)))?
}

fn load_table(path: &Path) -> Result<Table, StoreError> {
    match fs::read(path) {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Table::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Table::new()),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

fn commit(path: &Path, table: &Table) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(table)?;
    let tmp = sibling(path, ".tmp");
    {
        let mut f = File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
        f.write_all(&bytes).map_err(|e| StoreError::io(&tmp, e))?;
        f.sync_all().map_err(|e| StoreError::io(&tmp, e))?;
    }
    fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))?;
    Ok(())
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "customers.json".into());
    name.push(suffix);
    path.with_file_name(name)
}

/// Exclusive advisory lock on `<table>.lock`, released on drop.
///
/// The lock file itself is left behind; removing it would let a waiter lock
/// an unlinked inode.
struct CommitLock {
    file: File,
}

impl CommitLock {
    fn acquire(table_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = table_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let lock_path = sibling(table_path, ".lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| StoreError::io(&lock_path, e))?;
        file.lock_exclusive()
            .map_err(|e| StoreError::io(&lock_path, e))?;
        Ok(Self { file })
    }
}

impl Drop for CommitLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn read(&self, procurement_account_id: &str) -> Result<Option<Customer>, StoreError> {
        Ok(self.snapshot().await?.remove(procurement_account_id))
    }

    async fn write(&self, customer: &Customer) -> Result<(), StoreError> {
        let customer = customer.clone();
        self.mutate(move |table| {
            table.insert(customer.procurement_account_id.clone(), customer);
            true
        })
        .await
    }

    async fn delete(&self, procurement_account_id: &str) -> Result<(), StoreError> {
        let id = procurement_account_id.to_string();
        self.mutate(move |table| table.remove(&id).is_some()).await
    }

    async fn list_all(&self) -> Result<Vec<Customer>, StoreError> {
        Ok(self.snapshot().await?.into_values().collect())
    }

    fn kind(&self) -> &'static str {
        "json_file"
    }
}
