//! Serialized access to the persisted season.
//!
//! Every mutating operation runs inside a [`SeasonTxn`], which holds the
//! single writer lock from load to commit. Readers use [`SeasonRepository::snapshot`]
//! or [`SeasonRepository::reload`], which never take the writer lock and only
//! ever see committed records.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{error::SeasonError, models::Season, store::SeasonStore};

/// Handle passed to every season operation.
pub struct SeasonRepository {
    store: Arc<dyn SeasonStore>,
    writer: Mutex<()>,
    committed: RwLock<Option<Season>>,
}

impl SeasonRepository {
    /// Wrap a store.
    pub fn new(store: Arc<dyn SeasonStore>) -> Self {
        Self {
            store,
            writer: Mutex::new(()),
            committed: RwLock::new(None),
        }
    }

    /// Latest committed season, loading it from the store on first use.
    pub fn snapshot(&self) -> Result<Option<Season>, SeasonError> {
        if let Some(season) = self.committed.read().as_ref() {
            return Ok(Some(season.clone()));
        }
        let loaded = self.store.load()?;
        let mut committed = self.committed.write();
        // A writer may have committed while the store was being read.
        if committed.is_none() {
            *committed = loaded.clone();
            return Ok(loaded);
        }
        Ok(committed.clone())
    }

    /// Re-read the record from the store and replace the cached snapshot.
    ///
    /// Picks up writes made by other processes. The cache lock is held across
    /// the read so a concurrent commit cannot be overwritten by an older record.
    pub fn reload(&self) -> Result<Option<Season>, SeasonError> {
        let mut committed = self.committed.write();
        let loaded = self.store.load()?;
        debug!(
            revision = ?loaded.as_ref().map(|season| season.revision),
            "season snapshot reloaded"
        );
        *committed = loaded.clone();
        Ok(loaded)
    }

    /// Start a write transaction, waiting for any in-flight writer.
    pub async fn begin(&self) -> SeasonTxn<'_> {
        let guard = self.writer.lock().await;
        SeasonTxn {
            repo: self,
            _guard: guard,
            base_revision: None,
        }
    }
}

/// Exclusive load-mutate-save scope over the season record.
pub struct SeasonTxn<'a> {
    repo: &'a SeasonRepository,
    _guard: MutexGuard<'a, ()>,
    base_revision: Option<u64>,
}

impl SeasonTxn<'_> {
    /// Read the current record from durable storage.
    pub fn load(&mut self) -> Result<Option<Season>, SeasonError> {
        let season = self.repo.store.load()?;
        self.base_revision = season.as_ref().map(|season| season.revision);
        Ok(season)
    }

    /// Persist `season` as the next revision and publish it to readers.
    ///
    /// Fails with [`SeasonError::RevisionConflict`] if the stored record moved
    /// since [`SeasonTxn::load`], which only happens when another process
    /// writes the same file.
    pub fn commit(self, mut season: Season) -> Result<Season, SeasonError> {
        let stored = self.repo.store.load()?.map(|season| season.revision);
        if stored != self.base_revision {
            warn!(
                expected = ?self.base_revision,
                found = ?stored,
                "season record changed outside this process"
            );
            return Err(SeasonError::RevisionConflict {
                expected: self.base_revision.unwrap_or_default(),
                found: stored.unwrap_or_default(),
            });
        }

        season.revision = self.base_revision.map_or(1, |revision| revision + 1);
        self.repo.store.save(&season)?;
        *self.repo.committed.write() = Some(season.clone());
        debug!(season_id = %season.season_id, revision = season.revision, "season committed");
        Ok(season)
    }
}
