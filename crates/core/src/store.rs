//! Durable storage for the single season record.

use std::{
    fs,
    io::{ErrorKind as IoErrorKind, Write},
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::{
    error::{SeasonError, READ_ACTION},
    models::Season,
};

/// File name of the season record inside the data directory.
pub const SEASON_FILE_NAME: &str = "season.json";

/// Load/save interface for the persisted season.
pub trait SeasonStore: Send + Sync {
    /// Read the persisted season, if one has ever been written.
    fn load(&self) -> Result<Option<Season>, SeasonError>;

    /// Replace the persisted season. Readers never observe a partial write.
    fn save(&self, season: &Season) -> Result<(), SeasonError>;
}

/// Season record stored as pretty-printed JSON on disk.
#[derive(Debug, Clone)]
pub struct JsonSeasonStore {
    path: PathBuf,
    #[cfg(test)]
    fail_replace: bool,
}

impl JsonSeasonStore {
    /// Create a store backed by the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            #[cfg(test)]
            fail_replace: false,
        }
    }

    /// Default record location under the user's data directory.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("f1season")
            .join(SEASON_FILE_NAME)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Fail every save after the temp file is written, before it replaces the record.
    #[cfg(test)]
    fn failing_replace(mut self) -> Self {
        self.fail_replace = true;
        self
    }

    #[cfg(test)]
    fn before_replace(&self) -> Result<(), SeasonError> {
        if self.fail_replace {
            return Err(SeasonError::io(
                "replace",
                &self.path,
                std::io::Error::new(IoErrorKind::Other, "simulated replace failure"),
            ));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn before_replace(&self) -> Result<(), SeasonError> {
        Ok(())
    }
}

impl SeasonStore for JsonSeasonStore {
    fn load(&self) -> Result<Option<Season>, SeasonError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(SeasonError::io(READ_ACTION, &self.path, err)),
        };
        let season: Season = serde_json::from_str(&content).map_err(|err| {
            SeasonError::CorruptRecord(format!("failed to parse {}: {err}", self.path.display()))
        })?;
        season.validate()?;
        debug!(path = %self.path.display(), revision = season.revision, "season loaded");
        Ok(Some(season))
    }

    fn save(&self, season: &Season) -> Result<(), SeasonError> {
        let dir = self.parent_dir();
        fs::create_dir_all(&dir).map_err(|err| SeasonError::io("create", &dir, err))?;

        let serialised = serde_json::to_vec_pretty(season)?;
        let mut temp =
            NamedTempFile::new_in(&dir).map_err(|err| SeasonError::io("create temp file in", &dir, err))?;
        temp.write_all(&serialised)
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|err| SeasonError::io("write", temp.path().to_path_buf(), err))?;
        // Dropping `temp` on any error below removes it; the record is untouched until the rename.
        self.before_replace()?;
        temp.persist(&self.path)
            .map_err(|err| SeasonError::io("replace", &self.path, err.error))?;

        debug!(path = %self.path.display(), revision = season.revision, "season saved");
        Ok(())
    }
}

/// In-memory store for hosts without durable storage, and for tests.
#[derive(Debug, Default)]
pub struct MemorySeasonStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    season: Option<Season>,
    fail_writes: bool,
}

impl MemorySeasonStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a season.
    pub fn with_season(season: Season) -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                season: Some(season),
                fail_writes: false,
            }),
        }
    }

    /// Make every subsequent `save` fail until toggled back.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }
}

impl SeasonStore for MemorySeasonStore {
    fn load(&self) -> Result<Option<Season>, SeasonError> {
        Ok(self.inner.lock().season.clone())
    }

    fn save(&self, season: &Season) -> Result<(), SeasonError> {
        let mut inner = self.inner.lock();
        if inner.fail_writes {
            return Err(SeasonError::io(
                "write",
                "<memory>",
                std::io::Error::new(IoErrorKind::Other, "simulated write failure"),
            ));
        }
        inner.season = Some(season.clone());
        Ok(())
    }
}
