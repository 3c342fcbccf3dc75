use super::snapshot::{SnapshotStore, StoreError, TermSnapshot};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Snapshot store backed by a single pretty-printed JSON file.
///
/// Writes go to a sibling `.tmp` file which is fsynced and then renamed over
/// the live file, so a crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct JsonFileSnapshotStore {
    path: PathBuf,
}

impl JsonFileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "glossary".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotStore for JsonFileSnapshotStore {
    fn load(&self) -> Result<Option<TermSnapshot>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => {
                let snapshot: TermSnapshot = serde_json::from_slice(&bytes)?;
                info!(path = %self.path.display(), rows = snapshot.terms.len(), "Loaded glossary snapshot");
                Ok(Some(snapshot))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No glossary snapshot yet, starting empty");
                Ok(None)
            }
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    fn persist(&self, snapshot: &TermSnapshot) -> Result<(), StoreError> {
        let parent = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty());
        if let Some(parent) = parent {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.tmp_path();
        let payload = serde_json::to_vec_pretty(snapshot)?;
        if let Err(err) = write_synced(&tmp, &payload).and_then(|_| fs::rename(&tmp, &self.path)) {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::Io(err));
        }
        if let Some(parent) = parent {
            settle_rename(parent, sync_dir);
        }
        debug!(path = %self.path.display(), bytes = payload.len(), rows = snapshot.terms.len(), "Persisted glossary snapshot");
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

fn write_synced(path: &Path, payload: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(payload)?;
    file.sync_all()
}

/// Syncs the directory so the rename survives a crash. The new snapshot is
/// already live at this point, so a failure here is reported but not returned.
fn settle_rename(dir: &Path, sync: impl FnOnce(&Path) -> io::Result<()>) -> bool {
    match sync(dir) {
        Ok(()) => true,
        Err(err) => {
            warn!(dir = %dir.display(), "Snapshot renamed into place but directory sync failed: {}", err);
            false
        }
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::snapshot::{SNAPSHOT_FORMAT_VERSION, TermRecord};
    use chrono::Utc;
    use tempfile::TempDir;

    fn sample_snapshot() -> TermSnapshot {
        let at = Utc::now();
        TermSnapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            next_id: 3,
            terms: vec![TermRecord {
                id: 2,
                term: "Kafka".to_string(),
                definition: "Distributed event streaming platform".to_string(),
                created_at: at,
                updated_at: at,
            }],
        }
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileSnapshotStore::new(dir.path().join("glossary.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn persist_creates_parent_directories_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("db").join("glossary.json");
        let store = JsonFileSnapshotStore::new(&path);
        let snapshot = sample_snapshot();

        store.persist(&snapshot).unwrap();

        assert!(path.exists());
        assert!(!store.tmp_path().exists());
        assert_eq!(store.load().unwrap(), Some(snapshot));
    }

    #[test]
    fn persist_replaces_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileSnapshotStore::new(dir.path().join("glossary.json"));
        store.persist(&sample_snapshot()).unwrap();
        store.persist(&TermSnapshot::default()).unwrap();
        assert_eq!(store.load().unwrap(), Some(TermSnapshot::default()));
    }

    #[test]
    fn garbage_file_is_a_serialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("glossary.json");
        fs::write(&path, b"{ not json").unwrap();
        let store = JsonFileSnapshotStore::new(&path);
        assert!(matches!(store.load(), Err(StoreError::Serialization(_))));
    }

    #[test]
    fn directory_sync_failure_does_not_fail_a_completed_rename() {
        let dir = TempDir::new().unwrap();
        let synced = settle_rename(dir.path(), |_| Err(io::Error::other("EIO")));
        assert!(!synced);
        assert!(settle_rename(dir.path(), sync_dir));
    }

    #[test]
    fn persist_into_unwritable_location_fails() {
        let dir = TempDir::new().unwrap();
        // A regular file where the parent directory should be
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"").unwrap();
        let store = JsonFileSnapshotStore::new(blocker.join("glossary.json"));
        assert!(matches!(
            store.persist(&sample_snapshot()),
            Err(StoreError::Io(_))
        ));
    }
}
