use std::io::ErrorKind;
use std::path::PathBuf;

use csm_driver::MachineRecord;

const RECORD_FILE: &str = "config.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("machine store io: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt machine record: {0}")]
    Json(#[from] serde_json::Error),
}

/// Machine records on disk, one directory per machine.
#[derive(Debug, Clone)]
pub struct MachineStore {
    root: PathBuf,
}

impl MachineStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.root.join(name).join(RECORD_FILE)
    }

    pub async fn save(&self, record: &MachineRecord) -> Result<(), StoreError> {
        let path = self.record_path(&record.machine_name);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let json = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&path, json).await?;
        Ok(())
    }

    pub async fn load(&self, name: &str) -> Result<Option<MachineRecord>, StoreError> {
        match tokio::fs::read(self.record_path(name)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Every stored record, sorted by machine name.
    ///
    /// Directories without a record file (e.g. a key left by a failed
    /// create) are skipped.
    pub async fn list(&self) -> Result<Vec<MachineRecord>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(record) = self.load(&name).await? {
                records.push(record);
            }
        }
        records.sort_by(|a, b| a.machine_name.cmp(&b.machine_name));
        Ok(records)
    }

    /// Delete the machine's directory, key material included.
    pub async fn remove(&self, name: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_dir_all(self.root.join(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
