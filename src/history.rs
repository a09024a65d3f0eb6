use crate::error::AnalysisError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Per-sender sighting history, the one persisted entity in the system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SenderRecord {
    pub address: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub message_count: u64,
}

#[derive(Debug, Clone)]
pub struct Observation {
    pub record: SenderRecord,
    pub first_sighting: bool,
}

/// Narrow repository surface for sender history. `upsert` must be atomic:
/// concurrent observations of the same address must not lose an increment.
pub trait SenderHistory: Send + Sync {
    fn get(&self, address: &str) -> Result<Option<SenderRecord>, AnalysisError>;
    fn upsert(&self, address: &str, now: DateTime<Utc>) -> Result<Observation, AnalysisError>;
}

fn apply_upsert(
    table: &mut HashMap<String, SenderRecord>,
    address: &str,
    now: DateTime<Utc>,
) -> Observation {
    let key = address.to_lowercase();
    match table.get_mut(&key) {
        Some(record) => {
            record.last_seen = now;
            record.message_count += 1;
            Observation {
                record: record.clone(),
                first_sighting: false,
            }
        }
        None => {
            let record = SenderRecord {
                address: key.clone(),
                first_seen: now,
                last_seen: now,
                message_count: 1,
            };
            table.insert(key, record.clone());
            Observation {
                record,
                first_sighting: true,
            }
        }
    }
}

/// Volatile table for tests and history-less deployments.
#[derive(Default)]
pub struct InMemorySenderHistory {
    table: Mutex<HashMap<String, SenderRecord>>,
}

impl InMemorySenderHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SenderHistory for InMemorySenderHistory {
    fn get(&self, address: &str) -> Result<Option<SenderRecord>, AnalysisError> {
        let table = self
            .table
            .lock()
            .map_err(|e| AnalysisError::PersistenceFailure(e.to_string()))?;
        Ok(table.get(&address.to_lowercase()).cloned())
    }

    fn upsert(&self, address: &str, now: DateTime<Utc>) -> Result<Observation, AnalysisError> {
        let mut table = self
            .table
            .lock()
            .map_err(|e| AnalysisError::PersistenceFailure(e.to_string()))?;
        Ok(apply_upsert(&mut table, address, now))
    }
}

/// JSON-file-backed table. The whole read-modify-write-persist sequence runs
/// under one lock, which doubles as the atomic-upsert guarantee; retention
/// and expiry are an external policy concern.
pub struct FileSenderHistory {
    path: PathBuf,
    table: Mutex<HashMap<String, SenderRecord>>,
}

impl FileSenderHistory {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AnalysisError> {
        let path = path.as_ref().to_path_buf();
        let table = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| AnalysisError::PersistenceFailure(e.to_string()))?;
            serde_json::from_str(&content)
                .map_err(|e| AnalysisError::PersistenceFailure(e.to_string()))?
        } else {
            HashMap::new()
        };
        Ok(FileSenderHistory {
            path,
            table: Mutex::new(table),
        })
    }

    fn persist(&self, table: &HashMap<String, SenderRecord>) -> Result<(), AnalysisError> {
        let content = serde_json::to_string(table)
            .map_err(|e| AnalysisError::PersistenceFailure(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, content)
            .map_err(|e| AnalysisError::PersistenceFailure(e.to_string()))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| AnalysisError::PersistenceFailure(e.to_string()))?;
        Ok(())
    }
}

impl SenderHistory for FileSenderHistory {
    fn get(&self, address: &str) -> Result<Option<SenderRecord>, AnalysisError> {
        let table = self
            .table
            .lock()
            .map_err(|e| AnalysisError::PersistenceFailure(e.to_string()))?;
        Ok(table.get(&address.to_lowercase()).cloned())
    }

    fn upsert(&self, address: &str, now: DateTime<Utc>) -> Result<Observation, AnalysisError> {
        let mut table = self
            .table
            .lock()
            .map_err(|e| AnalysisError::PersistenceFailure(e.to_string()))?;
        let observation = apply_upsert(&mut table, address, now);
        self.persist(&table)?;
        Ok(observation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn first_then_repeat_sighting() {
        let store = InMemorySenderHistory::new();
        let t0 = Utc::now();

        let first = store.upsert("Alice@Example.COM", t0).unwrap();
        assert!(first.first_sighting);
        assert_eq!(first.record.message_count, 1);
        assert_eq!(first.record.address, "alice@example.com");

        let second = store.upsert("alice@example.com", t0).unwrap();
        assert!(!second.first_sighting);
        assert_eq!(second.record.message_count, 2);

        let fetched = store.get("ALICE@example.com").unwrap().unwrap();
        assert_eq!(fetched.message_count, 2);
        assert_eq!(fetched.first_seen, t0);
    }

    #[test]
    fn unknown_sender_is_absent() {
        let store = InMemorySenderHistory::new();
        assert!(store.get("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn concurrent_upserts_do_not_lose_increments() {
        let store = Arc::new(InMemorySenderHistory::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    store.upsert("bulk@example.com", Utc::now()).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        let record = store.get("bulk@example.com").unwrap().unwrap();
        assert_eq!(record.message_count, 400);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("senders.json");
        let now = Utc::now();

        {
            let store = FileSenderHistory::open(&path).unwrap();
            assert!(store.upsert("a@b.example", now).unwrap().first_sighting);
            store.upsert("a@b.example", now).unwrap();
        }

        let reopened = FileSenderHistory::open(&path).unwrap();
        let record = reopened.get("a@b.example").unwrap().unwrap();
        assert_eq!(record.message_count, 2);
        assert!(!reopened.upsert("a@b.example", now).unwrap().first_sighting);
    }
}
