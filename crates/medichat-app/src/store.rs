//! On-disk conversation store.
//!
//! One JSONL file per patient under the data directory. The store is the
//! session's injected persistence collaborator: it appends a record per
//! completed exchange and replays the file at startup to seed history.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use medichat_chat::ExchangeStore;
use medichat_types::ConversationRecord;

pub struct ConversationStore {
    data_dir: PathBuf,
}

impl ConversationStore {
    /// Create a store rooted at `data_dir`, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
        Ok(Self { data_dir })
    }

    fn history_path(&self, patient_id: &str) -> PathBuf {
        self.data_dir.join(format!("{}.jsonl", patient_id))
    }

    /// Load the persisted exchanges for a patient, oldest first.
    ///
    /// Unreadable lines are skipped with a warning rather than failing the
    /// whole load.
    pub async fn load_history(&self, patient_id: &str) -> Result<Vec<ConversationRecord>> {
        let path = self.history_path(patient_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read history from {}", path.display()))?;

        let mut records = Vec::new();
        for line in content.lines().filter(|line| !line.trim().is_empty()) {
            match serde_json::from_str::<ConversationRecord>(line) {
                Ok(record) => records.push(record),
                Err(err) => {
                    eprintln!("⚠️  Skipping malformed history line: {}", err);
                }
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl ExchangeStore for ConversationStore {
    async fn save_exchange(&self, record: &ConversationRecord) -> Result<()> {
        let path = self.history_path(&record.patient_id);
        let line = serde_json::to_string(record).context("Failed to serialize exchange")?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open history file {}", path.display()))?;

        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(patient_id: &str, n: usize) -> ConversationRecord {
        ConversationRecord {
            patient_id: patient_id.to_string(),
            user_message: format!("question {}", n),
            bot_response: format!("réponse {}", n),
            timestamp: Utc::now(),
            language: "fr".to_string(),
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips_in_order() {
        let dir = TempDir::new().unwrap();
        let store = ConversationStore::new(dir.path()).unwrap();

        for n in 0..3 {
            store.save_exchange(&record("p-1", n)).await.unwrap();
        }

        let history = store.load_history("p-1").await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].user_message, "question 0");
        assert_eq!(history[2].user_message, "question 2");
    }

    #[tokio::test]
    async fn histories_are_separated_by_patient() {
        let dir = TempDir::new().unwrap();
        let store = ConversationStore::new(dir.path()).unwrap();

        store.save_exchange(&record("p-1", 0)).await.unwrap();
        store.save_exchange(&record("p-2", 0)).await.unwrap();

        assert_eq!(store.load_history("p-1").await.unwrap().len(), 1);
        assert_eq!(store.load_history("p-2").await.unwrap().len(), 1);
        assert!(store.load_history("p-3").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let store = ConversationStore::new(dir.path()).unwrap();

        store.save_exchange(&record("p-1", 0)).await.unwrap();
        let path = dir.path().join("p-1.jsonl");
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("not json\n");
        std::fs::write(&path, content).unwrap();
        store.save_exchange(&record("p-1", 1)).await.unwrap();

        let history = store.load_history("p-1").await.unwrap();
        assert_eq!(history.len(), 2);
    }
}
