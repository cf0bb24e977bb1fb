use anyhow::Result;
use chrono::Local;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use medichat_types::{Message, MessageKind};

#[derive(Serialize)]
struct LogEntry<'a> {
    timestamp: String, // ISO-8601 local time
    role: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_name: Option<&'a str>,
}

/// Session transcript logger: one JSONL file per session under
/// `<data-dir>/logs`, named after the local start time.
pub struct ConversationLogger {
    file_path: PathBuf,
    file: Option<tokio::fs::File>,
}

impl ConversationLogger {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        let logs_dir = data_dir.join("logs");
        fs::create_dir_all(&logs_dir).await?;

        let now_local = Local::now();
        let filename = format!("mchat-{}.jsonl", now_local.format("%Y-%m-%d-%H%M%S"));
        let file_path = logs_dir.join(filename);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)
            .await?;
        Ok(Self {
            file_path,
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Append one entry. Logging failures are reported, never propagated.
    pub async fn log(&mut self, role: &str, content: &str) {
        self.write_entry(LogEntry {
            timestamp: Local::now().to_rfc3339(),
            role,
            content,
            kind: None,
            file_name: None,
        })
        .await;
    }

    /// Append an entry for an appended chat turn.
    pub async fn log_message(&mut self, message: &Message) {
        let kind = match message.kind {
            MessageKind::Text => None,
            MessageKind::File => Some("file"),
            MessageKind::Voice => Some("voice"),
        };
        self.write_entry(LogEntry {
            timestamp: Local::now().to_rfc3339(),
            role: if message.from_user { "user" } else { "assistant" },
            content: &message.text,
            kind,
            file_name: message.file_name.as_deref(),
        })
        .await;
    }

    async fn write_entry(&mut self, entry: LogEntry<'_>) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(err) => {
                eprintln!("⚠️  Failed to serialize log entry: {}", err);
                return;
            }
        };
        if let Err(err) = file.write_all(format!("{}\n", line).as_bytes()).await {
            eprintln!("⚠️  Failed to write log entry: {}", err);
        }
    }

    /// Flush and close the log file.
    pub async fn shutdown(&mut self) {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn logs_are_appended_as_jsonl() {
        let dir = TempDir::new().unwrap();
        let mut logger = ConversationLogger::new(dir.path()).await.unwrap();

        logger.log("system", "session start").await;
        logger.log_message(&Message::user_text("bonjour")).await;
        logger
            .log_message(&Message::file_turn("Document médical envoyé", "a.pdf", 1024))
            .await;
        logger.shutdown().await;

        let content = std::fs::read_to_string(logger.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);

        let entry: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(entry["role"], "user");
        assert_eq!(entry["content"], "bonjour");
        let file_entry: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(file_entry["kind"], "file");
        assert_eq!(file_entry["file_name"], "a.pdf");
    }
}
