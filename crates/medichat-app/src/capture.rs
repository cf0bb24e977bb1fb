//! File-backed audio capture for the CLI.
//!
//! There is no real microphone on a terminal session; `/record` reads a
//! configured audio file as the captured buffer instead. A missing or
//! unreadable file behaves like a denied microphone permission.

use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;

use medichat_chat::{AudioCapture, CaptureHandle};
use medichat_types::ChatError;

pub struct FileAudioCapture {
    source: PathBuf,
}

impl FileAudioCapture {
    pub fn new(source: PathBuf) -> Self {
        Self { source }
    }
}

#[async_trait]
impl AudioCapture for FileAudioCapture {
    async fn acquire(&self) -> Result<Box<dyn CaptureHandle>, ChatError> {
        let audio = tokio::fs::read(&self.source).await.map_err(|err| {
            ChatError::CaptureUnavailable(format!("{}: {}", self.source.display(), err))
        })?;
        Ok(Box::new(FileCaptureHandle { audio: Some(audio) }))
    }
}

struct FileCaptureHandle {
    audio: Option<Vec<u8>>,
}

#[async_trait]
impl CaptureHandle for FileCaptureHandle {
    async fn finish(&mut self) -> Result<Vec<u8>> {
        Ok(self.audio.take().unwrap_or_default())
    }

    fn release(&mut self) {
        // Nothing held beyond the buffer.
        self.audio = None;
    }
}
