//! Attachment staging and voice capture.
//!
//! A session holds at most one pending attachment. Document staging validates
//! against the MIME allow-list before touching the slot; voice capture is a
//! two-phase scoped acquisition of the microphone with an unconditional
//! release on stop.

use anyhow::Result;
use async_trait::async_trait;
use medichat_types::{ChatError, MimeType, PendingAttachment};

// ============================================================================
// Pending attachment slot
// ============================================================================

/// The single pending-attachment slot of a session.
#[derive(Debug, Default)]
pub struct AttachmentSlot {
    pending: Option<PendingAttachment>,
}

impl AttachmentSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a document for the next send.
    ///
    /// A MIME type outside the allow-list fails with
    /// [`ChatError::UnsupportedAttachmentType`] and leaves the slot exactly as
    /// it was. On success the file replaces any previously staged attachment.
    pub fn stage_file(
        &mut self,
        name: impl Into<String>,
        size_bytes: u64,
        mime: &str,
    ) -> Result<(), ChatError> {
        let mime_type = MimeType::from_mime(mime).ok_or_else(|| {
            ChatError::UnsupportedAttachmentType {
                mime: mime.to_string(),
            }
        })?;

        self.pending = Some(PendingAttachment::File {
            name: name.into(),
            size_bytes,
            mime: mime_type,
        });
        Ok(())
    }

    /// Stage a finished voice capture for the next send.
    pub fn stage_voice(&mut self, audio: Vec<u8>) {
        self.pending = Some(PendingAttachment::Voice { audio });
    }

    /// Discard the pending attachment. No other effect.
    pub fn clear(&mut self) {
        self.pending = None;
    }

    /// Consume the pending attachment on send.
    pub fn take(&mut self) -> Option<PendingAttachment> {
        self.pending.take()
    }

    pub fn pending(&self) -> Option<&PendingAttachment> {
        self.pending.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }
}

// ============================================================================
// Voice capture
// ============================================================================

/// A granted microphone acquisition.
///
/// `finish` drains whatever was buffered; `release` gives the device back and
/// must always be called, whether or not `finish` succeeded.
#[async_trait]
pub trait CaptureHandle: Send {
    async fn finish(&mut self) -> Result<Vec<u8>>;
    fn release(&mut self);
}

/// Source of microphone acquisitions. Denial or absence of a device fails
/// with [`ChatError::CaptureUnavailable`].
#[async_trait]
pub trait AudioCapture: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn CaptureHandle>, ChatError>;
}

/// Two-phase voice recorder.
///
/// `start` requests the capability and transitions to recording on grant;
/// `stop` finalizes the capture, releases the microphone unconditionally and
/// returns to idle. A denied `start` leaves the recorder idle with nothing
/// acquired.
pub struct Recorder {
    backend: std::sync::Arc<dyn AudioCapture>,
    active: Option<Box<dyn CaptureHandle>>,
}

impl Recorder {
    pub fn new(backend: std::sync::Arc<dyn AudioCapture>) -> Self {
        Self {
            backend,
            active: None,
        }
    }

    /// Request the microphone and begin recording.
    pub async fn start(&mut self) -> Result<(), ChatError> {
        if self.active.is_some() {
            return Ok(());
        }
        let handle = self.backend.acquire().await?;
        self.active = Some(handle);
        Ok(())
    }

    /// Finalize the capture and release the microphone.
    ///
    /// The release happens even when finalization fails or nothing was
    /// buffered; afterwards the recorder is always idle.
    pub async fn stop(&mut self) -> Result<Vec<u8>> {
        let mut handle = match self.active.take() {
            Some(handle) => handle,
            None => return Ok(Vec::new()),
        };
        let captured = handle.finish().await;
        handle.release();
        captured
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }
}
