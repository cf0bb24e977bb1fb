//! Conversation management for medichat
//!
//! This crate provides the chat session manager: history expansion, attachment
//! staging, voice capture, canned reply selection and the per-exchange
//! persistence callback.

pub mod attachment;
pub mod history;
pub mod replies;
pub mod session;

// Re-export commonly used types
pub use attachment::{AttachmentSlot, AudioCapture, CaptureHandle, Recorder};
pub use history::expand_history;
pub use replies::ReplyPicker;
pub use session::{ChatSession, ExchangeStore, SessionConfig, SessionEvent};
