//! Core types and structures for medichat
//!
//! This crate provides the foundational types used across all medichat crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Language
// ============================================================================

/// Languages the assistant can answer in.
///
/// The language selector hands us an arbitrary code; `"en"` selects English,
/// every other code (fr, bas, dua, ew, ...) falls back to French, the default
/// of the original deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    French,
    English,
}

impl Language {
    pub fn from_code(code: &str) -> Self {
        match code.to_lowercase().as_str() {
            "en" => Language::English,
            _ => Language::French,
        }
    }

    /// Code persisted alongside each exchange.
    pub fn code(&self) -> &'static str {
        match self {
            Language::French => "fr",
            Language::English => "en",
        }
    }

    /// Greeting shown when a session starts with no prior history.
    pub fn greeting(&self) -> &'static str {
        match self {
            Language::French => {
                "Bonjour ! Je suis votre assistant médical IA. Comment puis-je vous aider aujourd'hui ? 🩺"
            }
            Language::English => {
                "Hello! I am your AI medical assistant. How can I help you today? 🩺"
            }
        }
    }

    /// Canned assistant replies; one is picked uniformly at random per exchange.
    pub fn reply_pool(&self) -> &'static [&'static str] {
        match self {
            Language::French => &[
                "Je comprends votre préoccupation. Pouvez-vous me donner plus de détails sur vos symptômes ? 🤔",
                "Merci pour ces informations. Depuis quand ressentez-vous ces symptômes ? 📋",
                "D'accord, j'ai bien reçu votre document. Laissez-moi l'analyser pour vous aider au mieux. 📄",
                "Ces symptômes peuvent avoir plusieurs causes. Avez-vous des antécédents médicaux particuliers ? 🏥",
                "J'ai bien reçu votre message vocal. Pouvez-vous répéter ou préciser certains points ? 🔊",
            ],
            Language::English => &[
                "I understand your concern. Can you give me more details about your symptoms? 🤔",
                "Thank you for this information. How long have you been experiencing these symptoms? 📋",
                "Alright, I have received your document. Let me analyze it to help you as best I can. 📄",
                "These symptoms can have several causes. Do you have any relevant medical history? 🏥",
                "I received your voice message. Could you repeat or clarify some points? 🔊",
            ],
        }
    }

    /// Text of the user turn generated for a staged document.
    pub fn file_turn_label(&self) -> &'static str {
        match self {
            Language::French => "Document médical envoyé",
            Language::English => "Medical document sent",
        }
    }

    /// Text of the user turn generated for a finished voice capture.
    pub fn voice_turn_label(&self) -> &'static str {
        match self {
            Language::French => "Message vocal envoyé 🎤",
            Language::English => "Voice message sent 🎤",
        }
    }

    /// Input prompt placeholder.
    pub fn placeholder(&self) -> &'static str {
        match self {
            Language::French => "Décrivez vos symptômes ou posez votre question médicale...",
            Language::English => "Describe your symptoms or ask your medical question...",
        }
    }

    /// User-facing notice for a rejected attachment type.
    pub fn unsupported_file_alert(&self) -> &'static str {
        match self {
            Language::French => {
                "Type de fichier non supporté. Veuillez choisir un PDF, une image ou un fichier texte."
            }
            Language::English => {
                "Unsupported file type. Please choose a PDF, an image or a text file."
            }
        }
    }

    /// User-facing notice when the microphone cannot be acquired.
    pub fn capture_unavailable_alert(&self) -> &'static str {
        match self {
            Language::French => {
                "Impossible d'accéder au microphone. Veuillez vérifier vos paramètres."
            }
            Language::English => "Cannot access the microphone. Please check your settings.",
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::French
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// Kind of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    File,
    Voice,
}

/// A single immutable chat turn.
///
/// Equality is by identifier only; the remaining fields never change after
/// construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub text: String,
    pub from_user: bool,
    pub timestamp: DateTime<Utc>,
    pub kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub file_size: Option<String>,
}

impl Message {
    /// A plain text turn typed by the user.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(text, true, MessageKind::Text, Utc::now())
    }

    /// A plain text turn produced by the assistant.
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::new(text, false, MessageKind::Text, Utc::now())
    }

    /// Same as [`Message::assistant_text`] but with a caller-supplied timestamp
    /// (used when rebuilding turns from persisted history).
    pub fn assistant_text_at(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(text, false, MessageKind::Text, timestamp)
    }

    /// Same as [`Message::user_text`] but with a caller-supplied timestamp.
    pub fn user_text_at(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(text, true, MessageKind::Text, timestamp)
    }

    /// The user turn generated when a staged document is sent.
    pub fn file_turn(label: impl Into<String>, file_name: impl Into<String>, size_bytes: u64) -> Self {
        let mut msg = Self::new(label, true, MessageKind::File, Utc::now());
        msg.file_name = Some(file_name.into());
        msg.file_size = Some(format_file_size(size_bytes));
        msg
    }

    /// The user turn generated when a voice capture is sent.
    pub fn voice_turn(label: impl Into<String>) -> Self {
        Self::new(label, true, MessageKind::Voice, Utc::now())
    }

    fn new(text: impl Into<String>, from_user: bool, kind: MessageKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            from_user,
            timestamp,
            kind,
            file_name: None,
            file_size: None,
        }
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Message {}

/// Human-readable file size, matching the `12.3 KB` form shown next to
/// document turns.
pub fn format_file_size(size_bytes: u64) -> String {
    format!("{:.1} KB", size_bytes as f64 / 1024.0)
}

// ============================================================================
// Conversation Records
// ============================================================================

/// One persisted exchange: a user turn and the assistant answer it received.
///
/// Mirrors a `conversation_history` row in the external store; the session
/// never owns these, it only reads them at startup and emits new ones through
/// its persistence callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub patient_id: String,
    pub user_message: String,
    pub bot_response: String,
    pub timestamp: DateTime<Utc>,
    pub language: String,
}

// ============================================================================
// Attachments
// ============================================================================

/// MIME categories accepted for document upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MimeType {
    Pdf,
    Jpeg,
    Png,
    PlainText,
}

impl MimeType {
    /// Parse against the fixed allow-list. Returns `None` for anything the
    /// assistant does not accept.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "application/pdf" => Some(MimeType::Pdf),
            "image/jpeg" | "image/jpg" => Some(MimeType::Jpeg),
            "image/png" => Some(MimeType::Png),
            "text/plain" => Some(MimeType::PlainText),
            _ => None,
        }
    }

    /// Map a file extension to its accepted MIME category, as the upload
    /// input's `accept` list does.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(MimeType::Pdf),
            "jpg" | "jpeg" => Some(MimeType::Jpeg),
            "png" => Some(MimeType::Png),
            "txt" => Some(MimeType::PlainText),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MimeType::Pdf => "application/pdf",
            MimeType::Jpeg => "image/jpeg",
            MimeType::Png => "image/png",
            MimeType::PlainText => "text/plain",
        }
    }
}

/// A staged file or voice capture awaiting inclusion in the next send.
///
/// At most one exists per session; it is consumed by the send that follows it
/// or discarded on explicit removal.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingAttachment {
    File {
        name: String,
        size_bytes: u64,
        mime: MimeType,
    },
    Voice {
        audio: Vec<u8>,
    },
}

// ============================================================================
// Errors
// ============================================================================

/// Failures the chat subsystem can surface.
///
/// None of these are fatal: every variant degrades to a no-op plus, where
/// applicable, a user-visible notice.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The staged file's MIME type is outside the allow-list.
    #[error("unsupported attachment type: {mime}")]
    UnsupportedAttachmentType { mime: String },

    /// Microphone access was denied or the capture device is unavailable.
    #[error("audio capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// The persistence callback rejected a completed exchange. Logged only;
    /// the exchange is neither rolled back nor retried.
    #[error("failed to persist exchange: {0}")]
    PersistenceFailure(String),
}
