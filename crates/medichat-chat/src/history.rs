//! Expansion of persisted conversation records into displayable turns.

use medichat_types::{ConversationRecord, Language, Message};

/// Expand persisted records into a flat, ordered message sequence.
///
/// Each record becomes a user turn immediately followed by the assistant turn,
/// in record order, keeping the record's own timestamp on both. No filtering,
/// no dedup, no re-sorting.
///
/// An empty history seeds the session with a single greeting instead; its text
/// depends only on the active language.
pub fn expand_history(records: &[ConversationRecord], language: Language) -> Vec<Message> {
    if records.is_empty() {
        return vec![Message::assistant_text(language.greeting())];
    }

    let mut messages = Vec::with_capacity(records.len() * 2);
    for record in records {
        messages.push(Message::user_text_at(&record.user_message, record.timestamp));
        messages.push(Message::assistant_text_at(&record.bot_response, record.timestamp));
    }
    messages
}
