//! The live chat session.
//!
//! A session owns an append-only message sequence, the single
//! pending-attachment slot and the composing flag. Sending appends the user
//! turns synchronously and enqueues the exchange; a single long-lived delivery
//! worker drains the queue, produces each assistant reply after a fixed delay
//! and hands the completed exchange to the persistence callback. Queue
//! position is taken while `send` still holds the state lock, so exchanges
//! complete in exactly the order they were sent no matter how the runtime
//! schedules the worker.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use medichat_types::{ChatError, ConversationRecord, Language, Message, PendingAttachment};

use crate::attachment::AttachmentSlot;
use crate::history::expand_history;
use crate::replies::ReplyPicker;

/// Delay before the assistant reply lands, matching the reference behavior.
pub const DEFAULT_REPLY_DELAY: Duration = Duration::from_millis(2000);

/// External collaborator that persists one completed exchange.
///
/// The session calls it exactly once per exchange and never retries: a failure
/// is surfaced as an event and otherwise ignored, the visible messages stay.
#[async_trait]
pub trait ExchangeStore: Send + Sync {
    async fn save_exchange(&self, record: &ConversationRecord) -> Result<()>;
}

/// Session construction parameters. Language is threaded through explicitly,
/// never read from ambient state.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub patient_id: String,
    pub language: Language,
    pub reply_delay: Duration,
    /// Seed for the reply picker; `None` draws from entropy.
    pub reply_seed: Option<u64>,
}

impl SessionConfig {
    pub fn new(patient_id: impl Into<String>, language: Language) -> Self {
        Self {
            patient_id: patient_id.into(),
            language,
            reply_delay: DEFAULT_REPLY_DELAY,
            reply_seed: None,
        }
    }
}

/// Notifications a front end renders from.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    MessageAppended(Message),
    Composing(bool),
    PersistenceFailed(String),
}

struct SessionState {
    messages: Vec<Message>,
    slot: AttachmentSlot,
    composing: bool,
}

/// One queued user exchange awaiting its assistant reply.
struct Exchange {
    user_message: String,
    /// Dropped without sending when the delivery is cancelled.
    done: oneshot::Sender<()>,
}

/// A live chat session for one patient.
pub struct ChatSession {
    patient_id: String,
    language: Language,
    state: Arc<Mutex<SessionState>>,
    queue: mpsc::UnboundedSender<Exchange>,
    pending: Arc<Mutex<Vec<oneshot::Receiver<()>>>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
}

impl ChatSession {
    /// Create a session seeded from persisted history.
    ///
    /// An empty history seeds a single greeting in the configured language.
    /// The returned receiver carries every append and composing change made
    /// after construction. Spawns the delivery worker, so this must run
    /// inside a Tokio runtime.
    pub fn new(
        config: SessionConfig,
        store: Arc<dyn ExchangeStore>,
        history: &[ConversationRecord],
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let (queue, exchanges) = mpsc::unbounded_channel();

        let picker = match config.reply_seed {
            Some(seed) => ReplyPicker::with_seed(seed),
            None => ReplyPicker::new(),
        };

        let state = Arc::new(Mutex::new(SessionState {
            messages: expand_history(history, config.language),
            slot: AttachmentSlot::new(),
            composing: false,
        }));
        let cancel = CancellationToken::new();

        let worker = DeliveryWorker {
            state: Arc::clone(&state),
            picker,
            store,
            events: events.clone(),
            cancel: cancel.clone(),
            delay: config.reply_delay,
            language: config.language,
            patient_id: config.patient_id.clone(),
        };
        tokio::spawn(worker.run(exchanges));

        let session = Self {
            patient_id: config.patient_id,
            language: config.language,
            state,
            queue,
            pending: Arc::new(Mutex::new(Vec::new())),
            events,
            cancel,
        };

        (session, receiver)
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Snapshot of the visible message sequence.
    pub async fn messages(&self) -> Vec<Message> {
        self.state.lock().await.messages.clone()
    }

    pub async fn is_composing(&self) -> bool {
        self.state.lock().await.composing
    }

    /// Stage a document for the next send. Rejection leaves the slot as it was.
    pub async fn stage_file(
        &self,
        name: impl Into<String>,
        size_bytes: u64,
        mime: &str,
    ) -> Result<(), ChatError> {
        self.state.lock().await.slot.stage_file(name, size_bytes, mime)
    }

    /// Stage a finished voice capture for the next send.
    pub async fn stage_voice(&self, audio: Vec<u8>) {
        self.state.lock().await.slot.stage_voice(audio);
    }

    /// Discard the pending attachment.
    pub async fn clear_attachment(&self) {
        self.state.lock().await.slot.clear();
    }

    pub async fn pending_attachment(&self) -> Option<PendingAttachment> {
        self.state.lock().await.slot.pending().cloned()
    }

    /// Send the current input.
    ///
    /// An exchange needs at least one of a non-empty trimmed text or a pending
    /// attachment; a both-empty send returns `Ok(false)` with no state change.
    /// Otherwise the user turns are appended synchronously, the slot is
    /// cleared, and the exchange takes its queue position before the state
    /// lock is released. Returns `Ok(true)` once the exchange is underway.
    pub async fn send(&self, text: &str) -> Result<bool> {
        let trimmed = text.trim();

        let done = {
            let mut state = self.state.lock().await;

            if trimmed.is_empty() && state.slot.is_empty() {
                return Ok(false);
            }
            let pending = state.slot.take();

            let mut persisted = String::new();
            if !trimmed.is_empty() {
                persisted.push_str(trimmed);
                Self::append(&mut state, &self.events, Message::user_text(trimmed));
            }

            if let Some(attachment) = pending {
                let turn = match attachment {
                    PendingAttachment::File {
                        name, size_bytes, ..
                    } => Message::file_turn(self.language.file_turn_label(), name, size_bytes),
                    PendingAttachment::Voice { .. } => {
                        Message::voice_turn(self.language.voice_turn_label())
                    }
                };
                if !persisted.is_empty() {
                    persisted.push('\n');
                }
                persisted.push_str(&turn.text);
                Self::append(&mut state, &self.events, turn);
            }

            let (done, done_rx) = oneshot::channel();
            // Errors mean the worker is gone; the dropped sender lets
            // `wait_idle` move on.
            let _ = self.queue.send(Exchange {
                user_message: persisted,
                done,
            });
            done_rx
        };

        self.pending.lock().await.push(done);
        Ok(true)
    }

    fn append(
        state: &mut SessionState,
        events: &mpsc::UnboundedSender<SessionEvent>,
        message: Message,
    ) {
        state.messages.push(message.clone());
        let _ = events.send(SessionEvent::MessageAppended(message));
    }

    /// Wait for every queued exchange to finish or be cancelled.
    pub async fn wait_idle(&self) {
        loop {
            let waiting: Vec<oneshot::Receiver<()>> = {
                let mut pending = self.pending.lock().await;
                pending.drain(..).collect()
            };
            if waiting.is_empty() {
                return;
            }
            for done in waiting {
                let _ = done.await;
            }
        }
    }

    /// Tear the session down: pending deliveries are cancelled and will not
    /// append to the message sequence.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Drains the exchange queue one entry at a time, so replies land in exactly
/// the order `send` appended the user turns.
struct DeliveryWorker {
    state: Arc<Mutex<SessionState>>,
    picker: ReplyPicker,
    store: Arc<dyn ExchangeStore>,
    events: mpsc::UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
    delay: Duration,
    language: Language,
    patient_id: String,
}

impl DeliveryWorker {
    /// Runs until the session is dropped or cancelled. Exchanges still queued
    /// at that point are dropped, which resolves their completion handles.
    async fn run(mut self, mut queue: mpsc::UnboundedReceiver<Exchange>) {
        loop {
            let exchange = tokio::select! {
                next = queue.recv() => match next {
                    Some(exchange) => exchange,
                    None => return,
                },
                _ = self.cancel.cancelled() => return,
            };

            {
                let mut state = self.state.lock().await;
                state.composing = true;
            }
            let _ = self.events.send(SessionEvent::Composing(true));

            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = self.cancel.cancelled() => {
                    self.state.lock().await.composing = false;
                    let _ = self.events.send(SessionEvent::Composing(false));
                    return;
                }
            }

            let reply = self.picker.pick(self.language);
            let assistant = Message::assistant_text(reply);

            {
                let mut state = self.state.lock().await;
                state.composing = false;
                state.messages.push(assistant.clone());
            }
            let _ = self.events.send(SessionEvent::Composing(false));
            let _ = self.events.send(SessionEvent::MessageAppended(assistant.clone()));

            let record = ConversationRecord {
                patient_id: self.patient_id.clone(),
                user_message: exchange.user_message,
                bot_response: assistant.text,
                timestamp: Utc::now(),
                language: self.language.code().to_string(),
            };

            // No retry and no rollback: the appended reply stays visible even
            // when the store rejects the exchange.
            if let Err(err) = self.store.save_exchange(&record).await {
                let failure = ChatError::PersistenceFailure(err.to_string());
                let _ = self
                    .events
                    .send(SessionEvent::PersistenceFailed(failure.to_string()));
            }

            let _ = exchange.done.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medichat_types::MessageKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MemoryStore {
        records: Mutex<Vec<ConversationRecord>>,
    }

    impl MemoryStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                records: Mutex::new(Vec::new()),
            })
        }

        async fn records(&self) -> Vec<ConversationRecord> {
            self.records.lock().await.clone()
        }
    }

    #[async_trait]
    impl ExchangeStore for MemoryStore {
        async fn save_exchange(&self, record: &ConversationRecord) -> Result<()> {
            self.records.lock().await.push(record.clone());
            Ok(())
        }
    }

    struct FailingStore {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl ExchangeStore for FailingStore {
        async fn save_exchange(&self, _record: &ConversationRecord) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("disk full")
        }
    }

    fn test_config() -> SessionConfig {
        SessionConfig {
            patient_id: "p-42".to_string(),
            language: Language::French,
            reply_delay: Duration::from_millis(2000),
            reply_seed: Some(1),
        }
    }

    fn test_session(
        store: Arc<dyn ExchangeStore>,
    ) -> (ChatSession, mpsc::UnboundedReceiver<SessionEvent>) {
        ChatSession::new(test_config(), store, &[])
    }

    fn drain(receiver: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn empty_send_changes_nothing() {
        let store = MemoryStore::new();
        let (session, mut events) = test_session(store.clone());

        assert!(!session.send("   ").await.unwrap());
        session.wait_idle().await;

        // Only the greeting is present and nothing was persisted or emitted.
        assert_eq!(session.messages().await.len(), 1);
        assert!(store.records().await.is_empty());
        assert!(drain(&mut events).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn text_send_appends_user_then_assistant() {
        let store = MemoryStore::new();
        let (session, _events) = test_session(store.clone());

        assert!(session.send("J'ai mal à la tête").await.unwrap());
        session.wait_idle().await;

        let messages = session.messages().await;
        assert_eq!(messages.len(), 3); // greeting + user + assistant
        assert!(messages[1].from_user);
        assert_eq!(messages[1].text, "J'ai mal à la tête");
        assert!(!messages[2].from_user);
        assert!(Language::French.reply_pool().contains(&messages[2].text.as_str()));
        assert!(!session.is_composing().await);
    }

    #[tokio::test(start_paused = true)]
    async fn exchange_persists_exactly_once_with_matching_payload() {
        let store = MemoryStore::new();
        let (session, _events) = test_session(store.clone());

        session.send("Bonjour docteur").await.unwrap();
        session.wait_idle().await;

        let records = store.records().await;
        assert_eq!(records.len(), 1);
        let messages = session.messages().await;
        assert_eq!(records[0].patient_id, "p-42");
        assert_eq!(records[0].language, "fr");
        assert_eq!(records[0].user_message, "Bonjour docteur");
        assert_eq!(records[0].bot_response, messages.last().unwrap().text);
    }

    #[tokio::test(start_paused = true)]
    async fn attachment_send_clears_slot_and_synthesizes_description() {
        let store = MemoryStore::new();
        let (session, _events) = test_session(store.clone());

        session.stage_file("analyse.pdf", 4096, "application/pdf").await.unwrap();
        session.send("").await.unwrap();
        session.wait_idle().await;

        assert!(session.pending_attachment().await.is_none());
        let messages = session.messages().await;
        let file_turn = &messages[1];
        assert_eq!(file_turn.kind, MessageKind::File);
        assert_eq!(file_turn.text, Language::French.file_turn_label());
        assert_eq!(file_turn.file_name.as_deref(), Some("analyse.pdf"));

        let records = store.records().await;
        assert_eq!(records[0].user_message, Language::French.file_turn_label());
    }

    #[tokio::test(start_paused = true)]
    async fn text_and_attachment_send_appends_two_user_turns() {
        let store = MemoryStore::new();
        let (session, _events) = test_session(store.clone());

        session.stage_voice(vec![0; 16]).await;
        session.send("Voici mon enregistrement").await.unwrap();
        session.wait_idle().await;

        let messages = session.messages().await;
        assert_eq!(messages.len(), 4); // greeting + text + voice + assistant
        assert_eq!(messages[1].text, "Voici mon enregistrement");
        assert_eq!(messages[2].kind, MessageKind::Voice);

        let records = store.records().await;
        assert_eq!(
            records[0].user_message,
            format!("Voici mon enregistrement\n{}", Language::French.voice_turn_label())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn send_after_rejected_staging_keeps_slot_state() {
        let store = MemoryStore::new();
        let (session, _events) = test_session(store);

        let err = session.stage_file("data.json", 64, "application/json").await;
        assert!(matches!(
            err,
            Err(ChatError::UnsupportedAttachmentType { .. })
        ));
        assert!(session.pending_attachment().await.is_none());
        assert!(!session.send("").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn persistence_failure_keeps_assistant_message() {
        let store = Arc::new(FailingStore {
            attempts: AtomicUsize::new(0),
        });
        let (session, mut events) = test_session(store.clone());

        session.send("test").await.unwrap();
        session.wait_idle().await;

        let messages = session.messages().await;
        assert_eq!(messages.len(), 3);
        assert!(!messages[2].from_user);
        assert_eq!(store.attempts.load(Ordering::SeqCst), 1);

        let emitted = drain(&mut events);
        assert!(emitted
            .iter()
            .any(|e| matches!(e, SessionEvent::PersistenceFailed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn queued_sends_complete_in_order() {
        let store = MemoryStore::new();
        let (session, _events) = test_session(store.clone());

        session.send("première question").await.unwrap();
        session.send("deuxième question").await.unwrap();
        session.wait_idle().await;

        let records = store.records().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].user_message, "première question");
        assert_eq!(records[1].user_message, "deuxième question");

        // Both user turns land before their own replies; four live appends.
        let messages = session.messages().await;
        assert_eq!(messages.len(), 5);
    }

    // Runs on the real multi-thread scheduler so delivery order cannot lean
    // on single-threaded polling.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn back_to_back_sends_persist_in_send_order() {
        let store = MemoryStore::new();
        let mut config = test_config();
        config.reply_delay = Duration::from_millis(1);
        let (session, _events) = ChatSession::new(config, store.clone(), &[]);

        let sent: Vec<String> = (0..60).map(|i| format!("question {i}")).collect();
        for text in &sent {
            session.send(text).await.unwrap();
        }
        session.wait_idle().await;

        let persisted: Vec<String> = store
            .records()
            .await
            .into_iter()
            .map(|record| record.user_message)
            .collect();
        assert_eq!(persisted, sent);
    }

    #[tokio::test(start_paused = true)]
    async fn close_cancels_pending_delivery() {
        let store = MemoryStore::new();
        let (session, _events) = test_session(store.clone());

        session.send("question sans réponse").await.unwrap();
        session.close();
        session.wait_idle().await;

        let messages = session.messages().await;
        // Greeting and user turn only; the cancelled delivery never appended.
        assert_eq!(messages.len(), 2);
        assert!(messages[1].from_user);
        assert!(store.records().await.is_empty());
        assert!(!session.is_composing().await);
    }

    #[tokio::test(start_paused = true)]
    async fn composing_flag_toggles_around_delivery() {
        let store = MemoryStore::new();
        let (session, mut events) = test_session(store);

        session.send("allo").await.unwrap();
        session.wait_idle().await;

        let emitted = drain(&mut events);
        let flags: Vec<bool> = emitted
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Composing(flag) => Some(*flag),
                _ => None,
            })
            .collect();
        assert_eq!(flags, vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn live_appends_have_unique_ids_and_ordered_timestamps() {
        let store = MemoryStore::new();
        let (session, _events) = test_session(store);

        session.send("un").await.unwrap();
        session.send("deux").await.unwrap();
        session.wait_idle().await;

        let messages = session.messages().await;
        let mut ids: Vec<_> = messages.iter().map(|m| m.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), messages.len());

        for pair in messages[1..].windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn seeded_sessions_replay_the_same_replies() {
        let store_a = MemoryStore::new();
        let store_b = MemoryStore::new();
        let (a, _ea) = ChatSession::new(test_config(), store_a.clone(), &[]);
        let (b, _eb) = ChatSession::new(test_config(), store_b.clone(), &[]);

        for text in ["un", "deux", "trois"] {
            a.send(text).await.unwrap();
            b.send(text).await.unwrap();
        }
        a.wait_idle().await;
        b.wait_idle().await;

        let responses = |records: Vec<ConversationRecord>| {
            records.into_iter().map(|r| r.bot_response).collect::<Vec<_>>()
        };
        assert_eq!(
            responses(store_a.records().await),
            responses(store_b.records().await)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn session_seeded_from_history_skips_greeting() {
        let store = MemoryStore::new();
        let history = vec![ConversationRecord {
            patient_id: "p-42".to_string(),
            user_message: "J'ai des symptômes de grippe".to_string(),
            bot_response: "Pouvez-vous me décrire vos symptômes en détail ?".to_string(),
            timestamp: Utc::now(),
            language: "fr".to_string(),
        }];
        let (session, _events) = ChatSession::new(test_config(), store, &history);

        let messages = session.messages().await;
        assert_eq!(messages.len(), 2);
        assert!(messages[0].from_user);
        assert!(!messages[1].from_user);
    }
}
