use anyhow::Result;
use chrono::{Local, Utc};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use medichat_chat::{ChatSession, Recorder, SessionConfig, SessionEvent};
use medichat_types::{format_file_size, ChatError, Language, Message, MessageKind, MimeType};

use crate::capture::FileAudioCapture;
use crate::cli::Cli;
use crate::conversation_logger::ConversationLogger;
use crate::history_view::group_by_day;
use crate::store::ConversationStore;

/// Run interactive REPL mode
pub async fn run_repl_mode(cli: &Cli) -> Result<()> {
    let language = Language::from_code(&cli.language);
    let store = Arc::new(ConversationStore::new(&cli.data_dir)?);
    let history = store.load_history(&cli.patient_id).await?;

    println!("{}", "🩺 Medichat - Assistant Médical IA".bright_cyan().bold());
    println!(
        "{}",
        format!(
            "Patient: {} • Language: {} • Data: {}",
            cli.patient_id,
            language.code(),
            cli.data_dir.display()
        )
        .bright_black()
    );
    println!(
        "{}",
        "Type 'exit' or 'quit' to leave, '/help' for commands\n".bright_black()
    );

    let mut config = SessionConfig::new(&cli.patient_id, language);
    config.reply_delay = Duration::from_millis(cli.reply_delay_ms);
    config.reply_seed = cli.seed;
    let (session, mut events) = ChatSession::new(config, store.clone(), &history);

    // Logs go into the data directory; chat keeps working without them.
    let mut logger = match ConversationLogger::new(&cli.data_dir).await {
        Ok(logger) => Some(logger),
        Err(err) => {
            eprintln!("Logging disabled: {}", err);
            None
        }
    };

    // Replay the seeded history (or the greeting) before the first prompt.
    for message in session.messages().await {
        print_message(&message);
    }
    println!("{}", language.placeholder().bright_black());

    let mut recorder = cli
        .audio_source
        .clone()
        .map(|source| Recorder::new(Arc::new(FileAudioCapture::new(source))));

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline(&format!("{} ", "You:".bright_green().bold()));

        match readline {
            Ok(line) => {
                let line = line.trim().to_string();

                if should_skip_blank(&session, &line).await {
                    continue;
                }

                if line == "exit" || line == "quit" {
                    break;
                }

                if line == "/help" {
                    print_help();
                    continue;
                }

                if let Some(path) = line.strip_prefix("/attach ") {
                    attach_file(&session, Path::new(path.trim()), language).await;
                    continue;
                }

                if line == "/detach" {
                    session.clear_attachment().await;
                    let notice = match language {
                        Language::French => "📎 Pièce jointe retirée",
                        Language::English => "📎 Attachment removed",
                    };
                    println!("{}", notice.bright_black());
                    continue;
                }

                if line == "/record" {
                    if toggle_recording(&session, &mut recorder, language).await {
                        render_exchange(&session, &mut events, &mut logger, language).await;
                    }
                    continue;
                }

                if line == "/history" {
                    show_history(&store, &cli.patient_id, language).await;
                    continue;
                }

                match session.send(&line).await {
                    Ok(true) => {
                        render_exchange(&session, &mut events, &mut logger, language).await;
                    }
                    Ok(false) => {}
                    Err(err) => {
                        eprintln!("{} {}\n", "Error:".bright_red().bold(), err);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "^C".bright_black());
                continue;
            }
            Err(ReadlineError::Eof) => {
                break;
            }
            Err(err) => {
                eprintln!("{} {}", "Error:".bright_red().bold(), err);
                break;
            }
        }
    }

    // Stop any live recording so the microphone is released before teardown.
    if let Some(recorder) = recorder.as_mut() {
        if recorder.is_recording() {
            let _ = recorder.stop().await;
        }
    }

    session.close();
    session.wait_idle().await;

    if let Some(logger) = &mut logger {
        logger.shutdown().await;
    }

    match language {
        Language::French => println!("{}", "Au revoir !".bright_cyan()),
        Language::English => println!("{}", "Goodbye!".bright_cyan()),
    }
    Ok(())
}

/// A blank input line is skipped unless a document is staged: pressing enter
/// with a pending attachment submits a file-only exchange, matching the send
/// button's enablement.
async fn should_skip_blank(session: &ChatSession, line: &str) -> bool {
    line.is_empty() && session.pending_attachment().await.is_none()
}

fn print_help() {
    println!("{} Commands:", "💬".bright_cyan());
    println!("  /attach <file>  - Stage a document (pdf, jpg, png, txt) for the next send");
    println!("  /detach         - Remove the staged attachment");
    println!("  /record         - Start/stop a voice message");
    println!("  /history        - Show past conversations grouped by day");
    println!("  exit, quit      - Leave the chat");
}

fn print_message(message: &Message) {
    let time = message
        .timestamp
        .with_timezone(&Local)
        .format("%H:%M")
        .to_string();
    let stamp = format!("[{}]", time).bright_black();

    if message.from_user {
        match message.kind {
            MessageKind::File => {
                let detail = format!(
                    "{} ({})",
                    message.file_name.as_deref().unwrap_or("document"),
                    message.file_size.as_deref().unwrap_or("?")
                );
                println!("{} {} {} {}", stamp, "You:".bright_green().bold(), message.text, format!("📎 {}", detail).bright_black());
            }
            _ => println!("{} {} {}", stamp, "You:".bright_green().bold(), message.text),
        }
    } else {
        println!("{} {} {}", stamp, "Assistant:".bright_blue().bold(), message.text);
    }
}

/// Stage a document from disk, mapping its extension to a MIME type the way
/// the upload input's accept list does.
async fn attach_file(session: &ChatSession, path: &Path, language: Language) {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) => {
            eprintln!("{} {}: {}", "❌".bright_red(), path.display(), err);
            return;
        }
    };

    let mime = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(MimeType::from_extension);

    let Some(mime) = mime else {
        println!("{} {}", "⚠️".yellow(), language.unsupported_file_alert());
        return;
    };

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    match session.stage_file(&name, metadata.len(), mime.as_str()).await {
        Ok(()) => {
            println!(
                "{} {} ({})",
                "📎".bright_cyan(),
                name,
                format_file_size(metadata.len()).bright_black()
            );
        }
        Err(ChatError::UnsupportedAttachmentType { .. }) => {
            println!("{} {}", "⚠️".yellow(), language.unsupported_file_alert());
        }
        Err(err) => {
            eprintln!("{} {}", "❌".bright_red(), err);
        }
    }
}

/// Toggle voice recording; returns true when a stop produced an exchange.
async fn toggle_recording(
    session: &ChatSession,
    recorder: &mut Option<Recorder>,
    language: Language,
) -> bool {
    let Some(recorder) = recorder.as_mut() else {
        println!(
            "{} {}",
            "⚠️".yellow(),
            "No audio source configured; pass --audio-source <file>".bright_black()
        );
        return false;
    };

    if !recorder.is_recording() {
        match recorder.start().await {
            Ok(()) => {
                let notice = match language {
                    Language::French => "🎙️  Enregistrement en cours... (/record pour arrêter)",
                    Language::English => "🎙️  Recording... (/record to stop)",
                };
                println!("{}", notice.bright_red());
            }
            Err(ChatError::CaptureUnavailable(_)) => {
                println!("{} {}", "⚠️".yellow(), language.capture_unavailable_alert());
            }
            Err(err) => {
                eprintln!("{} {}", "❌".bright_red(), err);
            }
        }
        return false;
    }

    match recorder.stop().await {
        Ok(audio) => {
            session.stage_voice(audio).await;
            match session.send("").await {
                Ok(sent) => sent,
                Err(err) => {
                    eprintln!("{} {}", "❌".bright_red(), err);
                    false
                }
            }
        }
        Err(err) => {
            eprintln!("{} Recording failed: {}", "⚠️".yellow(), err);
            false
        }
    }
}

/// Wait out the composing delay and render everything the session appended.
async fn render_exchange(
    session: &ChatSession,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    logger: &mut Option<ConversationLogger>,
    language: Language,
) {
    let composing_notice = match language {
        Language::French => "L'assistant écrit...",
        Language::English => "Assistant is typing...",
    };
    println!("{}", composing_notice.bright_black());

    session.wait_idle().await;

    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::MessageAppended(message) => {
                if let Some(logger) = logger.as_mut() {
                    logger.log_message(&message).await;
                }
                // The typed text is already on screen; attachments and
                // assistant turns are not.
                if !message.from_user || message.kind != MessageKind::Text {
                    print_message(&message);
                }
            }
            SessionEvent::Composing(_) => {}
            SessionEvent::PersistenceFailed(err) => {
                eprintln!("{} {}", "⚠️".yellow(), err);
            }
        }
    }
    println!();
}

/// Show past conversations grouped by day, most recent bucket first.
async fn show_history(store: &ConversationStore, patient_id: &str, language: Language) {
    let records = match store.load_history(patient_id).await {
        Ok(records) => records,
        Err(err) => {
            eprintln!("{} Failed to load history: {}", "❌".bright_red(), err);
            return;
        }
    };

    if records.is_empty() {
        let notice = match language {
            Language::French => "Aucune conversation enregistrée",
            Language::English => "No recorded conversations",
        };
        println!("{}", notice.bright_black());
        return;
    }

    let grouped = group_by_day(&records, Utc::now().date_naive());
    let labels = match language {
        Language::French => ["Aujourd'hui", "Hier", "Plus ancien"],
        Language::English => ["Today", "Yesterday", "Older"],
    };

    for (label, bucket) in labels
        .iter()
        .zip([&grouped.today, &grouped.yesterday, &grouped.older])
    {
        if bucket.is_empty() {
            continue;
        }
        println!("{}", label.bright_cyan().bold());
        for record in bucket {
            let time = record
                .timestamp
                .with_timezone(&Local)
                .format("%d/%m %H:%M")
                .to_string();
            println!(
                "  {} {}",
                format!("[{}]", time).bright_black(),
                truncate(&record.user_message, 60)
            );
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn blank_line_submits_only_with_staged_document() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ConversationStore::new(dir.path()).unwrap());
        let (session, _events) =
            ChatSession::new(SessionConfig::new("p-1", Language::French), store, &[]);

        assert!(should_skip_blank(&session, "").await);
        assert!(!should_skip_blank(&session, "bonjour").await);

        session
            .stage_file("analyse.pdf", 2048, "application/pdf")
            .await
            .unwrap();
        assert!(!should_skip_blank(&session, "").await);
        assert!(session.send("").await.unwrap());
    }
}
