//! Interactive terminal client for a streaming chat server.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a local server
//! streamchat
//!
//! # Talk to another server and keep the session id across runs
//! streamchat --base-url https://chat.example.com/ --session-file ~/.streamchat.json
//!
//! # Disable colors and pacing (useful for piping output)
//! streamchat --no-color --pacing-ms 0
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/<n>` or `/followup <n>` - Send a suggested follow-up
//! - `/followups` - List the follow-ups offered so far
//! - `/session` - Show the session id
//! - `/help` - Show available commands
//! - `/quit` - Exit the application
//!
//! Set `RUST_LOG` (for example `RUST_LOG=streamchat=debug`) to log to stderr.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use streamchat::{
    ChatArgs, ChatClient, ChatCommand, ChatConfig, ChatSessionController, FileStorage,
    IgnoreReason, MemoryStorage, PlainTextRenderer, SendOutcome, Storage, TokioPacer, help_text,
    parse_command,
};

/// Main entry point for the streamchat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("streamchat [OPTIONS]");
    let config = ChatConfig::from(args);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let storage: Box<dyn Storage> = match &config.session_file {
        Some(path) => Box::new(FileStorage::open(path)?),
        None => Box::new(MemoryStorage::new()),
    };
    let client = ChatClient::new(&config)?;
    let renderer = PlainTextRenderer::with_color(config.use_color);
    let mut rl = DefaultEditor::new()?;

    // Replies cannot be cancelled part way, so Ctrl+C while one streams exits.
    let streaming = Arc::new(AtomicBool::new(false));
    let streaming_clone = streaming.clone();
    ctrlc::set_handler(move || {
        if streaming_clone.load(Ordering::Relaxed) {
            println!();
            std::process::exit(130);
        }
    })?;

    println!("Chat ({})", client.chat_url());
    println!("Type /help for commands, /quit to exit\n");

    let controller =
        ChatSessionController::start(client, renderer, storage, TokioPacer, config).await;

    loop {
        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                let outcome = match parse_command(line) {
                    Some(ChatCommand::Quit) => {
                        println!("Goodbye!");
                        break;
                    }
                    Some(ChatCommand::Help) => {
                        for line in help_text().lines() {
                            println!("    {}", line);
                        }
                        continue;
                    }
                    Some(ChatCommand::Session) => {
                        let session_id = controller
                            .session_id()
                            .map(|id| id.to_string())
                            .unwrap_or_else(|| "(none)".to_string());
                        controller
                            .with_renderer(|r| r.print_info(&format!("Session: {session_id}")));
                        continue;
                    }
                    Some(ChatCommand::ListFollowUps) => {
                        print_follow_ups(&controller.follow_ups());
                        continue;
                    }
                    Some(ChatCommand::Invalid(message)) => {
                        controller.with_renderer(|r| r.print_error(&message));
                        continue;
                    }
                    Some(ChatCommand::FollowUp(id)) => {
                        streaming.store(true, Ordering::Relaxed);
                        let outcome = controller.click_follow_up(id).await;
                        streaming.store(false, Ordering::Relaxed);
                        outcome
                    }
                    None => {
                        streaming.store(true, Ordering::Relaxed);
                        let outcome = controller.send_message(line).await;
                        streaming.store(false, Ordering::Relaxed);
                        outcome
                    }
                };

                match outcome {
                    SendOutcome::Ignored(IgnoreReason::TooLong { chars, max }) => {
                        controller.with_renderer(|r| {
                            r.print_error(&format!(
                                "Message is {chars} characters; the limit is {max}."
                            ))
                        });
                    }
                    SendOutcome::Ignored(IgnoreReason::UnknownFollowUp(id)) => {
                        controller.with_renderer(|r| {
                            r.print_error(&format!("No follow-up number {}", id.index() + 1))
                        });
                    }
                    _ => {}
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                controller.with_renderer(|r| r.print_error(&format!("Input error: {}", err)));
                break;
            }
        }
    }

    Ok(())
}

fn print_follow_ups(follow_ups: &[String]) {
    if follow_ups.is_empty() {
        println!("    Follow-ups: (none)");
    } else {
        println!("    Follow-ups:");
        for (index, text) in follow_ups.iter().enumerate() {
            println!("      [{}] {}", index + 1, text);
        }
    }
}
