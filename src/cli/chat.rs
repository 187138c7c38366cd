//! Line-oriented chat loop.

use std::error::Error;
use std::io::{self, Write};

use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::auth::KeyringCredentials;
use crate::cli::build_orchestrator;
use crate::commands::{all_commands, process_input, CommandResult};
use crate::core::app::{
    apply_action, App, AppAction, AppCommand, ExchangeParams, ExchangeReceiver, ExchangeService,
    ExchangeUpdate,
};
use crate::core::config::data::Config;
use crate::core::credentials::{CredentialProvider, CredentialStatus};
use crate::core::message::{CitationChunk, Message};
use crate::core::orchestrator::{ExchangeEvent, TurnOrchestrator};
use crate::core::tools::Mood;

pub async fn run_chat(model: Option<String>) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let model = config.effective_model(model.as_deref());
    let mut credentials = KeyringCredentials::load();
    let mut app = App::new(&config);

    if credentials.has_credential() {
        app.set_credential_status(CredentialStatus::Present);
    } else {
        println!("No Gemini API key found in the keyring, GEMINI_API_KEY, or API_KEY.");
        if let Err(err) = app.reselect_credential(&mut credentials) {
            eprintln!("❌ {err}");
            std::process::exit(1);
        }
    }

    let client = reqwest::Client::new();
    let mut active_key = credentials.api_key().map(str::to_string);
    let mut orchestrator = match active_key.as_deref() {
        Some(key) => build_orchestrator(&client, &config, &model, key),
        None => {
            eprintln!("❌ An API key is required. Run 'moodchat auth' to store one.");
            std::process::exit(1);
        }
    };
    info!(model = %model, "Chat started");

    let (service, mut rx) = ExchangeService::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("moodchat · {model}");
    println!("Type /help for commands. Ctrl+C stops a reply in progress.");
    print_transcript(app.active_session().messages());

    loop {
        print!("{} you> ", mood_glyph(app.mood()));
        io::stdout().flush()?;

        let next = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = next else {
            println!();
            break;
        };

        match process_input(&line) {
            CommandResult::ProcessAsMessage(content) => {
                let action = AppAction::SubmitMessage { content };
                if let Some(AppCommand::SpawnExchange(params)) =
                    apply_action(&mut app, action, &mut credentials)
                {
                    stream_reply(
                        &mut app,
                        &service,
                        &orchestrator,
                        &mut rx,
                        &mut credentials,
                        params,
                    )
                    .await?;
                }
            }
            CommandResult::Action(action) => {
                let switching = matches!(
                    action,
                    AppAction::NewSession
                        | AppAction::SwitchSession { .. }
                        | AppAction::DeleteSession { .. }
                );
                apply_action(&mut app, action, &mut credentials);
                print_notices(&mut app);
                if switching {
                    print_transcript(app.active_session().messages());
                }
            }
            CommandResult::ListSessions => print_sessions(&app),
            CommandResult::Help => print_help(),
            CommandResult::Quit => break,
            CommandResult::Invalid(message) => eprintln!("⚠️  {message}"),
        }

        print_notices(&mut app);

        let current_key = credentials.api_key().map(str::to_string);
        if current_key != active_key {
            if let Some(key) = current_key.as_deref() {
                debug!("API key changed; rebuilding transport");
                orchestrator = build_orchestrator(&client, &config, &model, key);
            }
            active_key = current_key;
        }
    }

    Ok(())
}

/// Spawns the exchange and applies its updates until it finishes or the
/// user interrupts it.
async fn stream_reply(
    app: &mut App,
    service: &ExchangeService,
    orchestrator: &TurnOrchestrator,
    rx: &mut ExchangeReceiver,
    credentials: &mut dyn CredentialProvider,
    params: ExchangeParams,
) -> Result<(), Box<dyn Error>> {
    let expected = params.target.clone();
    service.spawn_exchange(orchestrator, params);

    print!("gemini> ");
    io::stdout().flush()?;

    loop {
        let next = tokio::select! {
            next = rx.recv() => next,
            _ = tokio::signal::ctrl_c() => {
                apply_action(app, AppAction::CancelStreaming, credentials);
                println!();
                print_notices(app);
                return Ok(());
            }
        };
        let Some((update, target)) = next else {
            println!();
            return Ok(());
        };

        let current = target == expected;
        let failed = matches!(update, ExchangeUpdate::Failed(_));
        let terminal = update.is_terminal();
        if current {
            if let ExchangeUpdate::Event {
                event: ExchangeEvent::TextDelta(text),
                ..
            } = &update
            {
                print!("{text}");
                io::stdout().flush()?;
            }
        }

        apply_action(
            app,
            AppAction::Exchange {
                update,
                target: target.clone(),
            },
            credentials,
        );

        if current && terminal {
            let message = app
                .sessions()
                .get(&target.session_id)
                .and_then(|session| session.message(&target.message_id));
            if let Some(message) = message {
                if failed {
                    print!("\n{}", message.content());
                }
                println!();
                print_sources(message.citations());
            } else {
                println!();
            }
            return Ok(());
        }

        // Mood changes arrive mid-reply; show them on their own line.
        let notices = app.take_notices();
        if !notices.is_empty() {
            println!();
            for notice in notices {
                println!("ℹ️  {notice}");
            }
            print!("gemini> ");
            io::stdout().flush()?;
        }
    }
}

fn print_notices(app: &mut App) {
    for notice in app.take_notices() {
        println!("ℹ️  {notice}");
    }
}

fn print_transcript(messages: &[Message]) {
    for message in messages {
        let speaker = if message.is_user() { "you" } else { "gemini" };
        println!("{speaker}> {}", message.content());
        print_sources(message.citations());
    }
}

fn print_sources(citations: &[CitationChunk]) {
    let links = source_lines(citations);
    if links.is_empty() {
        return;
    }
    println!("Sources:");
    for line in links {
        println!("  {line}");
    }
}

/// Numbered source lines for chunks that carry a web reference.
fn source_lines(citations: &[CitationChunk]) -> Vec<String> {
    citations
        .iter()
        .filter_map(|chunk| chunk.web.as_ref())
        .enumerate()
        .map(|(i, web)| {
            let title = if web.title.is_empty() {
                web.uri.as_str()
            } else {
                web.title.as_str()
            };
            format!("[{}] {title} <{}>", i + 1, web.uri)
        })
        .collect()
}

fn print_sessions(app: &App) {
    let active = app.sessions().active_id();
    for (i, session) in app.sessions().sessions().iter().enumerate() {
        let marker = if session.id() == active { '*' } else { ' ' };
        let streaming = if session.is_streaming() {
            " (replying)"
        } else {
            ""
        };
        println!(
            "{marker} {}. {} · {}{streaming}",
            i + 1,
            session.title(),
            session.created_at().with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        );
    }
}

fn print_help() {
    println!("Commands:");
    for usage in all_commands() {
        println!("  {:<20} {}", usage.syntax, usage.description);
    }
}

fn mood_glyph(mood: Mood) -> &'static str {
    match mood {
        Mood::Light => "☀",
        Mood::Dark => "☾",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_lines_skip_chunks_without_links() {
        let citations = vec![
            CitationChunk::web("https://a.example", "A"),
            CitationChunk::default(),
            CitationChunk::web("https://b.example", ""),
            CitationChunk::web("https://a.example", "A"),
        ];
        assert_eq!(
            source_lines(&citations),
            vec![
                "[1] A <https://a.example>".to_string(),
                "[2] https://b.example <https://b.example>".to_string(),
                "[3] A <https://a.example>".to_string(),
            ]
        );
    }
}
