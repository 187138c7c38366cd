//! One-shot "say" command: a single exchange printed to stdout.

use std::error::Error;
use std::io::{self, Write};

use futures_util::StreamExt;

use crate::auth::KeyringCredentials;
use crate::cli::build_orchestrator;
use crate::core::config::data::Config;
use crate::core::orchestrator::{ExchangeEvent, ExchangeRequest};
use crate::core::stream_errors::classify_transport;

pub async fn run_say(prompt: Vec<String>, model: Option<String>) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: moodchat say <prompt>");
        std::process::exit(1);
    }

    let config = Config::load()?;
    let credentials = KeyringCredentials::load();
    let Some(api_key) = credentials.api_key() else {
        eprintln!("❌ No API key found. Run 'moodchat auth' or set GEMINI_API_KEY.");
        std::process::exit(1);
    };

    let model = config.effective_model(model.as_deref());
    let orchestrator = build_orchestrator(&reqwest::Client::new(), &config, &model, api_key);
    let mut stream = orchestrator.run(ExchangeRequest {
        history: Vec::new(),
        content: prompt,
        system_prompt: Some(config.effective_system_prompt().to_string()),
    });

    let mut citations = Vec::new();
    let mut stdout = io::stdout();
    while let Some(item) = stream.next().await {
        match item {
            Ok(ExchangeEvent::TextDelta(text)) => {
                print!("{text}");
                stdout.flush()?;
            }
            Ok(ExchangeEvent::Citations(chunks)) => citations.extend(chunks),
            Err(err) => {
                let classified = classify_transport(err.transport());
                tracing::warn!(kind = classified.kind.as_str(), error = %err, "Exchange failed");
                eprintln!("\n\n❌ {}", classified.user_message());
                std::process::exit(1);
            }
        }
    }
    println!();

    let links: Vec<_> = citations.iter().filter_map(|c| c.web.as_ref()).collect();
    if !links.is_empty() {
        println!("\nSources:");
        for (i, web) in links.iter().enumerate() {
            println!("  [{}] {} <{}>", i + 1, web.title, web.uri);
        }
    }

    Ok(())
}
